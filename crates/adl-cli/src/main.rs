//! `adl-validate`: validates instance documents against an archetype repository.
//!
//! ```text
//! ADL_REPOSITORY_PATH=archetypes adl-validate instance.json [more.json ...]
//! ```
//!
//! Prints one JSON report per document to stdout and exits with status 1 if
//! any document is invalid or could not be read.

use std::process::ExitCode;

use adl_cli::ValidationService;
use adl_loader::{discover_adl_files, ArchetypeStore, ValidationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_REPOSITORY_PATH: &str = "archetypes";

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let documents: Vec<String> = std::env::args().skip(1).collect();
    if documents.is_empty() {
        eprintln!("usage: adl-validate <instance.json>...");
        return Ok(ExitCode::from(2));
    }

    // Get repository path from env or use default
    let repository_path = std::env::var("ADL_REPOSITORY_PATH")
        .unwrap_or_else(|_| DEFAULT_REPOSITORY_PATH.to_string());

    tracing::info!("Loading archetypes from: {}", repository_path);

    let files = discover_adl_files(&repository_path)?;
    tracing::info!("Discovered {} archetype files", files.len());

    let mut store = ArchetypeStore::new();
    let report = store.load_all_parallel(&files);
    for (path, e) in &report.failed {
        tracing::warn!("Skipping {}: {}", path.display(), e);
    }

    let config = match std::env::var("ADL_LANGUAGE") {
        Ok(language) => ValidationConfig::in_language(language),
        Err(_) => ValidationConfig::default(),
    };
    let service = ValidationService::new(store).with_config(config);

    let mut all_valid = true;
    for document in &documents {
        let report = service.validate_file(document);
        if report.valid {
            tracing::info!("{}: valid", document);
        } else {
            all_valid = false;
            tracing::info!(
                "{}: {} violations",
                document,
                report.violations.len()
            );
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
