//! Archetype repository discovery.

use std::fs;
use std::path::Path;

use crate::types::{AdlError, AdlFiles, AdlResult};

/// File extension of archetype sources.
pub const ADL_EXTENSION: &str = "adl";

/// Discovers archetype source files in a repository directory.
///
/// Looks for `*.adl` files in the directory itself and in its immediate
/// subdirectories (repositories are often grouped by RM class, e.g.
/// `entry/observation/`). The result is sorted by path.
pub fn discover_adl_files<P: AsRef<Path>>(path: P) -> AdlResult<AdlFiles> {
    let path = path.as_ref();

    if !path.is_dir() {
        return Err(AdlError::DirectoryNotFound {
            path: path.display().to_string(),
        });
    }

    let mut files = AdlFiles::new(path);
    collect_adl_files(path, &mut files)?;

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            collect_adl_files(&entry.path(), &mut files)?;
        }
    }

    files.archetype_files.sort();
    tracing::debug!(
        "Found {} archetype files in {}",
        files.len(),
        path.display()
    );
    Ok(files)
}

fn collect_adl_files(dir: &Path, files: &mut AdlFiles) -> AdlResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && path.extension().is_some_and(|ext| ext == ADL_EXTENSION)
        {
            files.archetype_files.push(path);
        }
    }
    Ok(())
}

/// Extracts the archetype id a file name claims, e.g.
/// `openEHR-EHR-OBSERVATION.urinalysis.v1.adl`.
pub fn archetype_id_from_filename(filename: &str) -> Option<&str> {
    let id = filename.strip_suffix(".adl")?;
    adl_types::ArchetypeId::parse(id).ok().map(|_| id)
}

/// Formats a byte count as a human-readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
