//! In-memory archetype repository.
//!
//! Holds parsed archetypes by id, shared as `Arc<Archetype>` so validators
//! on any number of threads can use them without copying. Loading a set of
//! files never fails as a whole: each file either loads or is reported in
//! the [`LoadReport`] with its error.
//!
//! ```ignore
//! let files = discover_adl_files("archetypes")?;
//! let mut store = ArchetypeStore::new();
//! let report = store.load_all_parallel(&files);
//! println!("{} loaded, {} failed", report.loaded.len(), report.failed.len());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::archetype::Archetype;
use crate::loader::{archetype_id_from_filename, format_bytes};
use crate::parser::parse_archetype;
use crate::types::{AdlError, AdlFiles, AdlResult, LoadReport, ParseConfig, ParseStats};
use crate::validator::SlotResolver;

/// Parsed archetypes indexed by archetype id.
#[derive(Debug, Default)]
pub struct ArchetypeStore {
    archetypes: HashMap<String, Arc<Archetype>>,
    config: ParseConfig,
}

impl ArchetypeStore {
    /// Creates an empty store with the default parse configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that parses with the given configuration.
    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            archetypes: HashMap::new(),
            config,
        }
    }

    /// Parses archetype source text and adds it.
    ///
    /// # Errors
    /// Any parse error, or [`AdlError::DuplicateArchetype`] if the id is
    /// already loaded.
    pub fn load_str(&mut self, source: &str) -> AdlResult<Arc<Archetype>> {
        let archetype = parse_archetype(source, &self.config)?;
        self.try_insert(archetype)
    }

    /// Reads, parses and adds one archetype file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> AdlResult<Arc<Archetype>> {
        let archetype = parse_file(path.as_ref(), &self.config)?;
        self.try_insert(archetype)
    }

    /// Loads every discovered file, one after another.
    pub fn load_all(&mut self, files: &AdlFiles) -> LoadReport {
        let start = Instant::now();
        let results: Vec<_> = files
            .archetype_files
            .iter()
            .map(|path| (path.clone(), parse_file(path, &self.config)))
            .collect();
        self.finish_load(results, start)
    }

    /// Loads every discovered file, parsing files concurrently.
    ///
    /// Parsing is independent per file; archetypes are inserted in file
    /// order afterwards, so the outcome equals that of [`Self::load_all`].
    #[cfg(feature = "parallel")]
    pub fn load_all_parallel(&mut self, files: &AdlFiles) -> LoadReport {
        let start = Instant::now();
        let config = self.config.clone();
        let results: Vec<_> = files
            .archetype_files
            .par_iter()
            .map(|path| (path.clone(), parse_file(path, &config)))
            .collect();
        self.finish_load(results, start)
    }

    fn finish_load(
        &mut self,
        results: Vec<(PathBuf, AdlResult<Archetype>)>,
        start: Instant,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for (path, result) in results {
            match result.and_then(|archetype| self.try_insert(archetype)) {
                Ok(archetype) => {
                    report.stats.archetype_count += 1;
                    report.stats.node_count += archetype.definition().len();
                    report.stats.term_count += archetype.ontology().term_count();
                    report.loaded.push(archetype.id().to_string());
                }
                Err(e) => {
                    tracing::warn!("Could not load {}: {}", path.display(), e);
                    report.stats.error_count += 1;
                    report.failed.push((path, e));
                }
            }
        }

        report.stats.parse_time_ms = start.elapsed().as_millis() as u64;
        log_stats(&report.stats);
        report
    }

    /// Adds an archetype, refusing to replace one with the same id.
    ///
    /// # Errors
    /// Returns [`AdlError::DuplicateArchetype`] if the id is already loaded.
    pub fn try_insert(&mut self, archetype: Archetype) -> AdlResult<Arc<Archetype>> {
        let id = archetype.id().to_string();
        if self.archetypes.contains_key(&id) {
            return Err(AdlError::DuplicateArchetype { id });
        }
        let archetype = Arc::new(archetype);
        self.archetypes.insert(id, Arc::clone(&archetype));
        Ok(archetype)
    }

    /// Adds an archetype, replacing any loaded one with the same id.
    ///
    /// Returns the replaced archetype.
    pub fn insert(&mut self, archetype: Archetype) -> Option<Arc<Archetype>> {
        let id = archetype.id().to_string();
        let previous = self.archetypes.insert(id.clone(), Arc::new(archetype));
        if previous.is_some() {
            tracing::warn!("Replaced archetype {}", id);
        }
        previous
    }

    /// Returns an archetype by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Archetype>> {
        self.archetypes.get(id)
    }

    /// Returns an archetype by id, or [`AdlError::ArchetypeNotFound`].
    pub fn get_or_err(&self, id: &str) -> AdlResult<Arc<Archetype>> {
        self.archetypes
            .get(id)
            .cloned()
            .ok_or_else(|| AdlError::ArchetypeNotFound { id: id.to_string() })
    }

    /// Returns true if an archetype with the id is loaded.
    pub fn contains(&self, id: &str) -> bool {
        self.archetypes.contains_key(id)
    }

    /// Returns the loaded ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.archetypes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of loaded archetypes.
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

impl SlotResolver for ArchetypeStore {
    fn resolve(&self, archetype_id: &str) -> Option<Arc<Archetype>> {
        self.archetypes.get(archetype_id).cloned()
    }
}

fn parse_file(path: &Path, config: &ParseConfig) -> AdlResult<Archetype> {
    if !path.is_file() {
        return Err(AdlError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let source = fs::read_to_string(path)?;
    let archetype = parse_archetype(&source, config)?;

    let claimed = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(archetype_id_from_filename);
    if let Some(claimed) = claimed.filter(|c| *c != archetype.id().as_str()) {
        tracing::warn!(
            "{} declares archetype {} but is named for {}",
            path.display(),
            archetype.id(),
            claimed
        );
    }

    tracing::debug!(
        "Parsed {} ({}, {} nodes)",
        archetype.id(),
        format_bytes(source.len()),
        archetype.definition().len()
    );
    Ok(archetype)
}

fn log_stats(stats: &ParseStats) {
    tracing::info!(
        "Loaded {} archetypes ({} nodes, {} terms) in {}ms",
        stats.archetype_count,
        stats.node_count,
        stats.term_count,
        stats.parse_time_ms
    );
    if stats.error_count > 0 {
        tracing::warn!(
            "{} archetype files failed to load ({:.1}% success)",
            stats.error_count,
            stats.success_rate()
        );
    }
}
