//! Loader-specific types: errors, configuration and load statistics.

use std::path::PathBuf;
use thiserror::Error;

use adl_types::{ArchetypeIdParseError, IntervalParseError};

/// Errors that can occur while loading or assembling archetypes.
#[derive(Error, Debug)]
pub enum AdlError {
    /// I/O error reading an archetype file.
    #[error("IO error reading archetype file: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Directory not found.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Malformed grammar.
    #[error("Parse error at line {line} in {construct}: {message}")]
    Parse {
        /// 1-based source line.
        line: usize,
        /// Construct being parsed (e.g. "definition", "ontology").
        construct: String,
        /// What went wrong.
        message: String,
    },

    /// A `{` without matching `}` or a stray `}`.
    #[error("Unbalanced block starting at line {line}")]
    UnbalancedBlock {
        /// Line of the offending brace.
        line: usize,
    },

    /// Input ended in the middle of a construct.
    #[error("Unexpected end of input in {construct}")]
    UnexpectedEof {
        /// Construct being parsed.
        construct: String,
    },

    /// Invalid occurrence, existence or cardinality interval.
    #[error("Invalid interval at line {line}: {source}")]
    InvalidInterval {
        /// Line of the interval.
        line: usize,
        /// Underlying interval error.
        source: IntervalParseError,
    },

    /// Invalid archetype identifier.
    #[error("Invalid archetype id: {0}")]
    InvalidArchetypeId(#[from] ArchetypeIdParseError),

    /// Two constraint nodes declare the same local code.
    #[error("Duplicate node code: {code}")]
    DuplicateCode {
        /// The repeated code.
        code: String,
    },

    /// Ordinals of a coded choice are repeated or not dense from 1.
    #[error("Invalid ordinal sequence in {code}: {message}")]
    OrdinalSequence {
        /// Code of the element declaring the value set.
        code: String,
        /// What is wrong with the sequence.
        message: String,
    },

    /// A slot pattern is not a valid regular expression.
    #[error("Invalid slot pattern /{pattern}/: {message}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Regex compiler message.
        message: String,
    },

    /// A referenced code has no term definition in a required language.
    #[error("Missing translation for {code} in language '{language}'")]
    MissingTranslation {
        /// The untranslated code.
        code: String,
        /// The language lacking an entry.
        language: String,
    },

    /// A code is defined neither in the requested nor the original language.
    #[error("Code {code} not found for language '{language}'")]
    CodeNotFound {
        /// The code looked up.
        code: String,
        /// The language requested.
        language: String,
    },

    /// A code is referenced (e.g. by a binding) but defined nowhere.
    #[error("Dangling code reference: {code}")]
    DanglingCode {
        /// The dangling code.
        code: String,
    },

    /// No archetype with the id is loaded.
    #[error("Archetype not found: {id}")]
    ArchetypeNotFound {
        /// The requested id.
        id: String,
    },

    /// An archetype with the id is already loaded.
    #[error("Duplicate archetype: {id}")]
    DuplicateArchetype {
        /// The repeated id.
        id: String,
    },
}

/// Result type for archetype operations.
pub type AdlResult<T> = Result<T, AdlError>;

/// Configuration for archetype parsing.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Whether a code missing from a translation language is an error
    /// (`true`) or only a warning (`false`).
    pub strict_translations: bool,
    /// Whether coded-choice ordinals must be unique and dense from 1.
    pub check_ordinals: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            strict_translations: false,
            check_ordinals: true,
        }
    }
}

impl ParseConfig {
    /// Creates a config that rejects incomplete translations.
    pub fn strict() -> Self {
        Self {
            strict_translations: true,
            ..Self::default()
        }
    }
}

/// Configuration for instance validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Language for display text (`None` = the archetype's original language).
    pub language: Option<String>,
    /// Whether undeclared instance nodes are tolerated.
    pub allow_unknown_nodes: bool,
    /// Whether slot fillers are validated against their own archetype.
    pub resolve_slots: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            language: None,
            allow_unknown_nodes: false,
            resolve_slots: true,
        }
    }
}

impl ValidationConfig {
    /// Creates a config resolving display text in the given language.
    pub fn in_language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Self::default()
        }
    }
}

/// Statistics from loading archetypes.
#[derive(Debug, Clone, Default)]
pub struct ParseStats {
    /// Archetypes successfully parsed.
    pub archetype_count: usize,
    /// Constraint nodes across all parsed archetypes.
    pub node_count: usize,
    /// Term entries across all parsed archetypes.
    pub term_count: usize,
    /// Files that failed to parse.
    pub error_count: usize,
    /// Time taken to parse in milliseconds.
    pub parse_time_ms: u64,
}

impl ParseStats {
    /// Returns the percentage of files that parsed.
    pub fn success_rate(&self) -> f64 {
        let total = self.archetype_count + self.error_count;
        if total == 0 {
            0.0
        } else {
            (self.archetype_count as f64 / total as f64) * 100.0
        }
    }
}

/// Discovered archetype files in a repository directory.
#[derive(Debug, Clone, Default)]
pub struct AdlFiles {
    /// Repository root that was searched.
    pub root: PathBuf,
    /// Paths of `.adl` files, sorted.
    pub archetype_files: Vec<PathBuf>,
}

impl AdlFiles {
    /// Creates an empty file set for a root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archetype_files: Vec::new(),
        }
    }

    /// Returns the number of discovered files.
    pub fn len(&self) -> usize {
        self.archetype_files.len()
    }

    /// Returns true if no file was discovered.
    pub fn is_empty(&self) -> bool {
        self.archetype_files.is_empty()
    }
}

/// Outcome of loading a set of archetype files.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Ids of archetypes that were loaded.
    pub loaded: Vec<String>,
    /// Files that failed, with their error.
    pub failed: Vec<(PathBuf, AdlError)>,
    /// Load statistics.
    pub stats: ParseStats,
}

impl LoadReport {
    /// Returns true if every file loaded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
