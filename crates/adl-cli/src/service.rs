//! Request handling: one instance document in, one report out.

use std::path::Path;
use std::sync::Arc;

use adl_loader::{ArchetypeStore, ValidationConfig, Validator};
use adl_types::{BoundInstance, InstanceNode, Violation};
use serde::{Deserialize, Serialize};

/// An instance document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationRequest {
    /// Archetype the instance claims to conform to.
    pub archetype_id: String,
    /// The candidate instance.
    pub instance: InstanceNode,
}

/// A violation as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationRecord {
    /// Violation kind, e.g. `ValueNotInSet`.
    pub kind: String,
    /// Instance path.
    pub path: String,
    /// Offending local code.
    pub code: String,
    /// The violated constraint.
    pub expected: String,
    /// What was found.
    pub actual: String,
    /// One-line description.
    pub message: String,
}

impl From<&Violation> for ViolationRecord {
    fn from(violation: &Violation) -> Self {
        Self {
            kind: violation.kind().to_string(),
            path: violation.path().to_string(),
            code: violation.code().to_string(),
            expected: violation.expected(),
            actual: violation.actual(),
            message: violation.to_string(),
        }
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Source file, when the request came from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Archetype the instance was checked against.
    pub archetype_id: String,
    /// True when the instance conforms.
    pub valid: bool,
    /// Violations, in walk order.
    pub violations: Vec<ViolationRecord>,
    /// The bound instance of a conforming document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<BoundInstance>,
    /// Why the document could not be validated at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    fn failed(file: Option<String>, archetype_id: String, error: String) -> Self {
        Self {
            file,
            archetype_id,
            valid: false,
            violations: Vec::new(),
            bound: None,
            error: Some(error),
        }
    }
}

/// Validates instance documents against a loaded repository.
#[derive(Clone)]
pub struct ValidationService {
    store: Arc<ArchetypeStore>,
    config: ValidationConfig,
}

impl ValidationService {
    /// Creates a service over a loaded store.
    pub fn new(store: ArchetypeStore) -> Self {
        Self {
            store: Arc::new(store),
            config: ValidationConfig::default(),
        }
    }

    /// Replaces the validation configuration.
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a reference to the store.
    pub fn store(&self) -> &ArchetypeStore {
        &self.store
    }

    /// Validates one request.
    pub fn validate(&self, request: &ValidationRequest, file: Option<String>) -> ValidationReport {
        let archetype = match self.store.get_or_err(&request.archetype_id) {
            Ok(archetype) => archetype,
            Err(e) => {
                return ValidationReport::failed(file, request.archetype_id.clone(), e.to_string())
            }
        };

        let validator = Validator::new(archetype)
            .with_config(self.config.clone())
            .with_resolver(self.store.clone());

        match validator.validate(&request.instance) {
            Ok(bound) => ValidationReport {
                file,
                archetype_id: request.archetype_id.clone(),
                valid: true,
                violations: Vec::new(),
                bound: Some(bound),
                error: None,
            },
            Err(violations) => ValidationReport {
                file,
                archetype_id: request.archetype_id.clone(),
                valid: false,
                violations: violations.iter().map(ViolationRecord::from).collect(),
                bound: None,
                error: None,
            },
        }
    }

    /// Reads a JSON request from a file and validates it.
    pub fn validate_file<P: AsRef<Path>>(&self, path: P) -> ValidationReport {
        let path = path.as_ref();
        let file = Some(path.display().to_string());

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => return ValidationReport::failed(file, String::new(), e.to_string()),
        };
        match serde_json::from_str::<ValidationRequest>(&source) {
            Ok(request) => self.validate(&request, file),
            Err(e) => ValidationReport::failed(file, String::new(), format!("invalid request: {}", e)),
        }
    }
}
