//! Archetype identifiers and local codes.

/// A local code such as `at0050` (term) or `ac0001` (constraint).
///
/// Local codes are scoped to the archetype that declares them.
///
/// # Examples
///
/// ```
/// use adl_types::{is_local_code, LocalCode};
///
/// let glucose: LocalCode = "at0050".to_string();
/// assert!(is_local_code(&glucose));
/// assert!(!is_local_code("25428-4"));
/// ```
pub type LocalCode = String;

/// Returns true if the text has the shape of a local term or constraint code.
pub fn is_local_code(code: &str) -> bool {
    let digits = match code.strip_prefix("at").or_else(|| code.strip_prefix("ac")) {
        Some(rest) => rest,
        None => return false,
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Error returned when an archetype identifier is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeIdParseError {
    /// The rejected identifier.
    pub value: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl std::fmt::Display for ArchetypeIdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid archetype id '{}': {}", self.value, self.reason)
    }
}

impl std::error::Error for ArchetypeIdParseError {}

/// A globally unique archetype identifier.
///
/// Has the form `<originator>-<rm name>-<rm entity>.<concept>.v<version>`,
/// for example `openEHR-EHR-OBSERVATION.urinalysis.v1`.
///
/// # Examples
///
/// ```
/// use adl_types::ArchetypeId;
///
/// let id = ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis.v1").unwrap();
/// assert_eq!(id.rm_entity(), "OBSERVATION");
/// assert_eq!(id.concept_name(), "urinalysis");
/// assert_eq!(id.version(), "v1");
/// assert_eq!(id.to_string(), "openEHR-EHR-OBSERVATION.urinalysis.v1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct ArchetypeId {
    value: String,
    rm_originator: String,
    rm_name: String,
    rm_entity: String,
    concept_name: String,
    version: String,
}

impl ArchetypeId {
    /// Parses a qualified archetype identifier.
    pub fn parse(value: &str) -> Result<Self, ArchetypeIdParseError> {
        let err = |reason| ArchetypeIdParseError {
            value: value.to_string(),
            reason,
        };

        let parts: Vec<&str> = value.split('.').collect();
        if parts.len() != 3 {
            return Err(err("expected <qualified rm entity>.<concept>.<version>"));
        }

        let rm_parts: Vec<&str> = parts[0].splitn(3, '-').collect();
        if rm_parts.len() != 3 || rm_parts.iter().any(|p| p.is_empty()) {
            return Err(err("expected <originator>-<rm name>-<rm entity>"));
        }

        if parts[1].is_empty() {
            return Err(err("empty concept name"));
        }

        let version = parts[2];
        let version_ok = version
            .strip_prefix('v')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !version_ok {
            return Err(err("version must look like v1"));
        }

        Ok(Self {
            value: value.to_string(),
            rm_originator: rm_parts[0].to_string(),
            rm_name: rm_parts[1].to_string(),
            rm_entity: rm_parts[2].to_string(),
            concept_name: parts[1].to_string(),
            version: version.to_string(),
        })
    }

    /// Returns the full identifier text.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the reference model originator (e.g. "openEHR").
    pub fn rm_originator(&self) -> &str {
        &self.rm_originator
    }

    /// Returns the reference model name (e.g. "EHR").
    pub fn rm_name(&self) -> &str {
        &self.rm_name
    }

    /// Returns the reference model entity (e.g. "OBSERVATION").
    pub fn rm_entity(&self) -> &str {
        &self.rm_entity
    }

    /// Returns the concept name (e.g. "urinalysis").
    pub fn concept_name(&self) -> &str {
        &self.concept_name
    }

    /// Returns the version part (e.g. "v1").
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl std::fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl std::str::FromStr for ArchetypeId {
    type Err = ArchetypeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArchetypeId {
    type Error = ArchetypeIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArchetypeId> for String {
    fn from(id: ArchetypeId) -> Self {
        id.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archetype_id() {
        let id = ArchetypeId::parse("openEHR-EHR-CLUSTER.urine_microscopy.v1").unwrap();
        assert_eq!(id.rm_originator(), "openEHR");
        assert_eq!(id.rm_name(), "EHR");
        assert_eq!(id.rm_entity(), "CLUSTER");
        assert_eq!(id.concept_name(), "urine_microscopy");
        assert_eq!(id.as_str(), "openEHR-EHR-CLUSTER.urine_microscopy.v1");
    }

    #[test]
    fn test_parse_archetype_id_errors() {
        assert!(ArchetypeId::parse("").is_err());
        assert!(ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis").is_err());
        assert!(ArchetypeId::parse("openEHR-OBSERVATION.urinalysis.v1").is_err());
        assert!(ArchetypeId::parse("openEHR-EHR-OBSERVATION..v1").is_err());
        assert!(ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis.1").is_err());
        assert!(ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis.vx").is_err());
    }

    #[test]
    fn test_local_code_shape() {
        assert!(is_local_code("at0000"));
        assert!(is_local_code("ac0001"));
        assert!(is_local_code("at0000.1"));
        assert!(!is_local_code("at"));
        assert!(!is_local_code("AT0000"));
        assert!(!is_local_code("local::at0000"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_archetype_id_serde_as_string() {
        let id = ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis.v1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"openEHR-EHR-OBSERVATION.urinalysis.v1\"");
        let parsed: ArchetypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<ArchetypeId>("\"nope\"").is_err());
    }
}
