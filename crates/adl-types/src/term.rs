//! Ontology rows: term definitions and term bindings.

use crate::LocalCode;

/// Text and description of one local code in one language.
///
/// Represents an entry of the `term_definitions` (or `constraint_definitions`)
/// table of the archetype ontology.
///
/// # Examples
///
/// ```
/// use adl_types::TermEntry;
///
/// let entry = TermEntry::new("at0053", "en", "+", "Glucose present at the lowest graded level.");
/// assert_eq!(entry.text, "+");
/// assert!(entry.comment.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermEntry {
    /// The local code.
    pub code: LocalCode,
    /// ISO 639-1 language code.
    pub language: String,
    /// Short human-readable text.
    pub text: String,
    /// Longer description.
    pub description: String,
    /// Optional authoring comment.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub comment: Option<String>,
}

impl TermEntry {
    /// Creates an entry without a comment.
    pub fn new(
        code: impl Into<String>,
        language: impl Into<String>,
        text: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            text: text.into(),
            description: description.into(),
            comment: None,
        }
    }
}

/// Binding of a local code to a code of an external terminology.
///
/// Written in the ontology as `["at0050"] = <[LOINC::25428-4]>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermBinding {
    /// The bound local code.
    pub code: LocalCode,
    /// External terminology identifier (e.g. "LOINC").
    pub terminology: String,
    /// Code within the external terminology.
    pub target: String,
}

impl std::fmt::Display for TermBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}::{}]", self.terminology, self.target)
    }
}
