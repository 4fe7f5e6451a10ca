//! Ontology table: multilingual term definitions and term bindings.
//!
//! Terms are stored as a two-level map (code -> language -> entry) with the
//! archetype's original language as the fallback for every lookup.

use std::collections::{BTreeMap, BTreeSet};

use adl_types::{LocalCode, TermBinding, TermEntry};

use crate::types::{AdlError, AdlResult};

/// Term definitions and bindings of one archetype.
///
/// # Example
///
/// ```
/// use adl_loader::Ontology;
/// use adl_types::TermEntry;
///
/// let mut ontology = Ontology::new("en");
/// ontology.insert(TermEntry::new("at0053", "en", "+", "Glucose present."));
///
/// // "de" has no entry, so the original language answers.
/// assert_eq!(ontology.resolve("at0053", "de").unwrap().text, "+");
/// assert!(ontology.resolve("at9999", "en").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ontology {
    original_language: String,
    terminologies_available: Vec<String>,
    terms: BTreeMap<LocalCode, BTreeMap<String, TermEntry>>,
    bindings: BTreeMap<String, BTreeMap<LocalCode, TermBinding>>,
}

impl Ontology {
    /// Creates an empty ontology with the given fallback language.
    pub fn new(original_language: impl Into<String>) -> Self {
        Self {
            original_language: original_language.into(),
            terminologies_available: Vec::new(),
            terms: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }

    /// Returns the fallback language.
    pub fn original_language(&self) -> &str {
        &self.original_language
    }

    /// Returns the external terminologies the archetype declares.
    pub fn terminologies_available(&self) -> &[String] {
        &self.terminologies_available
    }

    /// Sets the external terminologies the archetype declares.
    pub fn set_terminologies_available(&mut self, terminologies: Vec<String>) {
        self.terminologies_available = terminologies;
    }

    /// Adds or replaces a term entry.
    pub fn insert(&mut self, entry: TermEntry) {
        self.terms
            .entry(entry.code.clone())
            .or_default()
            .insert(entry.language.clone(), entry);
    }

    /// Adds or replaces a term binding.
    pub fn insert_binding(&mut self, binding: TermBinding) {
        self.bindings
            .entry(binding.terminology.clone())
            .or_default()
            .insert(binding.code.clone(), binding);
    }

    /// Resolves a code in a language, falling back to the original language.
    ///
    /// # Errors
    /// Returns [`AdlError::CodeNotFound`] if neither language has an entry.
    pub fn resolve(&self, code: &str, language: &str) -> AdlResult<&TermEntry> {
        self.terms
            .get(code)
            .and_then(|by_language| {
                by_language
                    .get(language)
                    .or_else(|| by_language.get(&self.original_language))
            })
            .ok_or_else(|| AdlError::CodeNotFound {
                code: code.to_string(),
                language: language.to_string(),
            })
    }

    /// Looks up a code in exactly one language, without fallback.
    pub fn lookup(&self, code: &str, language: &str) -> Option<&TermEntry> {
        self.terms.get(code)?.get(language)
    }

    /// Returns the text of a code, with fallback.
    pub fn text(&self, code: &str, language: &str) -> Option<&str> {
        self.resolve(code, language).ok().map(|e| e.text.as_str())
    }

    /// Returns true if any language defines the code.
    pub fn has_code(&self, code: &str) -> bool {
        self.terms.contains_key(code)
    }

    /// Returns every binding of a code, across terminologies.
    pub fn bindings_for(&self, code: &str) -> Vec<&TermBinding> {
        self.bindings
            .values()
            .filter_map(|by_code| by_code.get(code))
            .collect()
    }

    /// Returns the binding of a code in one terminology.
    pub fn binding(&self, terminology: &str, code: &str) -> Option<&TermBinding> {
        self.bindings.get(terminology)?.get(code)
    }

    /// Iterates over all bindings, grouped by terminology.
    pub fn bindings(&self) -> impl Iterator<Item = &TermBinding> {
        self.bindings.values().flat_map(|by_code| by_code.values())
    }

    /// Returns the languages with at least one entry, original language first.
    pub fn languages(&self) -> Vec<&str> {
        let others: BTreeSet<&str> = self
            .terms
            .values()
            .flat_map(|by_language| by_language.keys().map(String::as_str))
            .filter(|language| *language != self.original_language)
            .collect();
        std::iter::once(self.original_language.as_str())
            .chain(others)
            .collect()
    }

    /// Iterates over the entries of one language, ordered by code.
    pub fn entries(&self, language: &str) -> impl Iterator<Item = &TermEntry> + '_ {
        let language = language.to_string();
        self.terms
            .values()
            .filter_map(move |by_language| by_language.get(&language))
    }

    /// Iterates over every defined code.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Returns the total number of entries across languages.
    pub fn term_count(&self) -> usize {
        self.terms.values().map(BTreeMap::len).sum()
    }

    /// Returns the codes that have no entry in a language.
    pub fn missing_in<'a>(
        &self,
        codes: impl IntoIterator<Item = &'a str>,
        language: &str,
    ) -> Vec<&'a str> {
        codes
            .into_iter()
            .filter(|code| self.lookup(code, language).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ontology() -> Ontology {
        let mut ontology = Ontology::new("en");
        ontology.insert(TermEntry::new("at0050", "en", "Glucose", "Presence of glucose."));
        ontology.insert(TermEntry::new("at0050", "de", "Glukose", "Glukose im Urin."));
        ontology.insert(TermEntry::new("at0051", "en", "Negative", "No glucose detected."));
        ontology.insert_binding(TermBinding {
            code: "at0050".to_string(),
            terminology: "LOINC".to_string(),
            target: "25428-4".to_string(),
        });
        ontology
    }

    #[test]
    fn test_resolve_requested_language() {
        let ontology = make_ontology();
        assert_eq!(ontology.resolve("at0050", "de").unwrap().text, "Glukose");
        assert_eq!(ontology.resolve("at0050", "en").unwrap().text, "Glucose");
    }

    #[test]
    fn test_resolve_falls_back_to_original() {
        let ontology = make_ontology();
        let entry = ontology.resolve("at0051", "de").unwrap();
        assert_eq!(entry.language, "en");
        assert_eq!(entry.text, "Negative");
        assert!(ontology.lookup("at0051", "de").is_none());
    }

    #[test]
    fn test_resolve_code_not_found() {
        let ontology = make_ontology();
        match ontology.resolve("at9999", "de") {
            Err(AdlError::CodeNotFound { code, language }) => {
                assert_eq!(code, "at9999");
                assert_eq!(language, "de");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bindings() {
        let ontology = make_ontology();
        let bindings = ontology.bindings_for("at0050");
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].to_string(), "[LOINC::25428-4]");
        assert!(ontology.binding("LOINC", "at0051").is_none());
        assert_eq!(ontology.bindings().count(), 1);
    }

    #[test]
    fn test_languages_and_counts() {
        let ontology = make_ontology();
        assert_eq!(ontology.languages(), vec!["en", "de"]);
        assert_eq!(ontology.term_count(), 3);
        assert_eq!(ontology.entries("en").count(), 2);
        assert_eq!(ontology.codes().collect::<Vec<_>>(), vec!["at0050", "at0051"]);
        assert_eq!(
            ontology.missing_in(["at0050", "at0051"], "de"),
            vec!["at0051"]
        );
    }
}
