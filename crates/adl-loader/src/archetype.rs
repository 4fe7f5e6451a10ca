//! A parsed archetype and the invariants checked when it is assembled.

use std::collections::{HashMap, HashSet};

use adl_types::{
    ArchetypeHeader, ArchetypeId, ConstraintTree, NodeId, SlotAssertion, ValueConstraint,
};
use regex::Regex;

use crate::ontology::Ontology;
use crate::parser::parse_archetype;
use crate::types::{AdlError, AdlResult, ParseConfig};

/// Pattern that admits every archetype id.
const UNIVERSAL_PATTERN: &str = ".*";

/// Compiled include/exclude patterns of one archetype slot.
///
/// An id is admitted when it matches a specific (non-`.*`) include. Failing
/// that, it is refused when it matches any exclude, and otherwise admitted
/// only if the slot has no specific include.
#[derive(Debug, Clone)]
pub struct SlotMatcher {
    includes: Vec<(String, Regex)>,
    excludes: Vec<Regex>,
}

impl SlotMatcher {
    /// Compiles slot assertions, anchoring every pattern to the whole id.
    ///
    /// # Errors
    /// Returns [`AdlError::InvalidPattern`] for a pattern regex rejects.
    pub fn compile(includes: &[SlotAssertion], excludes: &[SlotAssertion]) -> AdlResult<Self> {
        let includes = includes
            .iter()
            .map(|a| compile_anchored(&a.pattern).map(|re| (a.pattern.clone(), re)))
            .collect::<AdlResult<Vec<_>>>()?;
        let excludes = excludes
            .iter()
            .map(|a| compile_anchored(&a.pattern))
            .collect::<AdlResult<Vec<_>>>()?;
        Ok(Self { includes, excludes })
    }

    /// Returns true if an archetype id may fill the slot.
    pub fn matches(&self, archetype_id: &str) -> bool {
        let mut specific = self
            .includes
            .iter()
            .filter(|(pattern, _)| pattern != UNIVERSAL_PATTERN)
            .peekable();
        let has_specific = specific.peek().is_some();
        if specific.any(|(_, re)| re.is_match(archetype_id)) {
            return true;
        }
        if self.excludes.iter().any(|re| re.is_match(archetype_id)) {
            return false;
        }
        !has_specific
    }

    /// Returns the include patterns as written.
    pub fn patterns(&self) -> Vec<String> {
        self.includes.iter().map(|(p, _)| p.clone()).collect()
    }
}

fn compile_anchored(pattern: &str) -> AdlResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| AdlError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// An archetype: header, constraint tree and ontology, immutable once built.
///
/// # Example
///
/// ```ignore
/// use adl_loader::Archetype;
///
/// let source = std::fs::read_to_string("openEHR-EHR-OBSERVATION.urinalysis.v1.adl")?;
/// let archetype = Archetype::parse(&source)?;
/// assert_eq!(archetype.concept_text("en"), Some("Urinalysis"));
/// ```
#[derive(Debug, Clone)]
pub struct Archetype {
    header: ArchetypeHeader,
    definition: ConstraintTree,
    ontology: Ontology,
    slots: HashMap<NodeId, SlotMatcher>,
}

impl Archetype {
    /// Assembles an archetype, checking the invariants that span sections.
    ///
    /// # Errors
    /// - [`AdlError::DanglingCode`] if the concept is not the root node or a
    ///   term binding names an undefined code
    /// - [`AdlError::OrdinalSequence`] for repeated codes or ordinals in a
    ///   value set, or ordinals not dense from 1
    /// - [`AdlError::MissingTranslation`] for a referenced code without an
    ///   original-language entry (or, when strict, a translation entry)
    /// - [`AdlError::InvalidPattern`] for a slot pattern that does not compile
    pub fn new(
        header: ArchetypeHeader,
        definition: ConstraintTree,
        ontology: Ontology,
        config: &ParseConfig,
    ) -> AdlResult<Self> {
        if definition.root_node().code != header.concept {
            return Err(AdlError::DanglingCode {
                code: header.concept.clone(),
            });
        }

        let mut slots = HashMap::new();
        for (id, node) in definition.iter() {
            match node.value() {
                Some(ValueConstraint::CodedChoice { options }) => {
                    check_ordinals(&node.code, options, config)?;
                }
                Some(ValueConstraint::CodePhrase { codes, .. }) => {
                    let mut seen = HashSet::new();
                    if let Some(code) = codes.iter().find(|c| !seen.insert(c.as_str())) {
                        return Err(AdlError::OrdinalSequence {
                            code: node.code.clone(),
                            message: format!("code {} listed twice", code),
                        });
                    }
                }
                Some(ValueConstraint::ExternalReference { includes, excludes }) => {
                    slots.insert(id, SlotMatcher::compile(includes, excludes)?);
                }
                _ => {}
            }
        }

        let referenced = definition.referenced_codes();
        let original = header.original_language.as_str();
        if let Some(code) = ontology.missing_in(referenced.iter().copied(), original).first() {
            return Err(AdlError::MissingTranslation {
                code: code.to_string(),
                language: original.to_string(),
            });
        }

        for translation in &header.translations {
            let missing = ontology.missing_in(referenced.iter().copied(), &translation.language);
            if let Some(code) = missing.first() {
                if config.strict_translations {
                    return Err(AdlError::MissingTranslation {
                        code: code.to_string(),
                        language: translation.language.clone(),
                    });
                }
                tracing::warn!(
                    "{}: {} codes have no '{}' entry and fall back to '{}'",
                    header.id,
                    missing.len(),
                    translation.language,
                    original
                );
            }
        }

        if let Some(binding) = ontology.bindings().find(|b| !ontology.has_code(&b.code)) {
            return Err(AdlError::DanglingCode {
                code: binding.code.clone(),
            });
        }

        tracing::debug!(
            "Assembled {}: {} nodes, {} terms, {} slots",
            header.id,
            definition.len(),
            ontology.term_count(),
            slots.len()
        );

        Ok(Self {
            header,
            definition,
            ontology,
            slots,
        })
    }

    /// Parses ADL source with the default configuration.
    pub fn parse(source: &str) -> AdlResult<Self> {
        parse_archetype(source, &ParseConfig::default())
    }

    /// Parses ADL source with an explicit configuration.
    pub fn parse_with_config(source: &str, config: &ParseConfig) -> AdlResult<Self> {
        parse_archetype(source, config)
    }

    /// Returns the archetype id.
    pub fn id(&self) -> &ArchetypeId {
        &self.header.id
    }

    /// Returns the header sections.
    pub fn header(&self) -> &ArchetypeHeader {
        &self.header
    }

    /// Returns the constraint tree.
    pub fn definition(&self) -> &ConstraintTree {
        &self.definition
    }

    /// Returns the ontology.
    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    /// Returns the original language.
    pub fn original_language(&self) -> &str {
        &self.header.original_language
    }

    /// Returns the text naming the archetype's concept.
    pub fn concept_text(&self, language: &str) -> Option<&str> {
        self.ontology.text(&self.header.concept, language)
    }

    /// Returns the compiled matcher of a slot node.
    pub fn slot_matcher(&self, id: NodeId) -> Option<&SlotMatcher> {
        self.slots.get(&id)
    }
}

/// Archetypes are equal when header, definition and ontology are; compiled
/// slot matchers are derived data.
impl PartialEq for Archetype {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.definition == other.definition
            && self.ontology == other.ontology
    }
}

fn check_ordinals(
    code: &str,
    options: &[adl_types::CodedOption],
    config: &ParseConfig,
) -> AdlResult<()> {
    let error = |message: String| AdlError::OrdinalSequence {
        code: code.to_string(),
        message,
    };

    let mut codes = HashSet::new();
    for option in options {
        if !codes.insert((option.terminology.as_str(), option.code.as_str())) {
            return Err(error(format!("code {} listed twice", option.code)));
        }
    }

    if !config.check_ordinals {
        return Ok(());
    }

    let mut ordinals: Vec<u32> = options.iter().map(|o| o.ordinal).collect();
    ordinals.sort_unstable();
    if ordinals.first() == Some(&0) {
        return Err(error("ordinals must start at 1, found 0".to_string()));
    }
    for (expected, &ordinal) in (1u32..).zip(&ordinals) {
        if ordinal < expected {
            return Err(error(format!("ordinal {} used twice", ordinal)));
        }
        if ordinal > expected {
            return Err(error(format!("ordinal {} missing", expected)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adl_types::{
        AttributeConstraint, CodedOption, ConstraintNode, Interval, TermBinding, TermEntry,
        Translation,
    };

    fn make_header() -> ArchetypeHeader {
        ArchetypeHeader {
            id: ArchetypeId::parse("openEHR-EHR-CLUSTER.strip.v1").unwrap(),
            adl_version: "1.4".to_string(),
            concept: "at0000".to_string(),
            original_language: "en".to_string(),
            translations: vec![Translation {
                language: "de".to_string(),
                author: vec![],
            }],
            description: None,
        }
    }

    fn make_tree(options: Vec<CodedOption>) -> ConstraintTree {
        let mut builder = ConstraintTree::builder();
        let nitrite = builder.push(ConstraintNode::element(
            "ELEMENT",
            "at0091",
            Interval::optional(),
            ValueConstraint::CodedChoice { options },
        ));
        let root = builder.push(ConstraintNode::cluster(
            "CLUSTER",
            "at0000",
            Interval::required(),
            vec![AttributeConstraint::multiple("items", None, vec![nitrite])],
        ));
        builder.finish(root).unwrap()
    }

    fn make_ontology() -> Ontology {
        let mut ontology = Ontology::new("en");
        for (code, text) in [
            ("at0000", "Strip"),
            ("at0091", "Nitrite"),
            ("at0092", "Negative"),
            ("at0093", "Positive"),
        ] {
            ontology.insert(TermEntry::new(code, "en", text, ""));
        }
        ontology.insert(TermEntry::new("at0000", "de", "Streifen", ""));
        ontology
    }

    fn nitrite_options() -> Vec<CodedOption> {
        vec![CodedOption::local(1, "at0092"), CodedOption::local(2, "at0093")]
    }

    #[test]
    fn test_assemble_lenient_translation() {
        let archetype = Archetype::new(
            make_header(),
            make_tree(nitrite_options()),
            make_ontology(),
            &ParseConfig::default(),
        )
        .unwrap();
        assert_eq!(archetype.concept_text("de"), Some("Streifen"));
        assert_eq!(archetype.id().concept_name(), "strip");
    }

    #[test]
    fn test_strict_translation_rejected() {
        let result = Archetype::new(
            make_header(),
            make_tree(nitrite_options()),
            make_ontology(),
            &ParseConfig::strict(),
        );
        assert!(matches!(
            result,
            Err(AdlError::MissingTranslation { ref language, .. }) if language == "de"
        ));
    }

    #[test]
    fn test_missing_original_entry_rejected() {
        let mut options = nitrite_options();
        options.push(CodedOption::local(3, "at0094"));
        let result = Archetype::new(
            make_header(),
            make_tree(options),
            make_ontology(),
            &ParseConfig::default(),
        );
        match result {
            Err(AdlError::MissingTranslation { code, language }) => {
                assert_eq!(code, "at0094");
                assert_eq!(language, "en");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_ordinal_gaps_rejected() {
        let options = vec![CodedOption::local(1, "at0092"), CodedOption::local(3, "at0093")];
        let result = Archetype::new(
            make_header(),
            make_tree(options.clone()),
            make_ontology(),
            &ParseConfig::default(),
        );
        assert!(matches!(result, Err(AdlError::OrdinalSequence { .. })));

        let lenient = ParseConfig {
            check_ordinals: false,
            ..ParseConfig::default()
        };
        assert!(Archetype::new(make_header(), make_tree(options), make_ontology(), &lenient).is_ok());
    }

    #[test]
    fn test_repeated_ordinal_rejected() {
        let options = vec![CodedOption::local(1, "at0092"), CodedOption::local(1, "at0093")];
        let result = Archetype::new(
            make_header(),
            make_tree(options),
            make_ontology(),
            &ParseConfig::default(),
        );
        match result {
            Err(AdlError::OrdinalSequence { code, message }) => {
                assert_eq!(code, "at0091");
                assert!(message.contains("used twice"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_zero_ordinal_rejected() {
        let options = vec![CodedOption::local(0, "at0092"), CodedOption::local(1, "at0093")];
        let result = Archetype::new(
            make_header(),
            make_tree(options),
            make_ontology(),
            &ParseConfig::default(),
        );
        match result {
            Err(AdlError::OrdinalSequence { message, .. }) => {
                assert_eq!(message, "ordinals must start at 1, found 0");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_dangling_binding_rejected() {
        let mut ontology = make_ontology();
        ontology.insert_binding(TermBinding {
            code: "at0500".to_string(),
            terminology: "LOINC".to_string(),
            target: "5802-4".to_string(),
        });
        let result = Archetype::new(
            make_header(),
            make_tree(nitrite_options()),
            ontology,
            &ParseConfig::default(),
        );
        assert!(matches!(result, Err(AdlError::DanglingCode { ref code }) if code == "at0500"));
    }

    #[test]
    fn test_concept_must_be_root() {
        let mut header = make_header();
        header.concept = "at0091".to_string();
        let result = Archetype::new(
            header,
            make_tree(nitrite_options()),
            make_ontology(),
            &ParseConfig::default(),
        );
        assert!(matches!(result, Err(AdlError::DanglingCode { .. })));
    }

    fn assertion(pattern: &str) -> SlotAssertion {
        SlotAssertion {
            path: "archetype_id/value".to_string(),
            pattern: pattern.to_string(),
        }
    }

    #[test]
    fn test_slot_matcher_include() {
        let matcher = SlotMatcher::compile(
            &[assertion(r"openEHR-EHR-CLUSTER\.urine_microscopy(-[a-zA-Z0-9_]+)*\.v1")],
            &[],
        )
        .unwrap();
        assert!(matcher.matches("openEHR-EHR-CLUSTER.urine_microscopy.v1"));
        assert!(matcher.matches("openEHR-EHR-CLUSTER.urine_microscopy-sediment.v1"));
        assert!(!matcher.matches("openEHR-EHR-CLUSTER.urine_microscopy.v2"));
        // Anchored: a prefix match is not enough.
        assert!(!matcher.matches("xopenEHR-EHR-CLUSTER.urine_microscopy.v1"));
    }

    #[test]
    fn test_slot_matcher_universal_include_with_exclude() {
        let matcher = SlotMatcher::compile(
            &[assertion(".*")],
            &[assertion(r"openEHR-EHR-CLUSTER\.device\.v1")],
        )
        .unwrap();
        assert!(matcher.matches("openEHR-EHR-CLUSTER.anything.v1"));
        assert!(!matcher.matches("openEHR-EHR-CLUSTER.device.v1"));
        assert_eq!(matcher.patterns(), vec![".*".to_string()]);
    }

    #[test]
    fn test_slot_matcher_invalid_pattern() {
        let result = SlotMatcher::compile(&[assertion("openEHR-(")], &[]);
        assert!(matches!(result, Err(AdlError::InvalidPattern { .. })));
    }
}
