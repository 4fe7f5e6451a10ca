//! ADL 1.4 writer.
//!
//! [`to_adl`] emits every section the parser reads, so that parsing the
//! output yields an archetype equal to the input.

use std::collections::BTreeMap;

use adl_types::{
    well_known, ArchetypeDescription, ArchetypeHeader, AttributeConstraint, ConstraintNode,
    ConstraintTree, Interval, NodeId, NodeKind, SlotAssertion, ValueConstraint,
};

use crate::archetype::Archetype;
use crate::dadl::{self, indent, CodeRef, DadlKey, DadlValue};
use crate::ontology::Ontology;

/// Serializes an archetype to ADL text.
///
/// # Example
///
/// ```ignore
/// let text = adl_loader::to_adl(&archetype);
/// assert_eq!(adl_loader::Archetype::parse(&text)?, archetype);
/// ```
pub fn to_adl(archetype: &Archetype) -> String {
    let mut writer = Writer {
        out: String::new(),
        tree: archetype.definition(),
        ontology: archetype.ontology(),
    };
    writer.header(archetype.header());
    writer.definition();
    writer.ontology_section();
    writer.out
}

struct Writer<'a> {
    out: String,
    tree: &'a ConstraintTree,
    ontology: &'a Ontology,
}

impl Writer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        indent(&mut self.out, depth);
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// `\t-- text` naming a code, or nothing if it has no term.
    fn comment(&self, code: &str) -> String {
        self.ontology
            .text(code, self.ontology.original_language())
            .map(|text| format!("\t-- {}", text.replace(['\n', '\r'], " ")))
            .unwrap_or_default()
    }

    fn header(&mut self, header: &ArchetypeHeader) {
        self.line(0, &format!("archetype (adl_version={})", header.adl_version));
        self.line(1, header.id.as_str());
        self.out.push('\n');

        self.line(0, "concept");
        let concept = format!("[{}]{}", header.concept, self.comment(&header.concept));
        self.line(1, &concept);

        self.line(0, "language");
        dadl::write_attribute(
            &mut self.out,
            1,
            "original_language",
            &language_code(&header.original_language),
        );
        if !header.translations.is_empty() {
            let translations = header
                .translations
                .iter()
                .map(|t| {
                    let mut entries = vec![(
                        DadlKey::Attr("language".to_string()),
                        language_code(&t.language),
                    )];
                    if !t.author.is_empty() {
                        entries.push((DadlKey::Attr("author".to_string()), pairs(&t.author)));
                    }
                    (DadlKey::Key(t.language.clone()), DadlValue::Object(entries))
                })
                .collect();
            dadl::write_attribute(
                &mut self.out,
                1,
                "translations",
                &DadlValue::Object(translations),
            );
        }

        if let Some(description) = &header.description {
            self.line(0, "description");
            self.description(description);
        }
        self.out.push('\n');
    }

    fn description(&mut self, description: &ArchetypeDescription) {
        if !description.original_author.is_empty() {
            dadl::write_attribute(
                &mut self.out,
                1,
                "original_author",
                &pairs(&description.original_author),
            );
        }

        if !description.details.is_empty() {
            let details = description
                .details
                .iter()
                .map(|d| {
                    let mut entries = vec![(
                        DadlKey::Attr("language".to_string()),
                        language_code(&d.language),
                    )];
                    let texts = [("purpose", &d.purpose), ("use", &d.usage), ("misuse", &d.misuse)];
                    for (name, text) in texts {
                        if let Some(text) = text {
                            entries.push((DadlKey::Attr(name.to_string()), DadlValue::string(text)));
                        }
                    }
                    if !d.keywords.is_empty() {
                        entries.push((
                            DadlKey::Attr("keywords".to_string()),
                            DadlValue::Strings {
                                values: d.keywords.clone(),
                                open: false,
                            },
                        ));
                    }
                    (DadlKey::Key(d.language.clone()), DadlValue::Object(entries))
                })
                .collect();
            dadl::write_attribute(&mut self.out, 1, "details", &DadlValue::Object(details));
        }

        if let Some(state) = &description.lifecycle_state {
            dadl::write_attribute(&mut self.out, 1, "lifecycle_state", &DadlValue::string(state));
        }
    }

    fn definition(&mut self) {
        self.line(0, "definition");
        self.object(self.tree.root(), 1);
        self.out.push('\n');
    }

    fn object(&mut self, id: NodeId, depth: usize) {
        let tree = self.tree;
        let Some(node) = tree.get(id) else {
            return;
        };
        let head = object_head(node);
        let comment = self.comment(&node.code);

        match &node.kind {
            NodeKind::Element(ValueConstraint::ExternalReference { includes, excludes }) => {
                if includes.is_empty() && excludes.is_empty() {
                    self.line(depth, &format!("allow_archetype {} matches {{*}}{}", head, comment));
                    return;
                }
                self.line(depth, &format!("allow_archetype {} matches {{{}", head, comment));
                self.assertions(depth + 1, "include", includes);
                self.assertions(depth + 1, "exclude", excludes);
                self.line(depth, "}");
            }
            NodeKind::Element(ValueConstraint::Any { rm_type: None }) => {
                self.line(depth, &format!("{} matches {{*}}{}", head, comment));
            }
            NodeKind::Element(value) => {
                self.line(depth, &format!("{} matches {{{}", head, comment));
                self.line(depth + 1, &format!("{} matches {{", well_known::VALUE_ATTRIBUTE));
                self.value(value, depth + 2);
                self.line(depth + 1, "}");
                self.line(depth, "}");
            }
            NodeKind::Container(attributes) | NodeKind::Cluster(attributes) => {
                if attributes.is_empty() {
                    self.line(depth, &format!("{} matches {{*}}{}", head, comment));
                    return;
                }
                self.line(depth, &format!("{} matches {{{}", head, comment));
                for attribute in attributes {
                    self.attribute(attribute, depth + 1);
                }
                self.line(depth, "}");
            }
        }
    }

    fn attribute(&mut self, attribute: &AttributeConstraint, depth: usize) {
        let mut head = attribute.name.clone();
        if let Some(existence) = attribute.existence {
            head.push_str(&format!(" existence matches {{{}}}", existence));
        }
        if let Some(cardinality) = attribute.cardinality {
            head.push_str(&format!(" cardinality matches {{{}}}", cardinality));
        }

        if attribute.children.is_empty() && attribute.references.is_empty() {
            self.line(depth, &format!("{} matches {{*}}", head));
            return;
        }
        self.line(depth, &format!("{} matches {{", head));
        for &child in &attribute.children {
            self.object(child, depth + 1);
        }
        for reference in &attribute.references {
            let occurrences = if reference.occurrences == Interval::required() {
                String::new()
            } else {
                format!(" occurrences matches {{{}}}", reference.occurrences)
            };
            self.line(
                depth + 1,
                &format!("use_node {}{} {}", reference.rm_type, occurrences, reference.path),
            );
        }
        self.line(depth, "}");
    }

    fn value(&mut self, value: &ValueConstraint, depth: usize) {
        match value {
            ValueConstraint::CodedChoice { options } => {
                for (i, option) in options.iter().enumerate() {
                    let separator = if i + 1 < options.len() { "," } else { "" };
                    let comment = self.local_comment(&option.terminology, &option.code);
                    self.line(
                        depth,
                        &format!(
                            "{}|[{}::{}]{}{}",
                            option.ordinal, option.terminology, option.code, separator, comment
                        ),
                    );
                }
            }
            ValueConstraint::CodePhrase { terminology, codes } => {
                self.line(depth, &format!("{} matches {{", well_known::DV_CODED_TEXT));
                self.line(
                    depth + 1,
                    &format!("{} matches {{", well_known::DEFINING_CODE_ATTRIBUTE),
                );
                self.line(depth + 2, &format!("[{}::", terminology));
                for (i, code) in codes.iter().enumerate() {
                    let separator = if i + 1 < codes.len() { "," } else { "]" };
                    let comment = self.local_comment(terminology, code);
                    self.line(depth + 2, &format!("{}{}{}", code, separator, comment));
                }
                self.line(depth + 1, "}");
                self.line(depth, "}");
            }
            ValueConstraint::FreeText => {
                self.line(depth, &format!("{} matches {{*}}", well_known::DV_TEXT));
            }
            ValueConstraint::Any { rm_type: Some(rm_type) } => {
                self.line(depth, &format!("{} matches {{*}}", rm_type));
            }
            ValueConstraint::Any { rm_type: None } => self.line(depth, "*"),
            ValueConstraint::ExternalReference { .. } => {}
        }
    }

    fn local_comment(&self, terminology: &str, code: &str) -> String {
        if terminology == well_known::LOCAL_TERMINOLOGY {
            self.comment(code)
        } else {
            String::new()
        }
    }

    fn assertions(&mut self, depth: usize, keyword: &str, assertions: &[SlotAssertion]) {
        if assertions.is_empty() {
            return;
        }
        self.line(depth, keyword);
        for assertion in assertions {
            self.line(
                depth + 1,
                &format!("{} matches {{/{}/}}", assertion.path, assertion.pattern),
            );
        }
    }

    fn ontology_section(&mut self) {
        let ontology = self.ontology;
        self.line(0, "ontology");

        if !ontology.terminologies_available().is_empty() {
            dadl::write_attribute(
                &mut self.out,
                1,
                "terminologies_available",
                &DadlValue::Strings {
                    values: ontology.terminologies_available().to_vec(),
                    open: true,
                },
            );
        }

        let term_definitions = term_table(ontology, |code| !code.starts_with("ac"));
        if let Some(table) = term_definitions {
            dadl::write_attribute(&mut self.out, 1, "term_definitions", &table);
        }
        let constraint_definitions = term_table(ontology, |code| code.starts_with("ac"));
        if let Some(table) = constraint_definitions {
            dadl::write_attribute(&mut self.out, 1, "constraint_definitions", &table);
        }

        let mut grouped: BTreeMap<&str, Vec<(DadlKey, DadlValue)>> = BTreeMap::new();
        for binding in ontology.bindings() {
            grouped.entry(&binding.terminology).or_default().push((
                DadlKey::Key(binding.code.clone()),
                DadlValue::Codes(vec![CodeRef {
                    terminology: binding.terminology.clone(),
                    code: binding.target.clone(),
                }]),
            ));
        }
        let by_terminology: Vec<(DadlKey, DadlValue)> = grouped
            .into_iter()
            .map(|(terminology, items)| {
                (
                    DadlKey::Key(terminology.to_string()),
                    DadlValue::Object(vec![(
                        DadlKey::Attr("items".to_string()),
                        DadlValue::Object(items),
                    )]),
                )
            })
            .collect();
        if !by_terminology.is_empty() {
            dadl::write_attribute(
                &mut self.out,
                1,
                "term_bindings",
                &DadlValue::Object(by_terminology),
            );
        }
    }
}

/// `ELEMENT[at0050] occurrences matches {0..1}`; required occurrences are implied.
fn object_head(node: &ConstraintNode) -> String {
    if node.occurrences == Interval::required() {
        format!("{}[{}]", node.rm_type, node.code)
    } else {
        format!(
            "{}[{}] occurrences matches {{{}}}",
            node.rm_type, node.code, node.occurrences
        )
    }
}

fn language_code(language: &str) -> DadlValue {
    DadlValue::Codes(vec![CodeRef {
        terminology: well_known::ISO_639_1.to_string(),
        code: language.to_string(),
    }])
}

fn pairs(pairs: &[(String, String)]) -> DadlValue {
    DadlValue::Object(
        pairs
            .iter()
            .map(|(k, v)| (DadlKey::Key(k.clone()), DadlValue::string(v.clone())))
            .collect(),
    )
}

/// Builds `["lang"] = < items = < ["code"] = < text description > > >` for
/// the codes accepted by `filter`, or `None` if no code qualifies.
fn term_table(ontology: &Ontology, filter: impl Fn(&str) -> bool) -> Option<DadlValue> {
    let mut languages = Vec::new();
    for language in ontology.languages() {
        let items: Vec<(DadlKey, DadlValue)> = ontology
            .entries(language)
            .filter(|entry| filter(&entry.code))
            .map(|entry| {
                let mut fields = vec![
                    (DadlKey::Attr("text".to_string()), DadlValue::string(&entry.text)),
                    (
                        DadlKey::Attr("description".to_string()),
                        DadlValue::string(&entry.description),
                    ),
                ];
                if let Some(comment) = &entry.comment {
                    fields.push((DadlKey::Attr("comment".to_string()), DadlValue::string(comment)));
                }
                (DadlKey::Key(entry.code.clone()), DadlValue::Object(fields))
            })
            .collect();
        if !items.is_empty() {
            languages.push((
                DadlKey::Key(language.to_string()),
                DadlValue::Object(vec![(
                    DadlKey::Attr("items".to_string()),
                    DadlValue::Object(items),
                )]),
            ));
        }
    }
    (!languages.is_empty()).then(|| DadlValue::Object(languages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_archetype;
    use crate::types::ParseConfig;

    const URINALYSIS: &str =
        include_str!("../../../archetypes/openEHR-EHR-OBSERVATION.urinalysis.v1.adl");

    const DEVICE: &str = r#"archetype (adl_version=1.4)
	openEHR-EHR-CLUSTER.device.v1

concept
	[at0000]
language
	original_language = <[ISO_639-1::en]>
definition
	CLUSTER[at0000] matches {
		items existence matches {1..1} cardinality matches {1..*; unordered; unique} matches {
			ELEMENT[at0001] occurrences matches {1} matches {
				value matches {
					DV_CODED_TEXT matches {
						defining_code matches {[openehr::124, 125]}
					}
				}
			}
			ELEMENT[at0002] occurrences matches {0..1} matches {
				value matches {
					DV_COUNT matches {
						magnitude matches {|0..100|}
					}
				}
			}
			allow_archetype CLUSTER[at0003] occurrences matches {0..*} matches {
				include
					archetype_id/value matches {/openEHR-EHR-CLUSTER\.device_.*\.v1/}
				exclude
					archetype_id/value matches {/openEHR-EHR-CLUSTER\.device_legacy\.v1/}
			}
			use_node ELEMENT occurrences matches {0..3} /items[at0002]
		}
	}
ontology
	term_definitions = <
		["en"] = <
			items = <
				["at0000"] = <text = <"Device"> description = <"">>
				["at0001"] = <text = <"Status"> description = <"">>
				["at0002"] = <text = <"Count"> description = <"">>
				["at0003"] = <text = <"Component"> description = <"">>
			>
		>
	>
"#;

    fn make_archetype() -> Archetype {
        parse_archetype(URINALYSIS, &ParseConfig::default()).unwrap()
    }

    #[test]
    fn test_round_trip_sample() {
        let archetype = make_archetype();
        let text = to_adl(&archetype);
        let reparsed = parse_archetype(&text, &ParseConfig::default()).unwrap();
        assert_eq!(reparsed, archetype);
        assert_eq!(reparsed.definition(), archetype.definition());
    }

    #[test]
    fn test_round_trip_is_stable() {
        let first = to_adl(&make_archetype());
        let second = to_adl(&parse_archetype(&first, &ParseConfig::default()).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_output_shape() {
        let text = to_adl(&make_archetype());
        assert!(text.starts_with("archetype (adl_version=1.4)\n\topenEHR-EHR-OBSERVATION.urinalysis.v1\n"));
        assert!(text.contains("\t[at0000]\t-- Urinalysis\n"));
        assert!(text.contains("ELEMENT[at0050] occurrences matches {0..1} matches {\t-- Glucose\n"));
        assert!(text.contains("3|[local::at0053],\t-- +\n"));
        assert!(text.contains("events cardinality matches {1..*; unordered} matches {"));
        assert!(text.contains("DV_TEXT matches {*}"));
        assert!(text.contains("allow_archetype CLUSTER[at0104] occurrences matches {0..*} matches {"));
        assert!(text.contains("terminologies_available = <\"LOINC\", ...>"));
        assert!(text.contains("[\"at0050\"] = <[LOINC::25428-4]>"));
    }

    #[test]
    fn test_round_trip_preserves_escaped_text() {
        let source = URINALYSIS.replace(
            "<\"Additional narrative about the test.\">",
            "<\"Narrative, \\\"quoted\\\" -- not a comment\">",
        );
        let archetype = parse_archetype(&source, &ParseConfig::default()).unwrap();
        assert_eq!(
            archetype.ontology().resolve("at0100", "en").unwrap().description,
            "Narrative, \"quoted\" -- not a comment"
        );
        let reparsed = parse_archetype(&to_adl(&archetype), &ParseConfig::default()).unwrap();
        assert_eq!(reparsed, archetype);
    }

    #[test]
    fn test_round_trip_constraint_forms() {
        let archetype = parse_archetype(DEVICE, &ParseConfig::default()).unwrap();
        let tree = archetype.definition();
        let items = &tree.root_node().attributes()[0];
        assert_eq!(items.existence, Some(Interval::required()));
        assert!(items.cardinality.is_some_and(|c| c.unique && !c.ordered));
        assert_eq!(items.references.len(), 1);

        let status = tree.get(tree.find_by_code("at0001").unwrap()).unwrap();
        assert_eq!(status.occurrences, Interval::required());
        assert_eq!(
            status.value(),
            Some(&ValueConstraint::CodePhrase {
                terminology: "openehr".to_string(),
                codes: vec!["124".to_string(), "125".to_string()],
            })
        );
        let count = tree.get(tree.find_by_code("at0002").unwrap()).unwrap();
        assert_eq!(
            count.value(),
            Some(&ValueConstraint::Any {
                rm_type: Some("DV_COUNT".to_string()),
            })
        );

        let text = to_adl(&archetype);
        assert!(text.contains(
            "items existence matches {1..1} cardinality matches {1..*; unordered; unique} matches {"
        ));
        assert!(text.contains("DV_COUNT matches {*}"));
        assert!(text.contains("exclude\n"));
        assert!(text.contains("use_node ELEMENT occurrences matches {0..3} /items[at0002]\n"));

        let reparsed = parse_archetype(&text, &ParseConfig::default()).unwrap();
        assert_eq!(reparsed, archetype);
        assert_eq!(to_adl(&reparsed), text);
    }
}
