//! Validator and binder.
//!
//! Walks a candidate instance in lock-step with an archetype's constraint
//! tree. Every violation found is collected; when there are none the walk
//! yields a [`BoundInstance`] carrying ontology text for each node and coded
//! value.

use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use adl_types::{
    well_known, AttributeConstraint, BoundInstance, BoundNode, BoundValue, Cardinality,
    ConstraintNode, InstanceNode, InstanceValue, Interval, NodeId, NodeKind, ValueConstraint,
    Violation,
};

use crate::archetype::Archetype;
use crate::types::ValidationConfig;

/// Outcome of validating one instance.
pub type ValidationResult = Result<BoundInstance, Vec<Violation>>;

/// Looks up archetypes that fill slots.
pub trait SlotResolver: Send + Sync {
    /// Returns the archetype with the given id, if known.
    fn resolve(&self, archetype_id: &str) -> Option<Arc<Archetype>>;
}

/// Validates instances against one archetype.
///
/// A validator is immutable and can be shared across threads; every call to
/// [`Validator::validate`] is independent.
///
/// # Example
///
/// ```ignore
/// use adl_loader::{Archetype, Validator};
/// use adl_types::InstanceNode;
///
/// let validator = Validator::new(Archetype::parse(&source)?);
/// let bound = validator.validate(&instance).expect("instance conforms");
/// assert_eq!(bound.display_of("at0050"), Some("+"));
/// ```
#[derive(Clone)]
pub struct Validator {
    archetype: Arc<Archetype>,
    config: ValidationConfig,
    resolver: Option<Arc<dyn SlotResolver>>,
}

impl Validator {
    /// Creates a validator with the default configuration.
    pub fn new(archetype: impl Into<Arc<Archetype>>) -> Self {
        Self {
            archetype: archetype.into(),
            config: ValidationConfig::default(),
            resolver: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the resolver used to descend into slot fillers.
    pub fn with_resolver(mut self, resolver: Arc<dyn SlotResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Returns the archetype instances are validated against.
    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates one instance.
    ///
    /// Returns the bound instance, or every violation found in walk order.
    pub fn validate(&self, instance: &InstanceNode) -> ValidationResult {
        run(
            &self.archetype,
            &self.config,
            self.resolver.as_deref(),
            instance,
        )
    }

    /// Validates many instances, in parallel with the `parallel` feature.
    ///
    /// Results are returned in input order.
    #[cfg(feature = "parallel")]
    pub fn validate_batch(&self, instances: &[InstanceNode]) -> Vec<ValidationResult> {
        instances.par_iter().map(|i| self.validate(i)).collect()
    }

    /// Validates many instances sequentially.
    #[cfg(not(feature = "parallel"))]
    pub fn validate_batch(&self, instances: &[InstanceNode]) -> Vec<ValidationResult> {
        instances.iter().map(|i| self.validate(i)).collect()
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("archetype", &self.archetype.id().as_str())
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Validates an instance against an archetype with the default configuration
/// and no slot resolution.
pub fn validate(archetype: &Archetype, instance: &InstanceNode) -> ValidationResult {
    run(archetype, &ValidationConfig::default(), None, instance)
}

fn run(
    archetype: &Archetype,
    config: &ValidationConfig,
    resolver: Option<&dyn SlotResolver>,
    instance: &InstanceNode,
) -> ValidationResult {
    let language = config
        .language
        .as_deref()
        .unwrap_or_else(|| archetype.original_language());
    let mut walk = Walk {
        archetype,
        config,
        resolver,
        language,
        violations: Vec::new(),
    };
    let root = walk.root(instance, "");

    tracing::debug!(
        "{}: validated {} instance nodes, {} violations",
        archetype.id(),
        instance.size(),
        walk.violations.len()
    );

    if walk.violations.is_empty() {
        Ok(BoundInstance {
            archetype_id: archetype.id().to_string(),
            language: language.to_string(),
            root,
        })
    } else {
        Err(walk.violations)
    }
}

/// State of one validation run over one archetype.
struct Walk<'a> {
    archetype: &'a Archetype,
    config: &'a ValidationConfig,
    resolver: Option<&'a dyn SlotResolver>,
    language: &'a str,
    violations: Vec<Violation>,
}

impl<'a> Walk<'a> {
    /// Checks the instance root against the definition root. `prefix` is the
    /// path of the slot this archetype fills, empty at the top level.
    fn root(&mut self, instance: &InstanceNode, prefix: &str) -> BoundNode {
        let archetype = self.archetype;
        let tree = archetype.definition();
        let path = format!("{}/{}", prefix, instance.code);
        if instance.code != tree.root_node().code {
            self.violations.push(Violation::UnexpectedNode {
                path,
                code: instance.code.clone(),
            });
            return self.plain(instance);
        }
        let mut bound = self.node(tree.root(), instance, &path);
        bound.archetype_id = Some(archetype.id().to_string());
        bound
    }

    fn node(&mut self, id: NodeId, instance: &InstanceNode, path: &str) -> BoundNode {
        let archetype = self.archetype;
        let tree = archetype.definition();
        let Some(constraint) = tree.get(id) else {
            return self.plain(instance);
        };

        let mut bound = BoundNode {
            code: instance.code.clone(),
            name: self.text(&constraint.code),
            archetype_id: None,
            value: None,
            children: Vec::new(),
        };

        match &constraint.kind {
            NodeKind::Container(attributes) | NodeKind::Cluster(attributes) => {
                bound.children = self.attributes(constraint, attributes, instance, path);
            }
            NodeKind::Element(value) if value.is_slot() => {
                self.slot(id, constraint, instance, path, &mut bound);
            }
            NodeKind::Element(value) => {
                bound.value = instance
                    .value
                    .as_ref()
                    .and_then(|raw| self.value(constraint, value, raw, path));
                bound.children = self.unexpected_children(instance, path);
            }
        }
        bound
    }

    /// Checks existence, cardinality and occurrences of the children of a
    /// container, then descends into each matched child.
    fn attributes(
        &mut self,
        owner: &ConstraintNode,
        attributes: &'a [AttributeConstraint],
        instance: &InstanceNode,
        path: &str,
    ) -> Vec<BoundNode> {
        let archetype = self.archetype;
        let tree = archetype.definition();
        // Declared position of a code within an attribute, and the node that
        // constrains it. `use_node` references rank after the children.
        let declared = |attribute: &AttributeConstraint, code: &str| {
            let child = attribute
                .children
                .iter()
                .position(|&child| tree.get(child).is_some_and(|c| c.code == code))
                .map(|i| (i, attribute.children[i]));
            child.or_else(|| {
                let i = attribute.references.iter().position(|r| r.target == code)?;
                Some((attribute.children.len() + i, tree.find_by_code(code)?))
            })
        };

        for attribute in attributes {
            let positions: Vec<usize> = instance
                .children
                .iter()
                .filter_map(|child| declared(attribute, &child.code).map(|(i, _)| i))
                .collect();

            if let Some(existence) = attribute.existence {
                if existence.is_required() && positions.is_empty() {
                    self.violations.push(Violation::Existence {
                        path: path.to_string(),
                        code: owner.code.clone(),
                        attribute: attribute.name.clone(),
                        expected: existence,
                    });
                }
            }

            if let Some(cardinality) = attribute.cardinality {
                let in_order = positions.windows(2).all(|w| w[0] <= w[1]);
                let count_ok = cardinality.interval.allows(positions.len());
                if !count_ok || (cardinality.ordered && !in_order) {
                    self.violations.push(Violation::Cardinality {
                        path: path.to_string(),
                        code: owner.code.clone(),
                        attribute: attribute.name.clone(),
                        expected: cardinality,
                        actual: positions.len(),
                        order_mismatch: count_ok,
                    });
                }
            }

            // A single-valued attribute holds one object, whichever alternative it is.
            if !attribute.is_multiple() && positions.len() > 1 {
                let required = attribute.existence.is_some_and(|e| e.is_required());
                let expected = Interval::new(u32::from(required), Some(1));
                self.violations.push(Violation::Cardinality {
                    path: path.to_string(),
                    code: owner.code.clone(),
                    attribute: attribute.name.clone(),
                    expected: Cardinality::ordered(expected),
                    actual: positions.len(),
                    order_mismatch: false,
                });
            }

            let declared_occurrences = attribute
                .children
                .iter()
                .filter_map(|&child| tree.get(child))
                .map(|node| (&node.code, node.occurrences))
                .chain(attribute.references.iter().map(|r| (&r.target, r.occurrences)));
            for (code, occurrences) in declared_occurrences {
                let count = instance.children_with_code(code).count();
                if !occurrences.allows(count) {
                    let path = if count == 0 {
                        path.to_string()
                    } else {
                        format!("{}/{}", path, code)
                    };
                    self.violations.push(Violation::Occurrence {
                        path,
                        code: code.clone(),
                        expected: occurrences,
                        actual: count,
                    });
                }
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        let mut children = Vec::with_capacity(instance.children.len());
        for child in &instance.children {
            let index = seen.iter().filter(|c| **c == child.code).count() + 1;
            seen.push(&child.code);
            let siblings = instance.children_with_code(&child.code).count();
            let child_path = if siblings > 1 {
                format!("{}/{}[{}]", path, child.code, index)
            } else {
                format!("{}/{}", path, child.code)
            };

            let target = attributes
                .iter()
                .find_map(|attribute| declared(attribute, &child.code).map(|(_, id)| id));
            match target {
                Some(id) => children.push(self.node(id, child, &child_path)),
                None => {
                    if let Some(bound) = self.unexpected(child, child_path) {
                        children.push(bound);
                    }
                }
            }
        }
        children
    }

    /// Binds a supplied value, or records why it does not fit.
    fn value(
        &mut self,
        node: &ConstraintNode,
        constraint: &ValueConstraint,
        raw: &InstanceValue,
        path: &str,
    ) -> Option<BoundValue> {
        match constraint {
            ValueConstraint::CodedChoice { options } => {
                let chosen = options.iter().find(|option| match raw {
                    InstanceValue::Integer(n) => i64::from(option.ordinal) == *n,
                    InstanceValue::Text(text) => {
                        *text == option.code
                            || *text == format!("{}::{}", option.terminology, option.code)
                    }
                    InstanceValue::Decimal(_) | InstanceValue::Boolean(_) => false,
                });
                match chosen {
                    Some(option) => {
                        let mut bound = self.coded(raw, &option.terminology, &option.code);
                        bound.ordinal = Some(option.ordinal);
                        Some(bound)
                    }
                    None => {
                        self.violations.push(Violation::ValueNotInSet {
                            path: path.to_string(),
                            code: node.code.clone(),
                            allowed: options
                                .iter()
                                .map(|o| format!("{}|{}", o.ordinal, o.code))
                                .collect(),
                            actual: raw.to_string(),
                        });
                        None
                    }
                }
            }
            ValueConstraint::CodePhrase { terminology, codes } => {
                let chosen = raw.as_text().and_then(|text| {
                    codes.iter().find(|code| {
                        text == code.as_str() || text == format!("{}::{}", terminology, code)
                    })
                });
                match chosen {
                    Some(code) => Some(self.coded(raw, terminology, code)),
                    None => {
                        self.violations.push(Violation::ValueNotInSet {
                            path: path.to_string(),
                            code: node.code.clone(),
                            allowed: codes.clone(),
                            actual: raw.to_string(),
                        });
                        None
                    }
                }
            }
            ValueConstraint::FreeText => Some(BoundValue {
                display: Some(raw.to_string()),
                ..BoundValue::plain(raw.clone())
            }),
            ValueConstraint::Any { .. } | ValueConstraint::ExternalReference { .. } => {
                Some(BoundValue::plain(raw.clone()))
            }
        }
    }

    fn coded(&self, raw: &InstanceValue, terminology: &str, code: &str) -> BoundValue {
        let entry = (terminology == well_known::LOCAL_TERMINOLOGY)
            .then(|| self.archetype.ontology().resolve(code, self.language).ok())
            .flatten();
        BoundValue {
            raw: raw.clone(),
            code: Some(code.to_string()),
            ordinal: None,
            display: entry.map(|e| e.text.clone()),
            description: entry.map(|e| e.description.clone()),
        }
    }

    /// Checks a slot filler id and, when the filler archetype is known,
    /// validates the filler's root against it.
    fn slot(
        &mut self,
        id: NodeId,
        node: &ConstraintNode,
        instance: &InstanceNode,
        path: &str,
        bound: &mut BoundNode,
    ) {
        let archetype = self.archetype;
        let Some(matcher) = archetype.slot_matcher(id) else {
            return;
        };
        let filler_id = instance.value.as_ref().and_then(InstanceValue::as_text);
        let Some(filler_id) = filler_id.filter(|f| matcher.matches(f)) else {
            self.violations.push(Violation::PatternMismatch {
                path: path.to_string(),
                code: node.code.clone(),
                patterns: matcher.patterns(),
                actual: instance
                    .value
                    .as_ref()
                    .map(InstanceValue::to_string)
                    .unwrap_or_default(),
            });
            bound.children = instance.children.iter().map(|c| self.plain(c)).collect();
            return;
        };
        bound.value = instance.value.clone().map(BoundValue::plain);

        let filler = self
            .resolver
            .filter(|_| self.config.resolve_slots)
            .and_then(|resolver| resolver.resolve(filler_id));
        let Some(filler) = filler else {
            tracing::debug!("{}: slot filler {} not resolved", path, filler_id);
            bound.children = instance.children.iter().map(|c| self.plain(c)).collect();
            return;
        };

        let mut nested = Walk {
            archetype: &filler,
            config: self.config,
            resolver: self.resolver,
            language: self.language,
            violations: Vec::new(),
        };
        bound.children = instance
            .children
            .iter()
            .map(|child| nested.root(child, path))
            .collect();
        self.violations.append(&mut nested.violations);
    }

    /// Records an undeclared child, or binds it plainly when unknown nodes
    /// are allowed.
    fn unexpected(&mut self, instance: &InstanceNode, path: String) -> Option<BoundNode> {
        if self.config.allow_unknown_nodes {
            return Some(self.plain(instance));
        }
        self.violations.push(Violation::UnexpectedNode {
            path,
            code: instance.code.clone(),
        });
        None
    }

    /// Elements declare no children, so every child of one is unexpected.
    fn unexpected_children(&mut self, instance: &InstanceNode, path: &str) -> Vec<BoundNode> {
        instance
            .children
            .iter()
            .filter_map(|child| self.unexpected(child, format!("{}/{}", path, child.code)))
            .collect()
    }

    /// Binds a subtree without checking it against any constraint.
    fn plain(&self, instance: &InstanceNode) -> BoundNode {
        BoundNode {
            code: instance.code.clone(),
            name: self.text(&instance.code),
            archetype_id: None,
            value: instance.value.clone().map(BoundValue::plain),
            children: instance.children.iter().map(|c| self.plain(c)).collect(),
        }
    }

    fn text(&self, code: &str) -> Option<String> {
        self.archetype
            .ontology()
            .text(code, self.language)
            .map(str::to_string)
    }
}
