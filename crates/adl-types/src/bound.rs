//! Bound instances: validated instances enriched with ontology text.

use crate::{InstanceValue, LocalCode};

/// A supplied value together with what it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundValue {
    /// The value as supplied.
    pub raw: InstanceValue,
    /// Code the value resolved to, for coded values.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub code: Option<String>,
    /// Ordinal the value resolved to, for ordinal value sets.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ordinal: Option<u32>,
    /// Display text (ontology text for local codes, the text itself otherwise).
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub display: Option<String>,
    /// Ontology description of the resolved code.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl BoundValue {
    /// Creates a bound value that did not resolve to any code.
    pub fn plain(raw: InstanceValue) -> Self {
        Self {
            raw,
            code: None,
            ordinal: None,
            display: None,
            description: None,
        }
    }
}

/// A node of a bound instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundNode {
    /// Local code of the node.
    pub code: LocalCode,
    /// Ontology text naming the node.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// Archetype the node belongs to when it is the root of a slot filler.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub archetype_id: Option<String>,
    /// Bound value of an element.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub value: Option<BoundValue>,
    /// Bound children, in instance order.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<BoundNode>,
}

impl BoundNode {
    /// Depth-first search for the first node with a code.
    pub fn find(&self, code: &str) -> Option<&BoundNode> {
        if self.code == code {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(code))
    }

    /// Collects every node with a code, depth-first.
    pub fn find_all<'a>(&'a self, code: &str, out: &mut Vec<&'a BoundNode>) {
        if self.code == code {
            out.push(self);
        }
        for child in &self.children {
            child.find_all(code, out);
        }
    }
}

/// An instance that conforms to its archetype.
///
/// # Examples
///
/// ```
/// use adl_types::{BoundInstance, BoundNode, BoundValue, InstanceValue};
///
/// let bound = BoundInstance {
///     archetype_id: "openEHR-EHR-OBSERVATION.urinalysis.v1".to_string(),
///     language: "en".to_string(),
///     root: BoundNode {
///         code: "at0050".to_string(),
///         name: Some("Glucose".to_string()),
///         archetype_id: None,
///         value: Some(BoundValue {
///             raw: InstanceValue::Integer(3),
///             code: Some("at0053".to_string()),
///             ordinal: Some(3),
///             display: Some("+".to_string()),
///             description: None,
///         }),
///         children: vec![],
///     },
/// };
/// assert_eq!(bound.display_of("at0050"), Some("+"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundInstance {
    /// Archetype the instance was validated against.
    pub archetype_id: String,
    /// Language display text was resolved in.
    pub language: String,
    /// Bound root node.
    pub root: BoundNode,
}

impl BoundInstance {
    /// Finds the first node with a code.
    pub fn find(&self, code: &str) -> Option<&BoundNode> {
        self.root.find(code)
    }

    /// Returns the display text of the first node with a code.
    pub fn display_of(&self, code: &str) -> Option<&str> {
        self.find(code)?.value.as_ref()?.display.as_deref()
    }
}
