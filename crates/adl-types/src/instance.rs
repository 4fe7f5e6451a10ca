//! Candidate data instances.
//!
//! An instance is a tree keyed by local code. Leaves carry a single scalar;
//! repeated nodes are simply sibling entries with the same code.
//!
//! ```
//! use adl_types::{InstanceNode, InstanceValue};
//!
//! let glucose = InstanceNode::leaf("at0050", 3);
//! assert_eq!(glucose.value, Some(InstanceValue::Integer(3)));
//!
//! let tree = InstanceNode::new("at0003")
//!     .with_child(glucose)
//!     .with_child(InstanceNode::leaf("at0100", "Collected after exercise"));
//! assert_eq!(tree.children_with_code("at0050").count(), 1);
//! ```

use crate::LocalCode;

/// A scalar supplied for an element.
///
/// Integers select coded values by ordinal; text selects them by code, and is
/// also used for free text and for slot filler archetype ids. Decimals and
/// booleans are accepted by unconstrained elements only.
///
/// Decimals compare by bit pattern, so `NaN == NaN` and `0.0 != -0.0`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum InstanceValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value (ordinal).
    Integer(i64),
    /// Decimal value (magnitudes, proportions).
    Decimal(f64),
    /// Text value (code, free text or archetype id).
    Text(String),
}

impl InstanceValue {
    /// Returns the text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl PartialEq for InstanceValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for InstanceValue {}

impl std::hash::Hash for InstanceValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Boolean(b) => b.hash(state),
            Self::Integer(n) => n.hash(state),
            Self::Decimal(d) => d.to_bits().hash(state),
            Self::Text(text) => text.hash(state),
        }
    }
}

impl std::fmt::Display for InstanceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            // Debug keeps the fraction of whole decimals: 7.0, not 7
            Self::Decimal(d) => write!(f, "{:?}", d),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<bool> for InstanceValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for InstanceValue {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<i64> for InstanceValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for InstanceValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u32> for InstanceValue {
    fn from(n: u32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<&str> for InstanceValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for InstanceValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// One node of a candidate instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceNode {
    /// Local code of the constraint node this instance node claims to match.
    pub code: LocalCode,
    /// Scalar value for elements.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub value: Option<InstanceValue>,
    /// Child nodes, in order.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<InstanceNode>,
}

impl InstanceNode {
    /// Creates a node without value or children.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Creates a leaf carrying a value.
    pub fn leaf(code: impl Into<String>, value: impl Into<InstanceValue>) -> Self {
        Self::new(code).with_value(value)
    }

    /// Sets the value.
    pub fn with_value(mut self, value: impl Into<InstanceValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Appends a child.
    pub fn with_child(mut self, child: InstanceNode) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = InstanceNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Iterates over the children carrying a given code.
    pub fn children_with_code<'a>(
        &'a self,
        code: &'a str,
    ) -> impl Iterator<Item = &'a InstanceNode> + 'a {
        self.children.iter().filter(move |c| c.code == code)
    }

    /// Counts the nodes of this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(InstanceNode::size).sum::<usize>()
    }
}
