//! Validation violations.
//!
//! Violations are reported in bulk: a validation run walks the whole
//! instance and returns every violation it found, in walk order.

use crate::{Cardinality, Interval, LocalCode};

/// Coarse classification of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ViolationKind {
    /// Child count or order of a multiple-valued attribute is wrong.
    Cardinality,
    /// A node appears too often or too rarely under its parent.
    Occurrence,
    /// A mandatory attribute has no children.
    Existence,
    /// A coded value is not part of the declared value set.
    ValueNotInSet,
    /// A slot filler id does not satisfy the slot patterns.
    PatternMismatch,
    /// An instance node does not correspond to any declared node.
    UnexpectedNode,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cardinality => "CardinalityViolation",
            Self::Occurrence => "OccurrenceViolation",
            Self::Existence => "ExistenceViolation",
            Self::ValueNotInSet => "ValueNotInSet",
            Self::PatternMismatch => "PatternMismatch",
            Self::UnexpectedNode => "UnexpectedNode",
        };
        f.write_str(name)
    }
}

/// A single conformance problem found in an instance.
///
/// Every variant carries the instance `path` (e.g. `/at0000/at0001/at0002[2]`)
/// and the offending local `code`.
///
/// # Examples
///
/// ```
/// use adl_types::{Interval, Violation, ViolationKind};
///
/// let violation = Violation::Occurrence {
///     path: "/at0000/at0001/at0002/at0003/at0050".to_string(),
///     code: "at0050".to_string(),
///     expected: Interval::optional(),
///     actual: 2,
/// };
/// assert_eq!(violation.kind(), ViolationKind::Occurrence);
/// assert_eq!(violation.expected(), "occurrences 0..1");
/// assert_eq!(violation.actual(), "2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Violation {
    /// Wrong number of children, or children out of declared order.
    Cardinality {
        /// Path of the owning container.
        path: String,
        /// Code of the owning container.
        code: LocalCode,
        /// Attribute whose children were counted.
        attribute: String,
        /// Declared cardinality.
        expected: Cardinality,
        /// Number of matching children found.
        actual: usize,
        /// True when the count is fine but an ordered attribute is out of order.
        order_mismatch: bool,
    },
    /// A node appears a number of times outside its occurrence range.
    Occurrence {
        /// Path of the node (or of its parent when the node is missing).
        path: String,
        /// Code of the node.
        code: LocalCode,
        /// Declared occurrences.
        expected: Interval,
        /// Number of sibling nodes carrying the code.
        actual: usize,
    },
    /// An attribute with mandatory existence has no children.
    Existence {
        /// Path of the owning container.
        path: String,
        /// Code of the owning container.
        code: LocalCode,
        /// Attribute that is missing.
        attribute: String,
        /// Declared existence.
        expected: Interval,
    },
    /// A coded value outside the declared value set.
    ValueNotInSet {
        /// Path of the element.
        path: String,
        /// Code of the element.
        code: LocalCode,
        /// Allowed values, rendered as `ordinal|code` or `code`.
        allowed: Vec<String>,
        /// The supplied value.
        actual: String,
    },
    /// A slot filler archetype id that does not satisfy the slot.
    PatternMismatch {
        /// Path of the slot node.
        path: String,
        /// Code of the slot node.
        code: LocalCode,
        /// Include patterns of the slot.
        patterns: Vec<String>,
        /// The supplied archetype id.
        actual: String,
    },
    /// An instance node that matches no declared node.
    UnexpectedNode {
        /// Path of the instance node.
        path: String,
        /// Code carried by the instance node.
        code: LocalCode,
    },
}

impl Violation {
    /// Returns the coarse kind.
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::Cardinality { .. } => ViolationKind::Cardinality,
            Self::Occurrence { .. } => ViolationKind::Occurrence,
            Self::Existence { .. } => ViolationKind::Existence,
            Self::ValueNotInSet { .. } => ViolationKind::ValueNotInSet,
            Self::PatternMismatch { .. } => ViolationKind::PatternMismatch,
            Self::UnexpectedNode { .. } => ViolationKind::UnexpectedNode,
        }
    }

    /// Returns the instance path.
    pub fn path(&self) -> &str {
        match self {
            Self::Cardinality { path, .. }
            | Self::Occurrence { path, .. }
            | Self::Existence { path, .. }
            | Self::ValueNotInSet { path, .. }
            | Self::PatternMismatch { path, .. }
            | Self::UnexpectedNode { path, .. } => path,
        }
    }

    /// Returns the offending local code.
    pub fn code(&self) -> &str {
        match self {
            Self::Cardinality { code, .. }
            | Self::Occurrence { code, .. }
            | Self::Existence { code, .. }
            | Self::ValueNotInSet { code, .. }
            | Self::PatternMismatch { code, .. }
            | Self::UnexpectedNode { code, .. } => code,
        }
    }

    /// Renders the violated constraint.
    pub fn expected(&self) -> String {
        match self {
            Self::Cardinality {
                attribute,
                expected,
                order_mismatch,
                ..
            } => {
                if *order_mismatch {
                    format!("{} in declared order ({})", attribute, expected)
                } else {
                    format!("{} cardinality {}", attribute, expected)
                }
            }
            Self::Occurrence { expected, .. } => format!("occurrences {}", expected),
            Self::Existence {
                attribute, expected, ..
            } => format!("{} existence {}", attribute, expected),
            Self::ValueNotInSet { allowed, .. } => format!("one of {{{}}}", allowed.join(", ")),
            Self::PatternMismatch { patterns, .. } => {
                let patterns: Vec<String> = patterns.iter().map(|p| format!("/{}/", p)).collect();
                format!("archetype id matching {}", patterns.join(" or "))
            }
            Self::UnexpectedNode { .. } => "a declared node".to_string(),
        }
    }

    /// Renders the value that was found.
    pub fn actual(&self) -> String {
        match self {
            Self::Cardinality {
                actual,
                order_mismatch,
                ..
            } => {
                if *order_mismatch {
                    format!("{} children out of order", actual)
                } else {
                    actual.to_string()
                }
            }
            Self::Occurrence { actual, .. } => actual.to_string(),
            Self::Existence { .. } => "absent".to_string(),
            Self::ValueNotInSet { actual, .. } | Self::PatternMismatch { actual, .. } => {
                actual.clone()
            }
            Self::UnexpectedNode { code, .. } => code.clone(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}: expected {}, found {}",
            self.kind(),
            self.path(),
            self.expected(),
            self.actual()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_rendering() {
        let violation = Violation::Cardinality {
            path: "/at0000/at0001".to_string(),
            code: "at0001".to_string(),
            attribute: "events".to_string(),
            expected: Cardinality::unordered(Interval::one_or_more()),
            actual: 0,
            order_mismatch: false,
        };
        assert_eq!(violation.kind(), ViolationKind::Cardinality);
        assert_eq!(violation.code(), "at0001");
        assert_eq!(
            violation.to_string(),
            "CardinalityViolation at /at0000/at0001: expected events cardinality 1..*; unordered, found 0"
        );
    }

    #[test]
    fn test_value_not_in_set_rendering() {
        let violation = Violation::ValueNotInSet {
            path: "/x".to_string(),
            code: "at0050".to_string(),
            allowed: vec!["1|at0051".to_string(), "2|at0052".to_string()],
            actual: "7".to_string(),
        };
        assert_eq!(violation.expected(), "one of {1|at0051, 2|at0052}");
        assert_eq!(violation.actual(), "7");
    }

    #[test]
    fn test_pattern_mismatch_rendering() {
        let violation = Violation::PatternMismatch {
            path: "/x".to_string(),
            code: "at0104".to_string(),
            patterns: vec!["openEHR-EHR-CLUSTER\\.a\\.v1".to_string()],
            actual: "openEHR-EHR-CLUSTER.b.v1".to_string(),
        };
        assert_eq!(
            violation.expected(),
            "archetype id matching /openEHR-EHR-CLUSTER\\.a\\.v1/"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_violation_serde_is_tagged() {
        let violation = Violation::UnexpectedNode {
            path: "/at0000/at9999".to_string(),
            code: "at9999".to_string(),
        };
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["kind"], "unexpected_node");
        let back: Violation = serde_json::from_value(json).unwrap();
        assert_eq!(back, violation);
    }
}
