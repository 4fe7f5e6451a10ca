//! Occurrence, existence and cardinality intervals.
//!
//! ADL constrains how many times things may appear with closed integer
//! intervals whose upper bound may be unbounded:
//!
//! - **Occurrences** - how many times one object node may appear under its parent
//! - **Existence** - whether an attribute must be present at all
//! - **Cardinality** - how many children a multiple-valued attribute may hold,
//!   plus whether their order is significant
//!
//! # Examples
//!
//! ```
//! use adl_types::{Cardinality, Interval};
//!
//! let optional = Interval::parse("0..1").unwrap();
//! assert!(optional.allows(0));
//! assert!(optional.allows(1));
//! assert!(!optional.allows(2));
//!
//! let events = Cardinality::parse("1..*; unordered").unwrap();
//! assert!(!events.ordered);
//! assert!(!events.interval.allows(0));
//! assert!(events.interval.allows(42));
//! ```

/// Error type for interval and cardinality parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalParseError {
    /// Invalid format - expected "min..max" or a single integer.
    InvalidFormat(String),
    /// Invalid minimum value.
    InvalidMin(String),
    /// Invalid maximum value.
    InvalidMax(String),
    /// The lower bound is greater than the upper bound.
    MinExceedsMax {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },
    /// Unknown cardinality qualifier (expected ordered, unordered or unique).
    InvalidQualifier(String),
}

impl std::fmt::Display for IntervalParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(s) => {
                write!(f, "invalid interval format: '{}' (expected min..max)", s)
            }
            Self::InvalidMin(s) => write!(f, "invalid interval minimum: '{}'", s),
            Self::InvalidMax(s) => write!(f, "invalid interval maximum: '{}'", s),
            Self::MinExceedsMax { min, max } => {
                write!(f, "interval minimum {} exceeds maximum {}", min, max)
            }
            Self::InvalidQualifier(s) => write!(f, "invalid cardinality qualifier: '{}'", s),
        }
    }
}

impl std::error::Error for IntervalParseError {}

/// A closed integer interval with an optionally unbounded upper limit.
///
/// Represents constraints like "0..*", "0..1", "1..1", "1..*".
///
/// # Examples
///
/// ```
/// use adl_types::Interval;
///
/// let card = Interval::parse("0..*").unwrap();
/// assert_eq!(card.min, 0);
/// assert_eq!(card.max, None);
/// assert!(card.allows(100));
///
/// // A single integer is shorthand for an exact count
/// assert_eq!(Interval::parse("1").unwrap(), Interval::required());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    /// Minimum count (inclusive).
    pub min: u32,
    /// Maximum count (inclusive). None means unbounded (*).
    pub max: Option<u32>,
}

impl Interval {
    /// Creates a new interval with explicit min and max.
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Creates an unbounded interval (0..*).
    pub const fn unbounded() -> Self {
        Self { min: 0, max: None }
    }

    /// Creates an optional interval (0..1).
    pub const fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Creates a required single interval (1..1).
    ///
    /// This is the ADL default for object occurrences.
    pub const fn required() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Creates a required unbounded interval (1..*).
    pub const fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Parses an interval from a string like "0..*", "0..1", "1..1" or "2".
    pub fn parse(s: &str) -> Result<Self, IntervalParseError> {
        let s = s.trim();
        let (min_str, max_str) = match s.split_once("..") {
            Some((min, max)) => (min.trim(), max.trim()),
            None => (s, s),
        };

        if min_str.is_empty() || max_str.contains("..") {
            return Err(IntervalParseError::InvalidFormat(s.to_string()));
        }

        let min = min_str
            .parse::<u32>()
            .map_err(|_| IntervalParseError::InvalidMin(min_str.to_string()))?;

        let max = if max_str == "*" {
            None
        } else {
            Some(
                max_str
                    .parse::<u32>()
                    .map_err(|_| IntervalParseError::InvalidMax(max_str.to_string()))?,
            )
        };

        let interval = Self { min, max };
        interval.check()?;
        Ok(interval)
    }

    /// Verifies that min <= max.
    pub fn check(&self) -> Result<(), IntervalParseError> {
        match self.max {
            Some(max) if self.min > max => Err(IntervalParseError::MinExceedsMax {
                min: self.min,
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Returns true if the given count satisfies this interval.
    pub fn allows(&self, count: usize) -> bool {
        count >= self.min as usize && self.max.is_none_or(|max| count <= max as usize)
    }

    /// Returns true if this interval requires at least one occurrence.
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::required()
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// Cardinality of a multiple-valued attribute.
///
/// Written in ADL as `cardinality matches {1..*; unordered}`. When no
/// ordering qualifier is given the children are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cardinality {
    /// Permitted number of children.
    pub interval: Interval,
    /// Whether the relative order of children is significant.
    pub ordered: bool,
    /// Whether children must be distinct.
    pub unique: bool,
}

impl Cardinality {
    /// Creates an ordered, non-unique cardinality.
    pub const fn ordered(interval: Interval) -> Self {
        Self {
            interval,
            ordered: true,
            unique: false,
        }
    }

    /// Creates an unordered, non-unique cardinality.
    pub const fn unordered(interval: Interval) -> Self {
        Self {
            interval,
            ordered: false,
            unique: false,
        }
    }

    /// Parses a cardinality from a string like "0..*; unordered".
    pub fn parse(s: &str) -> Result<Self, IntervalParseError> {
        let mut parts = s.split(';').map(str::trim);
        let interval = Interval::parse(parts.next().unwrap_or(""))?;
        let mut cardinality = Self::ordered(interval);

        for qualifier in parts {
            match qualifier {
                "ordered" => cardinality.ordered = true,
                "unordered" => cardinality.ordered = false,
                "unique" => cardinality.unique = true,
                other => return Err(IntervalParseError::InvalidQualifier(other.to_string())),
            }
        }

        Ok(cardinality)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let order = if self.ordered { "ordered" } else { "unordered" };
        write!(f, "{}; {}", self.interval, order)?;
        if self.unique {
            write!(f, "; unique")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse_unbounded() {
        let interval = Interval::parse("0..*").unwrap();
        assert_eq!(interval.min, 0);
        assert_eq!(interval.max, None);
    }

    #[test]
    fn test_interval_parse_bounded() {
        let interval = Interval::parse("1..1").unwrap();
        assert_eq!(interval.max, Some(1));
        assert!(interval.is_required());
    }

    #[test]
    fn test_interval_parse_single_value() {
        assert_eq!(Interval::parse("3").unwrap(), Interval::new(3, Some(3)));
        assert_eq!(Interval::parse(" 0..1 ").unwrap(), Interval::optional());
    }

    #[test]
    fn test_interval_allows() {
        let optional = Interval::optional();
        assert!(optional.allows(0));
        assert!(optional.allows(1));
        assert!(!optional.allows(2));

        let one_or_more = Interval::one_or_more();
        assert!(!one_or_more.allows(0));
        assert!(one_or_more.allows(1));
        assert!(one_or_more.allows(10_000));
    }

    #[test]
    fn test_interval_parse_errors() {
        assert!(matches!(
            Interval::parse(""),
            Err(IntervalParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            Interval::parse("a..1"),
            Err(IntervalParseError::InvalidMin(_))
        ));
        assert!(matches!(
            Interval::parse("0..b"),
            Err(IntervalParseError::InvalidMax(_))
        ));
        assert!(matches!(
            Interval::parse("0..1..2"),
            Err(IntervalParseError::InvalidFormat(_))
        ));
        assert_eq!(
            Interval::parse("3..1"),
            Err(IntervalParseError::MinExceedsMax { min: 3, max: 1 })
        );
    }

    #[test]
    fn test_interval_display() {
        assert_eq!(Interval::unbounded().to_string(), "0..*");
        assert_eq!(Interval::optional().to_string(), "0..1");
        assert_eq!(Interval::one_or_more().to_string(), "1..*");
    }

    #[test]
    fn test_interval_default_is_required() {
        assert_eq!(Interval::default(), Interval::required());
    }

    #[test]
    fn test_cardinality_parse() {
        let card = Cardinality::parse("1..*; unordered").unwrap();
        assert_eq!(card.interval, Interval::one_or_more());
        assert!(!card.ordered);
        assert!(!card.unique);

        let card = Cardinality::parse("0..*; ordered; unique").unwrap();
        assert!(card.ordered);
        assert!(card.unique);
    }

    #[test]
    fn test_cardinality_defaults_to_ordered() {
        let card = Cardinality::parse("0..3").unwrap();
        assert!(card.ordered);
        assert_eq!(card.interval.max, Some(3));
    }

    #[test]
    fn test_cardinality_invalid_qualifier() {
        assert_eq!(
            Cardinality::parse("0..*; sorted"),
            Err(IntervalParseError::InvalidQualifier("sorted".to_string()))
        );
    }

    #[test]
    fn test_cardinality_display_parses_back() {
        for text in ["1..*; unordered", "0..*; ordered; unique", "0..2; ordered"] {
            let card = Cardinality::parse(text).unwrap();
            assert_eq!(card.to_string(), text);
            assert_eq!(Cardinality::parse(&card.to_string()).unwrap(), card);
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_interval_serde() {
        let interval = Interval::parse("0..*").unwrap();
        let json = serde_json::to_string(&interval).unwrap();
        let parsed: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(interval, parsed);
    }
}
