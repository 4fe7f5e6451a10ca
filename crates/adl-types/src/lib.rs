//! # adl-types
//!
//! Type definitions for openEHR ADL 1.4 archetypes.
//!
//! This crate provides the plain data types shared by the parser, the
//! validator and their callers: archetype identifiers, occurrence and
//! cardinality intervals, the constraint tree arena, ontology rows,
//! candidate instances, violations and bound instances.
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!   Disable this feature for zero-dependency usage.
//!
//! ## Usage
//!
//! ```rust
//! use adl_types::{ArchetypeId, InstanceNode, Interval};
//!
//! let id = ArchetypeId::parse("openEHR-EHR-OBSERVATION.urinalysis.v1").unwrap();
//! assert_eq!(id.rm_entity(), "OBSERVATION");
//!
//! let glucose = InstanceNode::leaf("at0050", 3);
//! assert!(Interval::optional().allows(1));
//! # let _ = glucose;
//! ```

#![warn(missing_docs)]

mod archetype_id;
mod bound;
pub mod constraint;
mod header;
mod instance;
mod interval;
mod term;
mod violation;
pub mod well_known;

// Re-export all public types at crate root
pub use archetype_id::{is_local_code, ArchetypeId, ArchetypeIdParseError, LocalCode};
pub use bound::{BoundInstance, BoundNode, BoundValue};
pub use constraint::{
    AttributeConstraint, CodedOption, ConstraintNode, ConstraintTree, InternalRef, NodeId,
    NodeKind, SlotAssertion, TreeBuilder, TreeError, ValueConstraint,
};
pub use header::{ArchetypeDescription, ArchetypeHeader, DescriptionDetail, Translation};
pub use instance::{InstanceNode, InstanceValue};
pub use interval::{Cardinality, Interval, IntervalParseError};
pub use term::{TermBinding, TermEntry};
pub use violation::{Violation, ViolationKind};
