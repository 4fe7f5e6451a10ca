//! Well-known names used by ADL 1.4 archetypes.
//!
//! # Examples
//!
//! ```
//! use adl_types::well_known;
//!
//! assert_eq!(well_known::LOCAL_TERMINOLOGY, "local");
//! assert!(well_known::is_cluster_type("CLUSTER"));
//! ```

// =============================================================================
// Terminologies
// =============================================================================

/// Terminology id for codes defined in the archetype's own ontology.
pub const LOCAL_TERMINOLOGY: &str = "local";

/// Terminology id for language codes.
pub const ISO_639_1: &str = "ISO_639-1";

// =============================================================================
// Reference model types
// =============================================================================

/// Leaf data node.
pub const ELEMENT: &str = "ELEMENT";

/// Grouping of elements.
pub const CLUSTER: &str = "CLUSTER";

/// Plain text data value.
pub const DV_TEXT: &str = "DV_TEXT";

/// Coded text data value.
pub const DV_CODED_TEXT: &str = "DV_CODED_TEXT";

/// Ordinal data value.
pub const DV_ORDINAL: &str = "DV_ORDINAL";

// =============================================================================
// Grammar
// =============================================================================

/// ADL version assumed when the header does not state one.
pub const DEFAULT_ADL_VERSION: &str = "1.4";

/// Attribute of an element holding its data value.
pub const VALUE_ATTRIBUTE: &str = "value";

/// Attribute of a coded text holding its code.
pub const DEFINING_CODE_ATTRIBUTE: &str = "defining_code";

/// Path tested by archetype slot assertions.
pub const ARCHETYPE_ID_PATH: &str = "archetype_id/value";

/// Returns true if a reference model type groups elements.
pub fn is_cluster_type(rm_type: &str) -> bool {
    rm_type == CLUSTER
}

/// Returns true if a reference model type is a leaf element.
pub fn is_element_type(rm_type: &str) -> bool {
    rm_type == ELEMENT
}
