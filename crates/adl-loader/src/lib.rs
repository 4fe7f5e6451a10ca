//! # adl-loader
//!
//! Parser, ontology table and validator for openEHR ADL 1.4 archetypes.
//!
//! Archetype source text is parsed once into an immutable [`Archetype`]
//! (constraint tree plus [`Ontology`]); any number of [`Validator`]s can then
//! check candidate instances against it concurrently.
//!
//! ## Features
//!
//! - `parallel` (default): parallel repository loading and batch validation
//!   via rayon.
//!
//! ## Usage
//!
//! ```ignore
//! use adl_loader::{discover_adl_files, ArchetypeStore, Validator};
//! use adl_types::InstanceNode;
//! use std::sync::Arc;
//!
//! let mut store = ArchetypeStore::new();
//! store.load_all(&discover_adl_files("archetypes")?);
//! let store = Arc::new(store);
//!
//! let archetype = store.get_or_err("openEHR-EHR-OBSERVATION.urinalysis.v1")?;
//! let validator = Validator::new(archetype).with_resolver(store.clone());
//! match validator.validate(&instance) {
//!     Ok(bound) => println!("Glucose: {:?}", bound.display_of("at0050")),
//!     Err(violations) => violations.iter().for_each(|v| println!("{}", v)),
//! }
//! ```

#![warn(missing_docs)]

mod archetype;
mod dadl;
mod lexer;
pub mod loader;
mod ontology;
mod parser;
mod serializer;
pub mod store;
pub mod types;
pub mod validator;

pub use archetype::{Archetype, SlotMatcher};
pub use loader::discover_adl_files;
pub use ontology::Ontology;
pub use parser::parse_archetype;
pub use serializer::to_adl;
pub use store::ArchetypeStore;
pub use types::{
    AdlError, AdlFiles, AdlResult, LoadReport, ParseConfig, ParseStats, ValidationConfig,
};
pub use validator::{validate, SlotResolver, ValidationResult, Validator};

// Re-export adl-types for convenience
pub use adl_types;

#[cfg(test)]
mod tests {
    use super::*;
    use adl_types::{InstanceNode, ViolationKind};
    use std::sync::Arc;

    const URINALYSIS: &str =
        include_str!("../../../archetypes/openEHR-EHR-OBSERVATION.urinalysis.v1.adl");

    #[test]
    fn test_end_to_end() {
        let mut store = ArchetypeStore::new();
        let archetype = store.load_str(URINALYSIS).unwrap();
        let store: Arc<ArchetypeStore> = Arc::new(store);
        let validator = Validator::new(archetype).with_resolver(store);

        let instance = InstanceNode::new("at0000").with_child(
            InstanceNode::new("at0001").with_child(
                InstanceNode::new("at0002").with_child(
                    InstanceNode::new("at0003").with_children([
                        InstanceNode::leaf("at0050", 3),
                        InstanceNode::leaf("at0081", 5),
                    ]),
                ),
            ),
        );
        let bound = validator.validate(&instance).unwrap();
        assert_eq!(bound.display_of("at0050"), Some("+"));
        assert_eq!(bound.display_of("at0081"), Some("7.0"));

        let invalid = InstanceNode::new("at0000").with_child(InstanceNode::new("at0001"));
        let violations = validator.validate(&invalid).unwrap_err();
        assert_eq!(violations[0].kind(), ViolationKind::Cardinality);
    }

    #[test]
    fn test_round_trip_through_store() {
        let archetype = Archetype::parse(URINALYSIS).unwrap();
        let mut store = ArchetypeStore::new();
        let reloaded = store.load_str(&to_adl(&archetype)).unwrap();
        assert_eq!(*reloaded, archetype);
    }

    #[test]
    fn test_every_referenced_code_resolves() {
        let archetype = Archetype::parse(URINALYSIS).unwrap();
        for code in archetype.definition().referenced_codes() {
            assert!(
                archetype
                    .ontology()
                    .resolve(code, archetype.original_language())
                    .is_ok(),
                "{} does not resolve",
                code
            );
        }
    }
}
