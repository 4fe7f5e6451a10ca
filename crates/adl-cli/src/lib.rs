//! # adl-cli
//!
//! Validation of instance documents against an archetype repository.
//!
//! An instance document is JSON of the form
//!
//! ```json
//! {
//!   "archetype_id": "openEHR-EHR-OBSERVATION.urinalysis.v1",
//!   "instance": { "code": "at0000", "children": [ ... ] }
//! }
//! ```
//!
//! and every document yields one [`ValidationReport`].

#![warn(missing_docs)]

mod service;

pub use service::{ValidationReport, ValidationRequest, ValidationService, ViolationRecord};
