//! Package document assembly and validation for metsynth.
//!
//! Reconciled tables are reassembled into a namespaced METS tree, written as
//! XML, parsed back for round-trip checks and validated against JSON Schemas
//! applied to a JSON projection of the document.

pub mod document;
pub mod errors;
pub mod namespaces;
pub mod outline;
pub mod reassemble;
pub mod validate;

pub use document::{
    Element, nesting_depth, parse_document, to_json, to_xml_string, write_document,
};
pub use errors::{DocumentError, ReassemblyError, ValidationReportError};
pub use outline::{DivisionOutline, PackageOutline};
pub use reassemble::{FileIdMap, ReassembleOptions, ReassembledDocument, Reassembler, ReassemblyReport};
pub use validate::{DocumentValidator, MAX_NESTING_DEPTH, ValidationOutcome};
