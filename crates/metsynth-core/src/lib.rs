//! Core contracts and helpers for metsynth.
//!
//! This crate defines the tabular model shared by every pipeline stage, the
//! loader for the three archival package tables, the relationship modeler
//! handed to the generator and the referential integrity reconciler.

pub mod error;
pub mod graph;
pub mod load;
pub mod reconcile;
pub mod table;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{
    Relationship, RelationshipGraph, SemanticType, TableMetadata, build_relationship_graph,
    classify_column, graph_json_schema, validate_graph,
};
pub use load::{InputPaths, load_dataset, load_table, parse_csv_table, parse_json_table};
pub use reconcile::{ReconcileReport, TableReconcileReport, reconcile};
pub use table::{
    DMD_ID, DMDSEC, Dataset, FILE, FILE_ID, PACKAGE_TABLES, PARENT_ID, Row, STRUCT_ID, STRUCTMAP,
    Table, Value, key_of,
};
pub use validation::{primary_key_column, required_columns, validate_dataset, validate_table};
