use thiserror::Error;

/// Core error type shared across metsynth crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An input table is missing, unreadable or not a table of records.
    #[error("load error: {0}")]
    Load(String),
    /// A table is empty, lacks a required column or repeats a key.
    #[error("structural validation error: {0}")]
    StructuralValidation(String),
    /// The relationship graph could not be built or is inconsistent.
    #[error("schema modeling error: {0}")]
    SchemaModeling(String),
}

/// Convenience alias for results returned by metsynth crates.
pub type Result<T> = std::result::Result<T, Error>;
