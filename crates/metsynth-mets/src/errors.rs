use thiserror::Error;

/// Failures while writing or parsing a package document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Fatal reassembly failures. No partial document is produced.
#[derive(Debug, Error)]
pub enum ReassemblyError {
    #[error("required table '{0}' missing from generator output")]
    MissingTable(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// A schema definition could not be loaded. Distinct from document non-conformance.
#[derive(Debug, Error)]
pub enum ValidationReportError {
    #[error("no validation schemas configured")]
    NoSchemas,
    #[error("failed to load schema '{name}' from {path}: {message}")]
    SchemaLoad {
        name: String,
        path: String,
        message: String,
    },
}
