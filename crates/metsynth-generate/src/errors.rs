use thiserror::Error;

/// Errors emitted by synthesizers and snapshot writers.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model has not been fitted; call fit() before sample()")]
    NotFitted,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("core error: {0}")]
    Core(#[from] metsynth_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
