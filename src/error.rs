use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeconvError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Missing required parameter key: {0}")]
    MissingParameter(String),

    #[error("Invalid range: low ({low}) cannot be greater than high ({high})")]
    Range { low: i64, high: i64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DeconvError>;
