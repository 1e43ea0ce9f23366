use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Invalid field declaration: {0}")]
    InvalidField(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Collection not registered: {0}")]
    UnknownCollection(String),

    #[error("Embedding transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Embedding response could not be decoded: {0}")]
    Decode(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VectorResult<T> = Result<T, VectorError>;

impl From<serde_json::Error> for VectorError {
    fn from(err: serde_json::Error) -> Self {
        VectorError::Decode(format!("JSON error: {}", err))
    }
}

impl From<tokio::task::JoinError> for VectorError {
    fn from(err: tokio::task::JoinError) -> Self {
        VectorError::Internal(format!("store worker failed: {}", err))
    }
}
