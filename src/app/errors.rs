use crate::{embeddings::EmbeddingError, store::StoreError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Malformed caller input.
    #[error("{0}")]
    Validation(String),

    /// Missing credential or setup.
    #[error("{0}")]
    Configuration(String),

    /// Embedding call failed or returned malformed data.
    #[error("{0}")]
    Provider(String),

    /// Malformed import record or dimensionality mismatch.
    #[error("{0}")]
    DataIntegrity(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),
}

impl From<EmbeddingError> for AppError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::NotConfigured => Self::Configuration(err.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }
}
