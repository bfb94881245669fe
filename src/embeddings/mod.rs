//! Embedding provider abstraction.
//!
//! The backfill pipeline and the query service only see the [`Embedder`]
//! trait, so both run against a deterministic stand-in in tests.
//!
//! - `openai`: OpenAI embeddings API client

pub mod openai;

use async_trait::async_trait;

pub use openai::OpenAiEmbedder;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("OPENAI_API_KEY is required.")]
    NotConfigured,

    #[error("embedding request failed: {0}")]
    Api(String),

    #[error("embedding response is missing an embedding for input {0}")]
    MissingEmbedding(usize),

    #[error("embedding response has {got} embeddings for {expected} inputs")]
    UnexpectedCount { expected: usize, got: usize },

    #[error("embedding response repeats index {0}")]
    DuplicateIndex(usize),

    #[error("embedding dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Something that turns texts into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every input, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Expected length of every returned vector.
    fn dimensions(&self) -> usize;

    fn model(&self) -> &str;
}

/// Check that a provider answered with exactly one vector of the expected
/// length per input, no more and no fewer.
pub fn check_embeddings(
    embeddings: &[Vec<f32>],
    inputs: usize,
    dimensions: usize,
) -> Result<(), EmbeddingError> {
    if embeddings.len() < inputs {
        return Err(EmbeddingError::MissingEmbedding(embeddings.len()));
    }

    if embeddings.len() > inputs {
        return Err(EmbeddingError::UnexpectedCount {
            expected: inputs,
            got: embeddings.len(),
        });
    }

    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            got: bad.len(),
        });
    }

    Ok(())
}

/// Render a vector as a pgvector text literal: `[0.1,0.2,...]`.
pub fn vector_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}
