//! Verse persistence.
//!
//! - `postgres`: Postgres + pgvector backend used in production
//! - `memory`: in-process stand-in for tests

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::verse::{CorpusStats, NearestQuery, PendingVerse, UpsertOutcome, VerseMatch, VerseRecord};

pub use postgres::PgVerseStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(
        "embedding column holds vector({got}) but {expected} dimensions are configured; run `set-dimensions`"
    )]
    DimensionMismatch { expected: usize, got: usize },
}

#[async_trait]
pub trait VerseStore: Send + Sync {
    /// Up to `limit` verses with `id > after_id` and no embedding, ascending by id.
    async fn fetch_unembedded(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<PendingVerse>, StoreError>;

    /// Persist normalized text and embedding for one verse, bumping its
    /// update timestamp.
    async fn store_embedding(
        &self,
        id: i64,
        plain_text: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError>;

    /// Insert or update by `(book, chapter, verse)`. Changing the text of an
    /// existing verse clears its plain text and embedding so the next
    /// backfill recomputes them.
    async fn upsert_verse(&self, record: &VerseRecord) -> Result<UpsertOutcome, StoreError>;

    /// Embedded verses ordered by ascending cosine distance to the query.
    /// Every hit carries its similarity.
    async fn nearest(&self, query: &NearestQuery) -> Result<Vec<VerseMatch>, StoreError>;

    async fn stats(&self) -> Result<CorpusStats, StoreError>;
}
