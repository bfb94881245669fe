//! Embedding backfill for verses that lack an embedding.
//!
//! Walks the corpus by ascending id starting after a cursor, normalizes each
//! verse, embeds in sub-batches and writes rows one at a time. The cursor
//! advances per written row, so a failed run can be resumed and only the
//! remaining unembedded rows are picked up again.

use std::sync::Arc;

use crate::{
    app::AppError,
    config::BackfillConfig,
    embeddings::{check_embeddings, Embedder, EmbeddingError},
    hebrew,
    store::VerseStore,
};

/// Inputs per embedding request
pub const EMBED_CHUNK_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Rows embedded during this run
    pub embedded: usize,
    /// Id of the last row written, or the starting cursor
    pub last_id: i64,
    pub embedding_calls: usize,
}

pub struct Backfill {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VerseStore>,
    config: BackfillConfig,
}

impl Backfill {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VerseStore>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Embed every verse after the starting cursor that has no embedding.
    ///
    /// Any provider error or malformed response aborts the run. Rows written
    /// before the failure stay written.
    pub async fn run(&self) -> Result<BackfillReport, AppError> {
        let mut report = BackfillReport {
            last_id: self.config.start_after_id,
            ..Default::default()
        };

        log::info!(
            "starting backfill after id {} with batch size {} ({}, {} dims)",
            report.last_id,
            self.config.batch_size,
            self.embedder.model(),
            self.embedder.dimensions()
        );

        loop {
            let rows = self
                .store
                .fetch_unembedded(report.last_id, self.config.batch_size)
                .await?;

            if rows.is_empty() {
                break;
            }

            let texts: Vec<String> = rows
                .iter()
                .map(|row| hebrew::normalize(&row.hebrew_text))
                .collect();

            for (chunk_rows, chunk_texts) in rows
                .chunks(EMBED_CHUNK_SIZE)
                .zip(texts.chunks(EMBED_CHUNK_SIZE))
            {
                report.embedding_calls += 1;
                let embeddings = self
                    .embedder
                    .embed(chunk_texts)
                    .await
                    .map_err(|err| fatal_embedding_error(err, chunk_rows[0].id))?;

                // validate the whole chunk before writing any of it
                check_embeddings(&embeddings, chunk_rows.len(), self.embedder.dimensions())
                    .map_err(|err| fatal_embedding_error(err, chunk_rows[0].id))?;

                for ((row, plain), embedding) in chunk_rows.iter().zip(chunk_texts).zip(&embeddings) {
                    self.store.store_embedding(row.id, plain, embedding).await?;
                    report.embedded += 1;
                    report.last_id = row.id;
                }
            }

            log::info!(
                "embedded {} rows so far, last id {}",
                report.embedded,
                report.last_id
            );
        }

        log::info!(
            "backfill complete, embedded {} rows in this run",
            report.embedded
        );

        Ok(report)
    }
}

/// Malformed provider output is a data integrity failure, anything else is
/// reported as is.
fn fatal_embedding_error(err: EmbeddingError, first_id: i64) -> AppError {
    match err {
        EmbeddingError::MissingEmbedding(_)
        | EmbeddingError::UnexpectedCount { .. }
        | EmbeddingError::DuplicateIndex(_)
        | EmbeddingError::DimensionMismatch { .. } => {
            AppError::data_integrity(format!(
                "embedding batch starting at id {first_id}: {err}"
            ))
        }
        other => other.into(),
    }
}
