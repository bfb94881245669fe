//! Postgres storage backed by the pgvector extension.
//!
//! Table `"Pasuk"` holds one row per verse. Nearest-neighbor ranking is done
//! by pgvector's cosine distance operator `<=>`, accelerated by an
//! `ivfflat` index. Vectors travel as text literals cast with `::vector`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{StoreError, VerseStore};
use crate::embeddings::vector_literal;
use crate::verse::{CorpusStats, NearestQuery, PendingVerse, UpsertOutcome, VerseMatch, VerseRecord};

/// Number of ivfflat lists for the embedding index
const IVFFLAT_LISTS: u32 = 100;

/// pgvector refuses ivfflat indexes on wider vectors
const IVFFLAT_MAX_DIMENSIONS: usize = 2000;

/// Whether pgvector can build the ivfflat index for `vector(dimensions)`.
pub fn ann_index_supported(dimensions: usize) -> bool {
    dimensions <= IVFFLAT_MAX_DIMENSIONS
}

fn skip_ann_index(dimensions: usize) {
    log::warn!(
        "vector({dimensions}) exceeds the ivfflat limit of {IVFFLAT_MAX_DIMENSIONS} dimensions, \
         skipping the embedding index; nearest-neighbor lookup will scan sequentially"
    );
}

#[derive(Clone)]
pub struct PgVerseStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct NearestRow {
    book: String,
    chapter: i32,
    verse: i32,
    hebrew_text: String,
    similarity: f64,
}

impl From<NearestRow> for VerseMatch {
    fn from(row: NearestRow) -> Self {
        Self {
            book: row.book,
            chapter: row.chapter,
            verse: row.verse,
            text: row.hebrew_text,
            similarity: Some(row.similarity),
        }
    }
}

impl PgVerseStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the schema, then check that the embedding column matches the
    /// configured dimensionality.
    pub async fn ensure_schema(&self, dimensions: usize) -> Result<(), StoreError> {
        self.create_schema(dimensions).await?;

        let got = self.column_dimensions().await?;
        if got != dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                got,
            });
        }

        Ok(())
    }

    /// Create the extension, table and indexes when missing.
    pub async fn create_schema(&self, dimensions: usize) -> Result<(), StoreError> {
        log::info!("ensuring schema for vector({dimensions})");

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "Pasuk" (
                id BIGSERIAL PRIMARY KEY,
                book TEXT NOT NULL,
                book_order INTEGER NOT NULL,
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                hebrew_text TEXT NOT NULL,
                hebrew_text_plain TEXT,
                embedding vector({dimensions}),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT pasuk_book_chapter_verse_key UNIQUE (book, chapter, verse)
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS pasuk_book_order_idx ON "Pasuk" (book_order, chapter, verse)"#,
        )
        .execute(&self.pool)
        .await?;

        if !ann_index_supported(dimensions) {
            skip_ann_index(dimensions);
            return Ok(());
        }

        sqlx::query(&format!(
            r#"CREATE INDEX IF NOT EXISTS pasuk_embedding_idx ON "Pasuk" USING ivfflat (embedding vector_cosine_ops) WITH (lists = {IVFFLAT_LISTS})"#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Dimensionality declared on the embedding column.
    async fn column_dimensions(&self) -> Result<usize, StoreError> {
        let typmod: i32 = sqlx::query_scalar(
            r#"
            SELECT atttypmod
            FROM pg_attribute
            WHERE attrelid = '"Pasuk"'::regclass
              AND attname = 'embedding'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(typmod.max(0) as usize)
    }

    /// Retype the embedding column to `vector(dimensions)`.
    ///
    /// Clears every stored embedding and rebuilds the ANN index when
    /// pgvector supports one at this width.
    pub async fn set_dimensions(&self, dimensions: usize) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DROP INDEX IF EXISTS pasuk_embedding_idx")
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            r#"ALTER TABLE "Pasuk" ALTER COLUMN embedding TYPE vector({dimensions}) USING NULL"#
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(r#"UPDATE "Pasuk" SET hebrew_text_plain = NULL, updated_at = NOW()"#)
            .execute(&mut *tx)
            .await?;

        if ann_index_supported(dimensions) {
            sqlx::query(&format!(
                r#"CREATE INDEX pasuk_embedding_idx ON "Pasuk" USING ivfflat (embedding vector_cosine_ops) WITH (lists = {IVFFLAT_LISTS})"#
            ))
            .execute(&mut *tx)
            .await?;
        } else {
            skip_ann_index(dimensions);
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl VerseStore for PgVerseStore {
    async fn fetch_unembedded(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<PendingVerse>, StoreError> {
        let rows = sqlx::query_as::<_, PendingVerse>(
            r#"
            SELECT id, hebrew_text
            FROM "Pasuk"
            WHERE id > $1
              AND embedding IS NULL
            ORDER BY id ASC
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn store_embedding(
        &self,
        id: i64,
        plain_text: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE "Pasuk"
            SET hebrew_text_plain = $1,
                embedding = $2::vector,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(plain_text)
        .bind(vector_literal(embedding))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_verse(&self, record: &VerseRecord) -> Result<UpsertOutcome, StoreError> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO "Pasuk" (book, book_order, chapter, verse, hebrew_text)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (book, chapter, verse) DO UPDATE
            SET book_order = EXCLUDED.book_order,
                hebrew_text = EXCLUDED.hebrew_text,
                hebrew_text_plain = CASE
                    WHEN "Pasuk".hebrew_text = EXCLUDED.hebrew_text THEN "Pasuk".hebrew_text_plain
                END,
                embedding = CASE
                    WHEN "Pasuk".hebrew_text = EXCLUDED.hebrew_text THEN "Pasuk".embedding
                END,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.book)
        .bind(record.book_order)
        .bind(record.chapter)
        .bind(record.verse)
        .bind(&record.hebrew_text)
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn nearest(&self, query: &NearestQuery) -> Result<Vec<VerseMatch>, StoreError> {
        let rows = sqlx::query_as::<_, NearestRow>(
            r#"
            SELECT
                book,
                chapter,
                verse,
                hebrew_text,
                (1 - (embedding <=> $1::vector))::float8 AS similarity
            FROM "Pasuk"
            WHERE embedding IS NOT NULL
              AND ($2::text IS NULL OR book = $2)
              AND ($3::float8 IS NULL OR (1 - (embedding <=> $1::vector)) >= $3)
            ORDER BY embedding <=> $1::vector
            LIMIT $4
            "#,
        )
        .bind(vector_literal(&query.embedding))
        .bind(query.book.as_deref())
        .bind(query.min_similarity.map(f64::from))
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn stats(&self) -> Result<CorpusStats, StoreError> {
        let stats = sqlx::query_as::<_, CorpusStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(embedding) AS embedded,
                MAX(updated_at) AS last_updated
            FROM "Pasuk"
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
