use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verse as delivered by the import file, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseRecord {
    pub book: String,
    pub book_order: i32,
    pub chapter: i32,
    pub verse: i32,
    pub hebrew_text: String,
}

/// A stored verse that still lacks an embedding.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PendingVerse {
    pub id: i64,
    pub hebrew_text: String,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseMatch {
    pub book: String,
    pub chapter: i32,
    pub verse: i32,
    pub text: String,

    /// Cosine similarity, reported only when threshold filtering is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Nearest-neighbor lookup against stored embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub embedding: Vec<f32>,
    pub book: Option<String>,
    pub limit: i64,
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CorpusStats {
    pub total: i64,
    pub embedded: i64,
    pub last_updated: Option<DateTime<Utc>>,
}
