//! In-memory verse store for tests.
//!
//! Ranks by exact cosine similarity, so results match what pgvector
//! returns for a sequential scan.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{StoreError, VerseStore};
use crate::verse::{CorpusStats, NearestQuery, PendingVerse, UpsertOutcome, VerseMatch, VerseRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVerse {
    pub id: i64,
    pub book: String,
    pub book_order: i32,
    pub chapter: i32,
    pub verse: i32,
    pub hebrew_text: String,
    pub hebrew_text_plain: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredVerse>>,
    writes: Mutex<Vec<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows in id order.
    pub fn rows(&self) -> Vec<StoredVerse> {
        self.rows.lock().unwrap().clone()
    }

    /// Ids passed to `store_embedding`, in call order.
    pub fn embedding_writes(&self) -> Vec<i64> {
        self.writes.lock().unwrap().clone()
    }

    pub fn find(&self, book: &str, chapter: i32, verse: i32) -> Option<StoredVerse> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.book == book && row.chapter == chapter && row.verse == verse)
            .cloned()
    }

    /// Seed a row with an embedding already in place.
    pub fn insert_embedded(&self, record: VerseRecord, embedding: Vec<f32>) -> i64 {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.last().map(|row| row.id + 1).unwrap_or(1);
        rows.push(StoredVerse {
            id,
            book: record.book,
            book_order: record.book_order,
            chapter: record.chapter,
            verse: record.verse,
            hebrew_text_plain: Some(crate::hebrew::normalize(&record.hebrew_text)),
            hebrew_text: record.hebrew_text,
            embedding: Some(embedding),
            updated_at: Utc::now(),
        });
        id
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[async_trait]
impl VerseStore for MemoryStore {
    async fn fetch_unembedded(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<PendingVerse>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.id > after_id && row.embedding.is_none())
            .take(limit.max(0) as usize)
            .map(|row| PendingVerse {
                id: row.id,
                hebrew_text: row.hebrew_text.clone(),
            })
            .collect())
    }

    async fn store_embedding(
        &self,
        id: i64,
        plain_text: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.hebrew_text_plain = Some(plain_text.to_string());
            row.embedding = Some(embedding.to_vec());
            row.updated_at = Utc::now();
        }
        self.writes.lock().unwrap().push(id);
        Ok(())
    }

    async fn upsert_verse(&self, record: &VerseRecord) -> Result<UpsertOutcome, StoreError> {
        let mut rows = self.rows.lock().unwrap();

        if let Some(row) = rows.iter_mut().find(|row| {
            row.book == record.book && row.chapter == record.chapter && row.verse == record.verse
        }) {
            if row.hebrew_text != record.hebrew_text {
                row.hebrew_text = record.hebrew_text.clone();
                row.hebrew_text_plain = None;
                row.embedding = None;
            }
            row.book_order = record.book_order;
            row.updated_at = Utc::now();
            return Ok(UpsertOutcome::Updated);
        }

        let id = rows.last().map(|row| row.id + 1).unwrap_or(1);
        rows.push(StoredVerse {
            id,
            book: record.book.clone(),
            book_order: record.book_order,
            chapter: record.chapter,
            verse: record.verse,
            hebrew_text: record.hebrew_text.clone(),
            hebrew_text_plain: None,
            embedding: None,
            updated_at: Utc::now(),
        });
        Ok(UpsertOutcome::Inserted)
    }

    async fn nearest(&self, query: &NearestQuery) -> Result<Vec<VerseMatch>, StoreError> {
        let rows = self.rows.lock().unwrap();

        let mut hits: Vec<VerseMatch> = rows
            .iter()
            .filter(|row| match &query.book {
                Some(book) => &row.book == book,
                None => true,
            })
            .filter_map(|row| {
                let embedding = row.embedding.as_ref()?;
                Some(VerseMatch {
                    book: row.book.clone(),
                    chapter: row.chapter,
                    verse: row.verse,
                    text: row.hebrew_text.clone(),
                    similarity: Some(cosine_similarity(embedding, &query.embedding)),
                })
            })
            .filter(|hit| match query.min_similarity {
                Some(min) => hit.similarity.unwrap_or_default() >= f64::from(min),
                None => true,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .unwrap_or_default()
                .total_cmp(&a.similarity.unwrap_or_default())
        });
        hits.truncate(query.limit.max(0) as usize);

        Ok(hits)
    }

    async fn stats(&self) -> Result<CorpusStats, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(CorpusStats {
            total: rows.len() as i64,
            embedded: rows.iter().filter(|row| row.embedding.is_some()).count() as i64,
            last_updated: rows.iter().map(|row| row.updated_at).max(),
        })
    }
}
