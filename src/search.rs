//! Semantic verse search.
//!
//! Embeds the live query and asks the store for the closest verses by
//! cosine distance. Two scoring disciplines share one code path, selected by
//! [`SearchOptions`]: plain top-K, or top-K above a similarity floor with
//! scores reported.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    app::AppError,
    config::SearchOptions,
    embeddings::{check_embeddings, Embedder},
    store::VerseStore,
    verse::{NearestQuery, VerseMatch},
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Message attached to an empty result set when the similarity floor is on
pub const NO_MATCHES_MESSAGE: &str = "No strong matches found.";

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub book: Option<String>,
    pub limit: i64,
}

impl SearchRequest {
    pub fn new(query: &str, book: Option<&str>, limit: Option<i64>) -> Result<Self, AppError> {
        if query.is_empty() {
            return Err(AppError::validation("Query is required"));
        }

        if let Some(book) = book {
            if book.trim().is_empty() {
                return Err(AppError::validation("book must be a non-empty string"));
            }
        }

        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        Ok(Self {
            query: query.to_string(),
            book: book.map(str::to_string),
            limit,
        })
    }

    /// Build a request from raw query-string pairs. Unknown keys are
    /// ignored, repeated known keys are rejected.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, AppError> {
        let query = single_value(pairs, "q")?.unwrap_or_default();
        let book = single_value(pairs, "book")?;
        let limit = match single_value(pairs, "limit")? {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                AppError::validation(format!("limit must be an integer, got '{raw}'"))
            })?),
            None => None,
        };

        Self::new(query, book, limit)
    }
}

fn single_value<'a>(pairs: &'a [(String, String)], key: &str) -> Result<Option<&'a str>, AppError> {
    let mut values = pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str());
    let first = values.next();
    if values.next().is_some() {
        return Err(AppError::validation(format!("{key} must be given at most once")));
    }
    Ok(first)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<VerseMatch>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VerseStore>,
    options: SearchOptions,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VerseStore>,
        options: SearchOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    /// Rank stored verses against the query.
    ///
    /// The query text is embedded as given, without Hebrew normalization.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, AppError> {
        let embeddings = self.embedder.embed(&[request.query.clone()]).await?;
        check_embeddings(&embeddings, 1, self.embedder.dimensions())
            .map_err(|err| AppError::Provider(err.to_string()))?;

        let embedding = embeddings.into_iter().next().unwrap_or_default();

        let threshold = self
            .options
            .threshold_enabled
            .then_some(self.options.min_similarity);

        let query = NearestQuery {
            embedding,
            book: request.book.clone(),
            limit: request.limit,
            min_similarity: threshold,
        };

        let mut results = self.store.nearest(&query).await?;

        log::debug!(
            "query {:?} (book {:?}, limit {}) matched {} verses",
            request.query,
            request.book,
            request.limit,
            results.len()
        );

        if threshold.is_none() {
            for hit in results.iter_mut() {
                hit.similarity = None;
            }
        }

        let message = (threshold.is_some() && results.is_empty())
            .then(|| NO_MATCHES_MESSAGE.to_string());

        Ok(SearchResponse { results, message })
    }
}
