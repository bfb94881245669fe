//! OpenAI embeddings API client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{check_embeddings, Embedder, EmbeddingError};
use crate::config::EmbeddingConfig;

pub struct OpenAiEmbedder {
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Sorted indices must run `0, 1, 2, ...` without gaps or repeats.
fn check_indices(data: &[EmbeddingData]) -> Result<(), EmbeddingError> {
    for (position, item) in data.iter().enumerate() {
        if item.index > position {
            return Err(EmbeddingError::MissingEmbedding(position));
        }
        if item.index < position {
            return Err(EmbeddingError::DuplicateIndex(item.index));
        }
    }
    Ok(())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = self.api_key.as_ref().ok_or(EmbeddingError::NotConfigured)?;

        if texts.is_empty() {
            return Ok(vec![]);
        }

        log::debug!(
            "requesting {} embeddings with model {}",
            texts.len(),
            self.model
        );

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{status}: {error_text}")));
        }

        let mut result: EmbeddingsResponse = response.json().await?;
        result.data.sort_by_key(|item| item.index);
        check_indices(&result.data)?;

        let embeddings: Vec<Vec<f32>> = result
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect();

        check_embeddings(&embeddings, texts.len(), self.dimensions)?;

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer, api_key: Option<&str>, dimensions: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new(&EmbeddingConfig {
            api_key: api_key.map(str::to_string),
            base_url: format!("{}/v1/", server.uri()),
            model: "text-embedding-3-small".to_string(),
            dimensions,
        })
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let embedder = embedder(&server, None, 3);

        let result = embedder.embed(&["אור".to_string()]).await;
        assert!(matches!(result, Err(EmbeddingError::NotConfigured)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_is_returned_in_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-small",
                "input": ["אור", "חושכ"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]},
                ],
                "model": "text-embedding-3-small",
                "usage": {"prompt_tokens": 4, "total_tokens": 4},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);
        let vectors = embedder
            .embed(&["אור".to_string(), "חושכ".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0]}],
            })))
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);
        let result = embedder.embed(&["אור".to_string()]).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}],
            })))
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);
        let result = embedder
            .embed(&["אור".to_string(), "חושכ".to_string()])
            .await;

        assert!(matches!(result, Err(EmbeddingError::MissingEmbedding(1))));
    }

    #[tokio::test]
    async fn test_extra_embedding_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]},
                    {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                ],
            })))
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);
        let result = embedder.embed(&["אור".to_string()]).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::UnexpectedCount { expected: 1, got: 2 })
        ));
    }

    #[tokio::test]
    async fn test_bad_indices_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["אור", "חושכ"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]},
                    {"index": 0, "embedding": [0.0, 1.0, 0.0]},
                ],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["מים", "ארצ"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 0, "embedding": [1.0, 0.0, 0.0]},
                    {"index": 2, "embedding": [0.0, 1.0, 0.0]},
                ],
            })))
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);

        let repeated = embedder
            .embed(&["אור".to_string(), "חושכ".to_string()])
            .await;
        assert!(matches!(repeated, Err(EmbeddingError::DuplicateIndex(0))));

        let gap = embedder
            .embed(&["מים".to_string(), "ארצ".to_string()])
            .await;
        assert!(matches!(gap, Err(EmbeddingError::MissingEmbedding(1))));
    }

    #[tokio::test]
    async fn test_api_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("Rate limit reached for requests"),
            )
            .mount(&server)
            .await;

        let embedder = embedder(&server, Some("sk-test"), 3);
        let err = embedder.embed(&["אור".to_string()]).await.unwrap_err();

        match err {
            EmbeddingError::Api(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("Rate limit reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let server = MockServer::start().await;
        let embedder = embedder(&server, Some("sk-test"), 3);

        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
