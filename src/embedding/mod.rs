use crate::config::Config;
use crate::credentials::ApiKey;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider rejected the supplied key.
    #[error("Embedding provider rejected the credential: {0}")]
    Unauthorized(String),
    /// Provider could not be reached or timed out.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be interpreted.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        credential: &ApiKey,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddingClient {
    /// Construct a client for the given endpoint, model, and batch size.
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(
        &self,
        batch: &[String],
        credential: &ApiKey,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let payload = json!({
            "model": self.model,
            "input": batch,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::Unauthorized(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "{status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;
        order_embeddings(parsed, batch.len())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        credential: &ApiKey,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.model,
            texts = texts.len(),
            batch_size = self.batch_size,
            "Generating embeddings"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch, credential).await?);
        }
        Ok(embeddings)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Restore input order from the provider's `index` field and check the count.
fn order_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if response.data.len() != expected {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, received {}",
            response.data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in response.data {
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            EmbeddingClientError::InvalidResponse(format!(
                "embedding index {} out of range",
                datum.index
            ))
        })?;
        *slot = Some(datum.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.ok_or_else(|| {
                EmbeddingClientError::InvalidResponse(format!("missing embedding for input {idx}"))
            })
        })
        .collect()
}

/// Build the embedding client described by the configuration.
pub fn get_embedding_client(config: &Config, http: Client) -> Arc<dyn EmbeddingClient> {
    Arc::new(OpenAiEmbeddingClient::new(
        http,
        config.openai_base_url.clone(),
        config.embedding_model.clone(),
        config.embedding_batch_size,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(server: &MockServer, batch_size: usize) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::new(
            Client::new(),
            server.base_url(),
            "text-embedding-3-small",
            batch_size,
        )
    }

    #[tokio::test]
    async fn returns_vectors_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .body_contains("text-embedding-3-small");
                then.status(200).json_body(serde_json::json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = client(&server, 16)
            .generate_embeddings(vec!["first".into(), "second".into()], &ApiKey::new("sk-test"))
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn splits_requests_into_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "data": [ { "index": 0, "embedding": [0.5] } ]
                }));
            })
            .await;

        let vectors = client(&server, 1)
            .generate_embeddings(
                vec!["a".into(), "b".into(), "c".into()],
                &ApiKey::new("sk-test"),
            )
            .await
            .expect("embeddings");

        mock.assert_hits_async(3).await;
        assert_eq!(vectors.len(), 3);
    }

    #[tokio::test]
    async fn rejected_key_is_reported_as_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401)
                    .json_body(serde_json::json!({ "error": { "message": "Incorrect API key" } }));
            })
            .await;

        let error = client(&server, 16)
            .generate_embeddings(vec!["text".into()], &ApiKey::new("sk-wrong"))
            .await
            .unwrap_err();

        assert!(matches!(error, EmbeddingClientError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn count_mismatch_is_a_malformed_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({ "data": [] }));
            })
            .await;

        let error = client(&server, 16)
            .generate_embeddings(vec!["text".into()], &ApiKey::new("sk-test"))
            .await
            .unwrap_err();

        assert!(matches!(error, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn empty_input_skips_the_provider() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500);
            })
            .await;

        let vectors = client(&server, 16)
            .generate_embeddings(Vec::new(), &ApiKey::new("sk-test"))
            .await
            .expect("empty input");

        assert!(vectors.is_empty());
        mock.assert_hits_async(0).await;
    }
}
