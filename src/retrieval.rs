//! Query-time retrieval: embed the question, then run an MMR search over the session's index.

use crate::config::RetrievalSettings;
use crate::credentials::ApiKey;
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, RemoteService};
use crate::processing::Chunk;
use crate::vector_store::VectorStore;
use std::sync::Arc;

/// Retriever bound to one index with fixed `(k, fetch_k, λ)` search parameters.
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingClient>,
    settings: RetrievalSettings,
}

impl Retriever {
    /// Combine an index adapter, an embedding client, and the search parameters.
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn EmbeddingClient>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            settings,
        }
    }

    /// Search parameters applied to every query.
    pub fn settings(&self) -> RetrievalSettings {
        self.settings
    }

    /// Return at most `k` chunks relevant to `query`, in MMR rank order.
    ///
    /// `credential` authorizes the embedding call; the index handle carries its own key.
    pub async fn retrieve(&self, query: &str, credential: &ApiKey) -> Result<Vec<Chunk>, RagError> {
        let vector = self
            .embedder
            .generate_embeddings(vec![query.to_string()], credential)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::RemoteService {
                service: RemoteService::Embedding,
                detail: "no embedding returned for query".into(),
            })?;

        let RetrievalSettings {
            k,
            fetch_k,
            lambda_mult,
        } = self.settings;
        let hits = self.store.search(&vector, k, fetch_k, lambda_mult).await?;
        tracing::debug!(k, fetch_k, lambda_mult, retrieved = hits.len(), "Retrieved context");
        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::error::ErrorKind;
    use crate::vector_store::{IndexError, IndexMatch, IndexRecord, VectorIndex};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedEmbedder(Result<Vec<f32>, &'static str>);

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
            _credential: &ApiKey,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            match &self.0 {
                Ok(vector) => Ok(texts.iter().map(|_| vector.clone()).collect()),
                Err(reason) => Err(EmbeddingClientError::Unauthorized(reason.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct QueryLog {
        top_k: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for QueryLog {
        async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError> {
            Ok(records.len())
        }

        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
        ) -> Result<Vec<IndexMatch>, IndexError> {
            self.top_k.lock().unwrap().push(top_k);
            Ok((0..top_k)
                .map(|idx| IndexMatch {
                    id: format!("m{idx}"),
                    score: 1.0 - idx as f32 * 0.01,
                    values: Some(vec![1.0, idx as f32]),
                    metadata: json!({ "text": format!("chunk {idx}"), "page": idx })
                        .as_object()
                        .cloned()
                        .unwrap(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn retrieves_k_chunks_using_configured_fetch_k() {
        let index = Arc::new(QueryLog::default());
        let retriever = Retriever::new(
            VectorStore::new(index.clone()),
            Arc::new(FixedEmbedder(Ok(vec![1.0, 0.0]))),
            RetrievalSettings::default(),
        );

        let chunks = retriever
            .retrieve("How many vacation days?", &ApiKey::new("sk-test"))
            .await
            .expect("retrieve");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "chunk 0");
        assert_eq!(*index.top_k.lock().unwrap(), vec![15]);
    }

    #[tokio::test]
    async fn embedding_rejection_is_a_credential_error() {
        let retriever = Retriever::new(
            VectorStore::new(Arc::new(QueryLog::default())),
            Arc::new(FixedEmbedder(Err("bad key"))),
            RetrievalSettings::default(),
        );

        let error = retriever
            .retrieve("question", &ApiKey::new("sk-wrong"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Credential);
    }
}
