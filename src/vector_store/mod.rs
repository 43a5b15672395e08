//! Vector index abstraction and the chunk-level adapter built on top of it.
//!
//! [`VectorIndex`] is the raw remote contract (upsert records, query nearest neighbours).
//! [`VectorStore`] speaks in chunks: it attaches ids and metadata on the way in and applies
//! MMR re-ranking on the way out.

pub mod mmr;
pub(crate) mod payload;

use crate::credentials::ApiKey;
use crate::processing::Chunk;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub use mmr::{cosine_similarity, mmr_select};

/// Errors raised by vector index backends.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index rejected the supplied key.
    #[error("Vector index rejected the credential: {0}")]
    Unauthorized(String),
    /// The named index does not exist.
    #[error("Vector index not found: {0}")]
    IndexNotFound(String),
    /// The index could not be reached or timed out.
    #[error("Vector index unavailable: {0}")]
    Unavailable(String),
    /// The index answered with an error.
    #[error("Vector index request failed: {0}")]
    RequestFailed(String),
    /// The index response could not be interpreted, or the input was inconsistent.
    #[error("Malformed vector index exchange: {0}")]
    InvalidData(String),
}

/// Vector plus metadata, as written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Unique record identifier.
    pub id: String,
    /// Embedding vector.
    pub values: Vec<f32>,
    /// Arbitrary JSON metadata stored with the vector.
    pub metadata: Map<String, Value>,
}

/// Nearest-neighbour hit returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    /// Identifier of the matching record.
    pub id: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Stored vector, when the index returned it.
    pub values: Option<Vec<f32>>,
    /// Stored metadata.
    pub metadata: Map<String, Value>,
}

/// Remote nearest-neighbour store bound to one index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write records, returning how many the index accepted.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError>;

    /// Return up to `top_k` neighbours of `vector`, most similar first, with stored vectors.
    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<IndexMatch>, IndexError>;
}

/// Opens a [`VectorIndex`] handle from a credential and an index name.
#[async_trait]
pub trait IndexConnector: Send + Sync {
    /// Resolve the named index and return a handle bound to it.
    async fn connect(
        &self,
        credential: &ApiKey,
        index_name: &str,
    ) -> Result<Arc<dyn VectorIndex>, IndexError>;
}

/// Chunk returned by a search, with the index-reported relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Retrieved chunk.
    pub chunk: Chunk,
    /// Similarity score reported by the index.
    pub score: f32,
}

/// Chunk-level adapter over a [`VectorIndex`].
#[derive(Clone)]
pub struct VectorStore {
    index: Arc<dyn VectorIndex>,
}

impl VectorStore {
    /// Wrap an index handle.
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Store each chunk with its vector under a fresh id; returns the upserted count.
    ///
    /// Records are never deduplicated: storing the same chunks twice yields two entries.
    pub async fn upsert(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        source: Option<&str>,
    ) -> Result<usize, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::InvalidData(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let now = payload::current_timestamp_rfc3339();
        let records: Vec<IndexRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| IndexRecord {
                id: payload::generate_record_id(),
                values,
                metadata: payload::build_metadata(chunk, source, &now),
            })
            .collect();

        let upserted = self.index.upsert(records).await?;
        tracing::debug!(chunks = chunks.len(), upserted, "Chunks upserted");
        Ok(upserted)
    }

    /// Fetch `fetch_k` neighbours and MMR-select `k` of them.
    ///
    /// `fetch_k` is raised to `k` when smaller. Matches missing a vector or text are skipped.
    pub async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let fetch_k = fetch_k.max(k);

        let matches = self.index.query(query_vector.to_vec(), fetch_k).await?;
        let fetched = matches.len();

        let mut candidates = Vec::with_capacity(fetched);
        let mut vectors = Vec::with_capacity(fetched);
        for hit in matches {
            let Some(values) = hit.values else {
                continue;
            };
            let Some(chunk) = payload::chunk_from_metadata(&hit.metadata) else {
                tracing::warn!(id = %hit.id, "Skipping match without text metadata");
                continue;
            };
            candidates.push(ScoredChunk {
                chunk,
                score: hit.score,
            });
            vectors.push(values);
        }

        let order = mmr_select(query_vector, &vectors, k, lambda_mult);
        tracing::debug!(fetched, usable = candidates.len(), selected = order.len(), "MMR search");

        let mut slots: Vec<Option<ScoredChunk>> = candidates.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIndex {
        stored: Mutex<Vec<IndexRecord>>,
        requested_top_k: Mutex<Vec<usize>>,
        matches: Vec<IndexMatch>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn upsert(&self, records: Vec<IndexRecord>) -> Result<usize, IndexError> {
            let count = records.len();
            self.stored.lock().unwrap().extend(records);
            Ok(count)
        }

        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
        ) -> Result<Vec<IndexMatch>, IndexError> {
            self.requested_top_k.lock().unwrap().push(top_k);
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }
    }

    fn hit(id: &str, text: &str, values: Vec<f32>, score: f32) -> IndexMatch {
        IndexMatch {
            id: id.into(),
            score,
            values: Some(values),
            metadata: json!({ "text": text, "page": 0 })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    fn chunk(text: &str, page: u32) -> Chunk {
        Chunk {
            text: text.into(),
            source_page: page,
        }
    }

    #[tokio::test]
    async fn upsert_assigns_fresh_ids_and_metadata() {
        let index = Arc::new(RecordingIndex::default());
        let store = VectorStore::new(index.clone());
        let chunks = vec![chunk("Vacation policy", 0), chunk("Dress code", 3)];

        let count = store
            .upsert(&chunks, vec![vec![1.0, 0.0], vec![0.0, 1.0]], Some("handbook.pdf"))
            .await
            .expect("upsert");
        assert_eq!(count, 2);

        let again = store
            .upsert(&chunks[..1], vec![vec![1.0, 0.0]], None)
            .await
            .expect("upsert");
        assert_eq!(again, 1);

        let stored = index.stored.lock().unwrap();
        assert_eq!(stored.len(), 3);
        assert_ne!(stored[0].id, stored[2].id);
        assert_eq!(stored[1].metadata["page"], json!(3));
        assert_eq!(stored[1].metadata["source"], json!("handbook.pdf"));
    }

    #[tokio::test]
    async fn upsert_rejects_mismatched_vectors() {
        let store = VectorStore::new(Arc::new(RecordingIndex::default()));
        let error = store
            .upsert(&[chunk("Vacation policy", 0)], Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(error, IndexError::InvalidData(_)));
    }

    #[tokio::test]
    async fn search_raises_fetch_k_to_k() {
        let index = Arc::new(RecordingIndex::default());
        let store = VectorStore::new(index.clone());
        store.search(&[1.0, 0.0], 5, 2, 0.85).await.expect("search");
        assert_eq!(*index.requested_top_k.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn search_diversifies_and_skips_unusable_matches() {
        let mut without_vector = hit("x", "No vector", vec![], 0.99);
        without_vector.values = None;
        let index = Arc::new(RecordingIndex {
            matches: vec![
                without_vector,
                hit("a", "Vacation: 20 days", vec![1.0, 0.0], 0.98),
                hit("b", "Vacation: twenty days", vec![0.999, 0.01], 0.97),
                hit("c", "Sick leave", vec![0.6, 0.8], 0.60),
            ],
            ..Default::default()
        });
        let store = VectorStore::new(index);

        let results = store.search(&[1.0, 0.0], 2, 15, 0.0).await.expect("search");
        let texts: Vec<_> = results.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["Vacation: 20 days", "Sick leave"]);
        assert!((results[0].score - 0.98).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn search_returns_everything_when_fewer_than_k() {
        let index = Arc::new(RecordingIndex {
            matches: vec![hit("a", "Only chunk", vec![1.0, 0.0], 0.9)],
            ..Default::default()
        });
        let store = VectorStore::new(index);
        let results = store.search(&[1.0, 0.0], 3, 15, 0.85).await.expect("search");
        assert_eq!(results.len(), 1);
    }
}
