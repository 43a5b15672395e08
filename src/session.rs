//! In-memory registry mapping session ids to their retriever and captured credential.

use crate::credentials::ApiKey;
use crate::retrieval::Retriever;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State captured when a document is uploaded.
#[derive(Clone)]
pub struct Session {
    /// Retriever bound to the index the document was written to.
    pub retriever: Arc<Retriever>,
    /// LLM key supplied at upload time.
    pub credential: ApiKey,
}

/// Process-wide session store. Entries live until deleted or the process exits.
///
/// A session removed while a request still holds a clone of it stays usable by that request.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session stored under `id`.
    pub async fn create(&self, id: impl Into<String>, retriever: Arc<Retriever>, credential: ApiKey) {
        let id = id.into();
        let replaced = self
            .sessions
            .write()
            .await
            .insert(
                id.clone(),
                Session {
                    retriever,
                    credential,
                },
            )
            .is_some();
        tracing::debug!(session_id = %id, replaced, "Session stored");
    }

    /// Look up a session by id.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session; returns whether it existed.
    pub async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
