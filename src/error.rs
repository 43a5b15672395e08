//! Error taxonomy shared by the ingestion and answering pipelines.
//!
//! Component errors (embedding, chat, vector index, chunking, PDF loading) convert into
//! [`RagError`] through `From`, which classifies them. Mapping a classification onto an HTTP
//! status happens only in [`crate::api`].

use crate::chat::ChatClientError;
use crate::embedding::EmbeddingClientError;
use crate::processing::{ChunkingError, PdfError};
use crate::vector_store::IndexError;
use thiserror::Error;

/// Remote collaborator that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteService {
    /// Embedding model provider.
    Embedding,
    /// Remote vector index.
    VectorIndex,
    /// Chat completion provider.
    Chat,
}

impl std::fmt::Display for RemoteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Embedding => "embedding provider",
            Self::VectorIndex => "vector index",
            Self::Chat => "chat provider",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the RAG service.
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller supplied malformed input (e.g. a non-PDF upload).
    #[error("Invalid request: {0}")]
    Validation(String),
    /// Session identifier is unknown.
    #[error("Session not found: {0}")]
    NotFound(String),
    /// A remote provider rejected the supplied key.
    #[error("Credential rejected by {service}: {detail}")]
    Credential {
        /// Provider that rejected the key.
        service: RemoteService,
        /// Provider response describing the rejection.
        detail: String,
    },
    /// A remote call failed, timed out, or returned something unusable.
    #[error("{service} request failed: {detail}")]
    RemoteService {
        /// Provider whose call failed.
        service: RemoteService,
        /// Underlying failure description.
        detail: String,
    },
    /// Unexpected failure in a local stage.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`RagError::Validation`].
    Validation,
    /// See [`RagError::NotFound`].
    NotFound,
    /// See [`RagError::Credential`].
    Credential,
    /// See [`RagError::RemoteService`].
    RemoteService,
    /// See [`RagError::Internal`].
    Internal,
}

impl RagError {
    /// Classification used by transport layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Credential { .. } => ErrorKind::Credential,
            Self::RemoteService { .. } => ErrorKind::RemoteService,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<EmbeddingClientError> for RagError {
    fn from(error: EmbeddingClientError) -> Self {
        let service = RemoteService::Embedding;
        match error {
            EmbeddingClientError::Unauthorized(detail) => Self::Credential { service, detail },
            other => Self::RemoteService {
                service,
                detail: other.to_string(),
            },
        }
    }
}

impl From<ChatClientError> for RagError {
    fn from(error: ChatClientError) -> Self {
        let service = RemoteService::Chat;
        match error {
            ChatClientError::Unauthorized(detail) => Self::Credential { service, detail },
            other => Self::RemoteService {
                service,
                detail: other.to_string(),
            },
        }
    }
}

impl From<IndexError> for RagError {
    fn from(error: IndexError) -> Self {
        let service = RemoteService::VectorIndex;
        match error {
            IndexError::Unauthorized(detail) => Self::Credential { service, detail },
            other => Self::RemoteService {
                service,
                detail: other.to_string(),
            },
        }
    }
}

impl From<ChunkingError> for RagError {
    fn from(error: ChunkingError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<PdfError> for RagError {
    fn from(error: PdfError) -> Self {
        match error {
            PdfError::NotAPdf(reason) => Self::Validation(reason),
            other => Self::Internal(other.to_string()),
        }
    }
}
