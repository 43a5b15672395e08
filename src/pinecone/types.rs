//! Wire types and errors for the Pinecone REST API.

use crate::vector_store::IndexError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Pinecone.
#[derive(Debug, Error)]
pub enum PineconeError {
    /// Host or controller URL failed to parse or normalize.
    #[error("Invalid Pinecone URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    /// Pinecone rejected the API key.
    #[error("Pinecone rejected the API key ({status}): {body}")]
    Unauthorized {
        /// HTTP status returned from Pinecone.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Pinecone responded with an unexpected status code.
    #[error("Unexpected Pinecone response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Pinecone.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

impl From<reqwest::Error> for PineconeError {
    /// The URL is dropped because index hosts and paths carry the index name.
    fn from(error: reqwest::Error) -> Self {
        PineconeError::Http(error.without_url())
    }
}

impl From<PineconeError> for IndexError {
    fn from(error: PineconeError) -> Self {
        let message = error.to_string();
        match &error {
            PineconeError::Unauthorized { .. } => IndexError::Unauthorized(message),
            PineconeError::UnexpectedStatus { status, .. } if *status == StatusCode::NOT_FOUND => {
                IndexError::IndexNotFound(message)
            }
            PineconeError::UnexpectedStatus { .. } => IndexError::RequestFailed(message),
            PineconeError::Http(inner) if inner.is_decode() => IndexError::InvalidData(message),
            PineconeError::Http(_) => IndexError::Unavailable(message),
            PineconeError::InvalidUrl(_) => IndexError::InvalidData(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescribeIndexResponse {
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    pub upserted_count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}
