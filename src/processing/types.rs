//! Core data types and error definitions for the processing pipeline.

use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible size budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Text extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    /// Raw page text as produced by the extractor.
    pub text: String,
    /// Zero-based page number within the source document.
    pub page: u32,
}

impl DocumentPage {
    /// Build a page from its text and zero-based number.
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
        }
    }
}

/// Bounded fragment of document text, the unit of embedding and indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Chunk body; never empty after trimming.
    pub text: String,
    /// Zero-based page the chunk was split from.
    pub source_page: u32,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Identifier of the session created for the document.
    pub session_id: String,
    /// Number of chunks embedded and upserted.
    pub chunks_indexed: usize,
}
