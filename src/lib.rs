#![deny(missing_docs)]

//! Core library for the handbook RAG server: upload a PDF, then ask questions answered only
//! from its content.

/// Answer generation over retrieved context.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Chat completion client abstraction and adapters.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Caller-supplied API keys.
pub mod credentials;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Error taxonomy shared by the pipelines.
pub mod error;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and question metrics.
pub mod metrics;
/// Pinecone vector index integration.
pub mod pinecone;
/// Document processing pipeline: PDF loading and chunking.
pub mod processing;
/// Query-time retrieval over a session's index.
pub mod retrieval;
/// Service orchestrating ingestion and answering.
pub mod service;
/// Session registry.
pub mod session;
/// Vector index abstraction with MMR search.
pub mod vector_store;
