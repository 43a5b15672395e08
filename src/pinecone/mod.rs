//! Pinecone vector index integration.

pub mod client;
pub mod types;

pub use client::{PineconeConnector, PineconeIndex};
pub use types::PineconeError;
