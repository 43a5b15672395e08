//! Document processing pipeline: PDF loading and chunking.

pub mod chunking;
pub mod pdf;
pub mod types;

pub use chunking::{RecursiveSplitter, split_pages};
pub use pdf::{PageExtractor, PdfError, PdfExtractLoader, load_pages, validate_pdf};
pub use types::{Chunk, ChunkingError, DocumentPage, IngestOutcome};
