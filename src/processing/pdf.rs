//! PDF validation and per-page text extraction.
//!
//! Extraction is delegated to `pdf-extract`, which reads from a path, so uploads are staged
//! in a temporary file that is removed when extraction finishes. The extractor can panic on
//! malformed input; panics are caught and reported as extraction failures.

use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;

use super::types::DocumentPage;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while validating or reading an uploaded PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Upload is not a PDF document.
    #[error("{0}")]
    NotAPdf(String),
    /// Staging the upload on disk failed.
    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
    /// The PDF could not be parsed.
    #[error("Failed to extract PDF text: {0}")]
    Extraction(String),
}

/// Source of raw per-page text for a PDF byte stream.
pub trait PageExtractor: Send + Sync {
    /// Return the text of every page, in page order, including blank pages.
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfError>;
}

/// [`PageExtractor`] backed by the `pdf-extract` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractLoader;

impl PageExtractor for PdfExtractLoader {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PdfError> {
        let mut staged = tempfile::Builder::new()
            .prefix("handbook-")
            .suffix(".pdf")
            .tempfile()?;
        staged.write_all(bytes)?;
        staged.flush()?;

        let path = staged.path();
        match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path))) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(error)) => Err(PdfError::Extraction(error.to_string())),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|value| value.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "extractor panicked".to_string());
                Err(PdfError::Extraction(message))
            }
        }
    }
}

/// Reject uploads that are not PDFs, by file name and by content signature.
pub fn validate_pdf(filename: Option<&str>, bytes: &[u8]) -> Result<(), PdfError> {
    let named_pdf = filename
        .map(|name| name.trim().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    if !named_pdf {
        return Err(PdfError::NotAPdf("Only PDF files are accepted.".to_string()));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(PdfError::NotAPdf(
            "Uploaded file is not a valid PDF document.".to_string(),
        ));
    }
    Ok(())
}

/// Extract pages off the async runtime and drop the blank ones.
pub async fn load_pages(
    extractor: Arc<dyn PageExtractor>,
    bytes: Vec<u8>,
) -> Result<Vec<DocumentPage>, PdfError> {
    let raw = tokio::task::spawn_blocking(move || extractor.extract_pages(&bytes))
        .await
        .map_err(|error| PdfError::Extraction(error.to_string()))??;
    let total = raw.len();
    let pages = non_blank_pages(raw);
    tracing::debug!(total, kept = pages.len(), "Extracted PDF pages");
    Ok(pages)
}

/// Number pages from zero and keep only those with visible text.
pub(crate) fn non_blank_pages(raw: Vec<String>) -> Vec<DocumentPage> {
    raw.into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| DocumentPage::new(text, idx as u32))
        .collect()
}
