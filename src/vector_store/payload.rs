//! Metadata stored alongside each indexed chunk.

use crate::processing::Chunk;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const TEXT_KEY: &str = "text";
pub(crate) const PAGE_KEY: &str = "page";
pub(crate) const SOURCE_KEY: &str = "source";
pub(crate) const INDEXED_AT_KEY: &str = "indexed_at";

/// Build the metadata object stored with a chunk vector.
pub(crate) fn build_metadata(
    chunk: &Chunk,
    source: Option<&str>,
    timestamp_rfc3339: &str,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(TEXT_KEY.into(), Value::String(chunk.text.clone()));
    metadata.insert(PAGE_KEY.into(), Value::from(chunk.source_page));
    metadata.insert(
        INDEXED_AT_KEY.into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    if let Some(source) = source.map(str::trim).filter(|value| !value.is_empty()) {
        metadata.insert(SOURCE_KEY.into(), Value::String(source.to_string()));
    }
    metadata
}

/// Rebuild a chunk from stored metadata; `None` when the text is missing.
///
/// Pinecone returns numeric metadata as floating point, so the page accepts either form.
pub(crate) fn chunk_from_metadata(metadata: &Map<String, Value>) -> Option<Chunk> {
    let text = metadata.get(TEXT_KEY)?.as_str()?.to_string();
    let source_page = metadata
        .get(PAGE_KEY)
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_f64().filter(|page| *page >= 0.0).map(|page| page as u64))
        })
        .and_then(|page| u32::try_from(page).ok())
        .unwrap_or(0);
    Some(Chunk { text, source_page })
}

/// Current timestamp formatted for metadata storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Fresh identifier for an indexed chunk.
pub(crate) fn generate_record_id() -> String {
    Uuid::new_v4().to_string()
}
