//! Recursive character chunking.
//!
//! Page text is split on the coarsest separator it contains (paragraph break, line break,
//! period, space, and finally individual characters). Pieces that are still too long are split
//! again with the next finer separator; short pieces are merged greedily back up to the
//! target size, with a sliding window of trailing pieces carried into the next chunk so that
//! concepts straddling a boundary remain visible in both.
//!
//! Separators stay attached to the start of the piece that follows them, so joining the
//! pieces of a chunk reproduces a contiguous slice of the page. All lengths are counted in
//! characters, not bytes.

use std::collections::VecDeque;

use super::types::{Chunk, ChunkingError, DocumentPage};

/// Separator preference, coarsest first. The empty separator splits into characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

/// Split every page into overlapping chunks and drop fragments that are too short.
///
/// Chunks never span pages and inherit their page number. A chunk survives only when its
/// trimmed length is strictly greater than `min_length`, which removes running headers,
/// footers, and whitespace-only artifacts. The output is a pure function of the inputs.
pub fn split_pages(
    pages: &[DocumentPage],
    target_size: usize,
    overlap: usize,
    min_length: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let splitter = RecursiveSplitter::new(target_size, overlap)?;
    let mut chunks = Vec::new();
    for page in pages {
        let before = chunks.len();
        chunks.extend(
            splitter
                .split_text(&page.text)
                .into_iter()
                .filter(|text| char_len(text.trim()) > min_length)
                .map(|text| Chunk {
                    text,
                    source_page: page.page,
                }),
        );
        tracing::trace!(page = page.page, chunks = chunks.len() - before, "Page split");
    }
    Ok(chunks)
}

/// Character-budgeted splitter working through [`SEPARATORS`].
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// Create a splitter, rejecting budgets that cannot make progress.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: chunk_overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split raw text into chunks of at most `chunk_size` characters where possible.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = select_separator(text, separators);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily merge consecutive pieces into chunks, carrying an overlap window forward.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        length = total,
                        chunk_size = self.chunk_size,
                        "Created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    if let Some(chunk) = join_window(&window) {
                        merged.push(chunk);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }
        merged
    }
}

/// Choose the first separator present in `text`, returning it with the finer fallbacks.
fn select_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (idx, &candidate) in separators.iter().enumerate() {
        if candidate.is_empty() {
            return (candidate, &[]);
        }
        if text.contains(candidate) {
            return (candidate, &separators[idx + 1..]);
        }
    }
    ("", &[])
}

/// Split `text` on `separator`, attaching each separator to the piece that follows it.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_without_periods(min_chars: usize) -> String {
        let mut text = String::new();
        let mut idx = 0;
        while text.chars().count() < min_chars {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&format!("term{idx}"));
            idx += 1;
        }
        text
    }

    #[test]
    fn separators_stay_attached_to_following_piece() {
        assert_eq!(
            split_keeping_separator("a.b.c", "."),
            vec!["a", ".b", ".c"]
        );
        assert_eq!(split_keeping_separator("..a", "."), vec![".", ".a"]);
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }

    #[test]
    fn select_separator_prefers_coarsest_present() {
        let (separator, finer) = select_separator("one\ntwo three", &SEPARATORS);
        assert_eq!(separator, "\n");
        assert_eq!(finer, &[".", " ", ""]);

        let (separator, finer) = select_separator("nowhitespace", &SEPARATORS);
        assert_eq!(separator, "");
        assert!(finer.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = RecursiveSplitter::new(250, 30).unwrap();
        let chunks = splitter.split_text("  The vacation policy allows 20 days per year.  ");
        assert_eq!(chunks, vec!["The vacation policy allows 20 days per year."]);
    }

    #[test]
    fn paragraphs_are_kept_together_when_they_fit() {
        let splitter = RecursiveSplitter::new(40, 0).unwrap();
        let text = "First paragraph is here.\n\nSecond paragraph follows.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec!["First paragraph is here.", "Second paragraph follows."]
        );
    }

    #[test]
    fn long_paragraph_yields_overlapping_chunks_covering_the_source() {
        let text = paragraph_without_periods(1000);
        let chunks = split_pages(&[DocumentPage::new(text.clone(), 0)], 250, 30, 0).unwrap();
        assert!(chunks.len() > 1, "expected multiple chunks, got {}", chunks.len());

        let mut previous: Option<(usize, usize)> = None;
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 250);
            let search_from = previous.map(|(start, _)| start + 1).unwrap_or(0);
            let offset = text[search_from..]
                .find(&chunk.text)
                .expect("chunk is a contiguous slice of the source");
            let start = search_from + offset;
            let end = start + chunk.text.len();
            match previous {
                None => assert_eq!(start, 0),
                Some((_, previous_end)) => {
                    assert!(start < previous_end, "consecutive chunks must overlap");
                    assert!(previous_end - start <= 30, "overlap exceeds the budget");
                }
            }
            previous = Some((start, end));
        }
        assert_eq!(previous.map(|(_, end)| end), Some(text.len()));
    }

    #[test]
    fn oversized_words_fall_back_to_character_splitting() {
        let splitter = RecursiveSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text("abcdefghijklmnopqrstuvwxyz");
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
        assert!(chunks[0].starts_with("abcdefghij"));
    }

    #[test]
    fn short_fragments_are_dropped() {
        let pages = vec![
            DocumentPage::new("Page 1", 0),
            DocumentPage::new("   \n\n   ", 1),
            DocumentPage::new(
                "Employees accrue paid time off every month of service.",
                2,
            ),
        ];
        let chunks = split_pages(&pages, 250, 30, 30).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_page, 2);
        for chunk in &chunks {
            assert!(chunk.text.trim().chars().count() > 30);
        }
    }

    #[test]
    fn chunks_never_span_pages() {
        let pages = vec![
            DocumentPage::new(paragraph_without_periods(400), 0),
            DocumentPage::new(paragraph_without_periods(400), 1),
        ];
        let chunks = split_pages(&pages, 250, 30, 30).unwrap();
        let first_page: Vec<_> = chunks.iter().filter(|c| c.source_page == 0).collect();
        let second_page: Vec<_> = chunks.iter().filter(|c| c.source_page == 1).collect();
        assert!(!first_page.is_empty());
        assert_eq!(first_page.len(), second_page.len());
        let boundary = chunks
            .iter()
            .position(|chunk| chunk.source_page == 1)
            .unwrap();
        assert!(chunks[..boundary].iter().all(|c| c.source_page == 0));
    }

    #[test]
    fn splitting_is_deterministic() {
        let pages = vec![
            DocumentPage::new(
                format!(
                    "{}\n\nBenefits. {}\nLeave. {}",
                    paragraph_without_periods(300),
                    paragraph_without_periods(200),
                    paragraph_without_periods(500)
                ),
                0,
            ),
            DocumentPage::new(paragraph_without_periods(700), 1),
        ];
        let first = split_pages(&pages, 250, 30, 30).unwrap();
        for _ in 0..5 {
            assert_eq!(split_pages(&pages, 250, 30, 30).unwrap(), first);
        }
    }

    #[test]
    fn rejects_invalid_budgets() {
        assert!(matches!(
            RecursiveSplitter::new(0, 0),
            Err(ChunkingError::InvalidChunkSize)
        ));
        assert!(matches!(
            RecursiveSplitter::new(30, 30),
            Err(ChunkingError::OverlapTooLarge { .. })
        ));
    }
}
