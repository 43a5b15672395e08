//! Sentence-count limiting for model answers.

/// Keep at most `max_sentences` sentences of `text`.
///
/// Sentences are the non-empty, trimmed pieces between periods. Text within the limit is
/// returned trimmed but otherwise untouched; longer text is rebuilt from the first
/// `max_sentences` pieces joined with `". "` and closed with a period.
pub fn trim_to_max_sentences(text: &str, max_sentences: usize) -> String {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect();
    if sentences.len() <= max_sentences {
        return text.trim().to_string();
    }
    format!("{}.", sentences[..max_sentences].join(". "))
}
