//! Context formatting and the fixed answer prompt.

use crate::processing::Chunk;

/// Returned instead of calling the model when the question is blank.
pub const EMPTY_QUESTION_REPLY: &str = "Please enter a valid question.";
/// Context placeholder used when retrieval returned nothing.
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant content found.";
/// Exact reply the model is instructed to give when the context lacks the answer.
pub const NOT_COVERED_REPLY: &str = "This topic is not covered in the provided document.";

const CHUNK_DELIMITER: &str = "\n\n---\n\n";

/// Render retrieved chunks as `[Page n] text` blocks, 1-based, in retrieval order.
pub fn format_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_PLACEHOLDER.to_string();
    }
    chunks
        .iter()
        .map(|chunk| format!("[Page {}] {}", chunk.source_page + 1, chunk.text.trim()))
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER)
}

/// Fill the answer template with the formatted context and the question.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a document reader. Your ONLY job is to extract and return the answer from the context below.

STRICT RULES:
- Use ONLY the words and sentences from the context. Do not rephrase or expand.
- Your answer must be 1-3 sentences MAX.
- Do NOT explain, summarize, or add anything extra.
- Do NOT answer from general knowledge. Only use what is written in the context.
- If the question asks about Topic X, answer ONLY about Topic X. Do not include related topics.
- If the answer is not found in the context, respond EXACTLY with: \"{NOT_COVERED_REPLY}\"

Context:
{context}

Question: {question}

Answer (copy relevant lines from context only, 1-3 sentences):"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_lists_pages_one_based() {
        let chunks = vec![
            Chunk {
                text: "  Employees receive 20 days of paid vacation. ".into(),
                source_page: 0,
            },
            Chunk {
                text: "Requests need two weeks notice.".into(),
                source_page: 4,
            },
        ];
        assert_eq!(
            format_context(&chunks),
            "[Page 1] Employees receive 20 days of paid vacation.\n\n---\n\n[Page 5] Requests need two weeks notice."
        );
    }

    #[test]
    fn empty_context_uses_placeholder() {
        assert_eq!(format_context(&[]), NO_CONTEXT_PLACEHOLDER);
    }

    #[test]
    fn prompt_embeds_context_question_and_fallback() {
        let prompt = build_prompt("[Page 1] Dress code is casual.", "What is the dress code?");
        assert!(prompt.contains("Context:\n[Page 1] Dress code is casual.\n\nQuestion: What is the dress code?"));
        assert!(prompt.contains(&format!("respond EXACTLY with: \"{NOT_COVERED_REPLY}\"")));
        assert!(prompt.ends_with("1-3 sentences):"));
    }
}
