//! Answer generation: format retrieved context, prompt the chat model, bound the reply.

pub mod prompt;
pub mod trim;

use crate::chat::{ChatClient, ChatRequest};
use crate::config::GenerationSettings;
use crate::credentials::ApiKey;
use crate::error::RagError;
use crate::processing::Chunk;
use std::sync::Arc;

pub use prompt::{
    EMPTY_QUESTION_REPLY, NO_CONTEXT_PLACEHOLDER, NOT_COVERED_REPLY, build_prompt, format_context,
};
pub use trim::trim_to_max_sentences;

/// Prompts the chat model with retrieved context and trims its reply.
pub struct AnswerPipeline {
    chat: Arc<dyn ChatClient>,
    settings: GenerationSettings,
}

impl AnswerPipeline {
    /// Combine a chat client with generation parameters.
    pub fn new(chat: Arc<dyn ChatClient>, settings: GenerationSettings) -> Self {
        Self { chat, settings }
    }

    /// Answer `question` from `chunks` using `credential` for the chat call.
    ///
    /// A blank question short-circuits to [`EMPTY_QUESTION_REPLY`] without calling the model.
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[Chunk],
        credential: &ApiKey,
    ) -> Result<String, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(EMPTY_QUESTION_REPLY.to_string());
        }

        let context = format_context(chunks);
        let request = ChatRequest::new(build_prompt(&context, question), &self.settings);
        let raw = self.chat.complete(request, credential).await?;
        let answer = trim_to_max_sentences(&raw, self.settings.max_answer_sentences);

        tracing::debug!(
            context_chunks = chunks.len(),
            raw_chars = raw.len(),
            answer_chars = answer.len(),
            "Answer generated"
        );
        Ok(answer)
    }
}
