//! Chat completion clients used by the answer pipeline.
//!
//! The pipeline submits exactly one prompt per question and expects a single, non-streamed
//! completion back. The OpenAI-backed client mirrors the embedding adapter by issuing HTTP
//! requests directly to the provider.

use crate::config::{Config, GenerationSettings};
use crate::credentials::ApiKey;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while requesting a chat completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider rejected the supplied key.
    #[error("Chat provider rejected the credential: {0}")]
    Unauthorized(String),
    /// Provider could not be reached or timed out.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the chat provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully rendered prompt, sent as a single user message.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Penalty applied to frequently repeated tokens.
    pub frequency_penalty: f64,
    /// Penalty applied to tokens already present.
    pub presence_penalty: f64,
}

impl ChatRequest {
    /// Combine a prompt with the configured generation parameters.
    pub fn new(prompt: String, settings: &GenerationSettings) -> Self {
        Self {
            model: settings.model.clone(),
            prompt,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
        }
    }
}

/// Interface implemented by chat completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Return the raw completion text for the request.
    async fn complete(
        &self,
        request: ChatRequest,
        credential: &ApiKey,
    ) -> Result<String, ChatClientError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
}

impl OpenAiChatClient {
    /// Construct a client for the given endpoint.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(
        &self,
        request: ChatRequest,
        credential: &ApiKey,
    ) -> Result<String, ChatClientError> {
        let payload = json!({
            "model": request.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "frequency_penalty": request.frequency_penalty,
            "presence_penalty": request.presence_penalty,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                ChatClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::Unauthorized(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatClientError::GenerationFailed(format!("{status}: {body}")));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|error| ChatClientError::InvalidResponse(error.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatClientError::InvalidResponse("no completion returned".into()))?;

        tracing::debug!(
            model = %request.model,
            characters = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }
}

/// Build the chat client described by the configuration.
pub fn get_chat_client(config: &Config, http: Client) -> Arc<dyn ChatClient> {
    Arc::new(OpenAiChatClient::new(http, config.openai_base_url.clone()))
}
