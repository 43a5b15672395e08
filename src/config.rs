use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::credentials::ApiKey;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Values parsed individually but are inconsistent with each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
    /// Configuration was installed twice.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the handbook RAG server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interface the HTTP server binds to.
    pub server_host: String,
    /// Port the HTTP server binds to.
    pub server_port: u16,
    /// Default embedding/LLM key used when an upload omits one.
    #[serde(skip)]
    pub openai_api_key: Option<ApiKey>,
    /// Default vector-store key used when an upload omits one.
    #[serde(skip)]
    pub pinecone_api_key: Option<ApiKey>,
    /// Default index name used when an upload omits one.
    pub pinecone_index_name: Option<String>,
    /// Optional namespace inside the Pinecone index.
    pub pinecone_namespace: Option<String>,
    /// Base URL of the Pinecone control plane used to resolve index hosts.
    pub pinecone_controller_url: String,
    /// Base URL of the OpenAI-compatible API (embeddings and chat completions).
    pub openai_base_url: String,
    /// Chunking parameters.
    pub chunking: ChunkingSettings,
    /// Retrieval parameters.
    pub retrieval: RetrievalSettings,
    /// Chat generation parameters.
    pub generation: GenerationSettings,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Maximum number of texts submitted per embedding request.
    pub embedding_batch_size: usize,
    /// Deadline applied to every outbound HTTP call.
    pub request_timeout: Duration,
    /// Upper bound on the size of an uploaded PDF, in bytes.
    pub max_upload_bytes: usize,
}

/// Target size, overlap, and minimum length used by the chunker (all in characters).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ChunkingSettings {
    /// Preferred upper bound on chunk length.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunks whose trimmed length is at or below this value are dropped.
    pub min_chunk_length: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 250,
            chunk_overlap: 30,
            min_chunk_length: 30,
        }
    }
}

/// Fixed MMR search parameters applied by every retriever.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RetrievalSettings {
    /// Chunks handed to the answer pipeline.
    pub k: usize,
    /// Candidates fetched before MMR re-ranking.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda_mult: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 3,
            fetch_k: 15,
            lambda_mult: 0.85,
        }
    }
}

/// Chat model parameters used by the answer pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GenerationSettings {
    /// Chat model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; zero keeps answers deterministic.
    pub temperature: f64,
    /// Penalty discouraging repeated tokens.
    pub frequency_penalty: f64,
    /// Penalty discouraging repeated topics.
    pub presence_penalty: f64,
    /// Answers longer than this many sentences are trimmed.
    pub max_answer_sentences: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 120,
            temperature: 0.0,
            frequency_penalty: 0.5,
            presence_penalty: 0.3,
            max_answer_sentences: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            openai_api_key: None,
            pinecone_api_key: None,
            pinecone_index_name: None,
            pinecone_namespace: None,
            pinecone_controller_url: "https://api.pinecone.io".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_batch_size: 256,
            request_timeout: Duration::from_secs(60),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Every variable is optional; unset or blank values fall back to [`Config::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            server_host: load_env_optional("API_HOST").unwrap_or(defaults.server_host),
            server_port: load_env_parsed("API_PORT", defaults.server_port)?,
            openai_api_key: load_env_optional("OPENAI_API_KEY").map(ApiKey::new),
            pinecone_api_key: load_env_optional("PINECONE_API_KEY").map(ApiKey::new),
            pinecone_index_name: load_env_optional("PINECONE_INDEX_NAME"),
            pinecone_namespace: load_env_optional("PINECONE_NAMESPACE"),
            pinecone_controller_url: load_env_optional("PINECONE_CONTROLLER_URL")
                .unwrap_or(defaults.pinecone_controller_url),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            chunking: ChunkingSettings {
                chunk_size: load_env_parsed("CHUNK_SIZE", defaults.chunking.chunk_size)?,
                chunk_overlap: load_env_parsed("CHUNK_OVERLAP", defaults.chunking.chunk_overlap)?,
                min_chunk_length: load_env_parsed(
                    "MIN_CHUNK_LENGTH",
                    defaults.chunking.min_chunk_length,
                )?,
            },
            retrieval: RetrievalSettings {
                k: load_env_parsed("RETRIEVER_K", defaults.retrieval.k)?,
                fetch_k: load_env_parsed("RETRIEVER_FETCH_K", defaults.retrieval.fetch_k)?,
                lambda_mult: load_env_parsed(
                    "RETRIEVER_LAMBDA_MULT",
                    defaults.retrieval.lambda_mult,
                )?,
            },
            generation: GenerationSettings {
                model: load_env_optional("LLM_MODEL").unwrap_or(defaults.generation.model),
                max_tokens: load_env_parsed("LLM_MAX_TOKENS", defaults.generation.max_tokens)?,
                temperature: load_env_parsed(
                    "LLM_TEMPERATURE",
                    defaults.generation.temperature,
                )?,
                frequency_penalty: load_env_parsed(
                    "LLM_FREQUENCY_PENALTY",
                    defaults.generation.frequency_penalty,
                )?,
                presence_penalty: load_env_parsed(
                    "LLM_PRESENCE_PENALTY",
                    defaults.generation.presence_penalty,
                )?,
                max_answer_sentences: load_env_parsed(
                    "LLM_MAX_ANSWER_SENTENCES",
                    defaults.generation.max_answer_sentences,
                )?,
            },
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_batch_size: load_env_parsed(
                "EMBEDDING_BATCH_SIZE",
                defaults.embedding_batch_size,
            )?,
            request_timeout: Duration::from_secs(load_env_parsed(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_upload_bytes: load_env_parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(ConfigError::Inconsistent(
                "CHUNK_SIZE must be greater than zero".into(),
            ));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::Inconsistent(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        let retrieval = &self.retrieval;
        if retrieval.k == 0 {
            return Err(ConfigError::Inconsistent(
                "RETRIEVER_K must be greater than zero".into(),
            ));
        }
        if retrieval.fetch_k < retrieval.k {
            return Err(ConfigError::Inconsistent(format!(
                "RETRIEVER_FETCH_K ({}) must be at least RETRIEVER_K ({})",
                retrieval.fetch_k, retrieval.k
            )));
        }
        if !(0.0..=1.0).contains(&retrieval.lambda_mult) {
            return Err(ConfigError::Inconsistent(
                "RETRIEVER_LAMBDA_MULT must be within [0.0, 1.0]".into(),
            ));
        }
        if self.generation.max_answer_sentences == 0 {
            return Err(ConfigError::Inconsistent(
                "LLM_MAX_ANSWER_SENTENCES must be greater than zero".into(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::Inconsistent(
                "EMBEDDING_BATCH_SIZE must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, falling back to defaults when nothing was installed.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

/// Load configuration from `.env` and the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        host = %config.server_host,
        port = config.server_port,
        chunk_size = config.chunking.chunk_size,
        chunk_overlap = config.chunking.chunk_overlap,
        k = config.retrieval.k,
        fetch_k = config.retrieval.fetch_k,
        lambda_mult = config.retrieval.lambda_mult,
        llm_model = %config.generation.model,
        embedding_model = %config.embedding_model,
        has_default_openai_key = config.openai_api_key.is_some(),
        has_default_pinecone_key = config.pinecone_api_key.is_some(),
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}
