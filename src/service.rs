//! RAG service coordinating ingestion (PDF → chunks → vectors → session) and question answering.

use crate::{
    answer::{AnswerPipeline, EMPTY_QUESTION_REPLY},
    chat::{ChatClient, get_chat_client},
    config::{ChunkingSettings, Config, RetrievalSettings},
    credentials::{ApiKey, CredentialSet},
    embedding::{EmbeddingClient, get_embedding_client},
    error::RagError,
    metrics::{MetricsSnapshot, RagMetrics},
    pinecone::{PineconeConnector, PineconeError},
    processing::{IngestOutcome, PageExtractor, PdfExtractLoader, load_pages, split_pages, validate_pdf},
    retrieval::Retriever,
    session::SessionRegistry,
    vector_store::{IndexConnector, VectorStore},
};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use uuid::Uuid;

/// Uploaded document plus the optional per-upload credentials.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Original file name, used for validation and stored as chunk provenance.
    pub filename: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Embedding/LLM key; falls back to the configured default when blank.
    pub llm_key: Option<String>,
    /// Vector index key; falls back to the configured default when blank.
    pub index_key: Option<String>,
    /// Vector index name; falls back to the configured default when blank.
    pub index_name: Option<String>,
}

/// Question addressed to an existing session.
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    /// Session returned by a previous upload.
    pub session_id: String,
    /// Natural-language question.
    pub question: String,
    /// Optional LLM key overriding the one captured at upload.
    pub llm_key: Option<String>,
}

/// Abstraction over the RAG pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Validate, chunk, embed, and index an uploaded PDF, creating a session for it.
    async fn ingest(&self, upload: UploadRequest) -> Result<IngestOutcome, RagError>;

    /// Answer a question from the session's document.
    async fn ask(&self, request: AskRequest) -> Result<String, RagError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Remote and local collaborators the service orchestrates.
pub struct RagComponents {
    /// Embedding provider used for chunks and queries.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Chat provider used for answers.
    pub chat: Arc<dyn ChatClient>,
    /// Opens vector index handles per upload.
    pub connector: Arc<dyn IndexConnector>,
    /// Extracts page text from PDFs.
    pub extractor: Arc<dyn PageExtractor>,
}

#[derive(Debug, Clone, Default)]
struct DefaultCredentials {
    llm_key: Option<ApiKey>,
    index_key: Option<ApiKey>,
    index_name: Option<String>,
}

/// Coordinates the ingestion and answering pipelines around a shared session registry.
///
/// Construct once near process start and share through an `Arc`.
pub struct RagService {
    embedder: Arc<dyn EmbeddingClient>,
    connector: Arc<dyn IndexConnector>,
    extractor: Arc<dyn PageExtractor>,
    answers: AnswerPipeline,
    sessions: SessionRegistry,
    chunking: ChunkingSettings,
    retrieval: RetrievalSettings,
    defaults: DefaultCredentials,
    metrics: RagMetrics,
}

impl RagService {
    /// Assemble a service from explicit collaborators and the runtime configuration.
    pub fn new(components: RagComponents, config: &Config) -> Self {
        let RagComponents {
            embedder,
            chat,
            connector,
            extractor,
        } = components;
        Self {
            embedder,
            connector,
            extractor,
            answers: AnswerPipeline::new(chat, config.generation.clone()),
            sessions: SessionRegistry::new(),
            chunking: config.chunking,
            retrieval: config.retrieval,
            defaults: DefaultCredentials {
                llm_key: config.openai_api_key.clone(),
                index_key: config.pinecone_api_key.clone(),
                index_name: config
                    .pinecone_index_name
                    .clone()
                    .filter(|name| !name.trim().is_empty()),
            },
            metrics: RagMetrics::new(),
        }
    }

    /// Build the production service: OpenAI embeddings and chat, Pinecone, and `pdf-extract`.
    pub fn from_config(config: &Config, http: Client) -> Result<Self, PineconeError> {
        tracing::info!(
            embedding_model = %config.embedding_model,
            chat_model = %config.generation.model,
            has_default_llm_key = config.openai_api_key.is_some(),
            has_default_index_key = config.pinecone_api_key.is_some(),
            "Initializing RAG service"
        );
        let components = RagComponents {
            embedder: get_embedding_client(config, http.clone()),
            chat: get_chat_client(config, http.clone()),
            connector: Arc::new(PineconeConnector::from_config(config, http)?),
            extractor: Arc::new(PdfExtractLoader),
        };
        Ok(Self::new(components, config))
    }

    /// Registry holding the sessions created by [`RagApi::ingest`].
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn resolve_credentials(&self, upload: &UploadRequest) -> Result<CredentialSet, RagError> {
        let llm_key = ApiKey::non_blank(upload.llm_key.clone())
            .or_else(|| self.defaults.llm_key.clone())
            .ok_or_else(|| RagError::Validation("An OpenAI API key is required.".into()))?;
        let index_key = ApiKey::non_blank(upload.index_key.clone())
            .or_else(|| self.defaults.index_key.clone())
            .ok_or_else(|| RagError::Validation("A Pinecone API key is required.".into()))?;
        let index_name = upload
            .index_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| self.defaults.index_name.clone())
            .ok_or_else(|| RagError::Validation("A Pinecone index name is required.".into()))?;
        Ok(CredentialSet {
            llm_key,
            index_key,
            index_name,
        })
    }

    async fn run_ingest(&self, upload: UploadRequest) -> Result<IngestOutcome, RagError> {
        validate_pdf(upload.filename.as_deref(), &upload.bytes)?;
        let credentials = self.resolve_credentials(&upload)?;
        let UploadRequest {
            filename, bytes, ..
        } = upload;
        tracing::info!(
            file = filename.as_deref().unwrap_or_default(),
            bytes = bytes.len(),
            "Processing upload"
        );

        let pages = load_pages(self.extractor.clone(), bytes).await?;
        let ChunkingSettings {
            chunk_size,
            chunk_overlap,
            min_chunk_length,
        } = self.chunking;
        let chunks = split_pages(&pages, chunk_size, chunk_overlap, min_chunk_length)?;
        if chunks.is_empty() {
            return Err(RagError::Validation(
                "The PDF does not contain any extractable text.".into(),
            ));
        }
        tracing::debug!(pages = pages.len(), chunks = chunks.len(), "Document chunked");

        // The index must resolve before any chunk is embedded.
        let index = self
            .connector
            .connect(&credentials.index_key, &credentials.index_name)
            .await?;
        let store = VectorStore::new(index);

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embedder
            .generate_embeddings(texts, &credentials.llm_key)
            .await?;
        let chunks_indexed = store.upsert(&chunks, vectors, filename.as_deref()).await?;

        let session_id = Uuid::new_v4().to_string();
        let retriever = Arc::new(Retriever::new(
            store,
            self.embedder.clone(),
            self.retrieval,
        ));
        self.sessions
            .create(session_id.clone(), retriever, credentials.llm_key)
            .await;
        self.metrics.record_document(chunks_indexed as u64);

        tracing::info!(
            session_id = %session_id,
            chunks = chunks_indexed,
            "Document indexed"
        );
        Ok(IngestOutcome {
            session_id,
            chunks_indexed,
        })
    }

    async fn run_ask(&self, request: AskRequest) -> Result<String, RagError> {
        let AskRequest {
            session_id,
            question,
            llm_key,
        } = request;
        let session = self
            .sessions
            .get(&session_id)
            .await
            .ok_or_else(|| RagError::NotFound(session_id.clone()))?;

        let question = question.trim();
        if question.is_empty() {
            return Ok(EMPTY_QUESTION_REPLY.to_string());
        }

        let credential = ApiKey::non_blank(llm_key).unwrap_or(session.credential);
        let chunks = session.retriever.retrieve(question, &credential).await?;
        let answer = self.answers.answer(question, &chunks, &credential).await?;
        tracing::info!(
            session_id = %session_id,
            context_chunks = chunks.len(),
            "Question answered"
        );
        Ok(answer)
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest(&self, upload: UploadRequest) -> Result<IngestOutcome, RagError> {
        let result = self.run_ingest(upload).await;
        if let Err(error) = &result {
            self.metrics.record_failure();
            tracing::warn!(kind = ?error.kind(), error = %error, "Upload failed");
        }
        result
    }

    async fn ask(&self, request: AskRequest) -> Result<String, RagError> {
        let result = self.run_ask(request).await;
        match &result {
            Ok(_) => self.metrics.record_question(),
            Err(error) => {
                self.metrics.record_failure();
                tracing::warn!(kind = ?error.kind(), error = %error, "Question failed");
            }
        }
        result
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
