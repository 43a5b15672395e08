//! HTTP surface for the handbook RAG service.
//!
//! - `POST /upload` – Multipart upload (`file`, `openai_key`, `pinecone_key`, `index_name`).
//!   Indexes the PDF and returns `{ session_id, chunks_indexed, message }`.
//! - `POST /ask` – `{ session_id, question, openai_key? }` → `{ answer, session_id }`.
//! - `GET /health` – Liveness check.
//! - `GET /metrics` – Ingestion and question counters.
//!
//! Errors are logged in full and answered with a generic `{ "detail": ... }` body.

use crate::error::RagError;
use crate::metrics::MetricsSnapshot;
use crate::service::{AskRequest, RagApi, UploadRequest};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartError, rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

const UPLOAD_FAILED: &str = "PDF indexing failed. Check your API keys and index name.";
const SESSION_NOT_FOUND: &str = "Session not found. Please upload a PDF first.";
const ANSWER_FAILED: &str = "Failed to generate an answer.";

/// Build the HTTP router; request bodies larger than `max_upload_bytes` are rejected.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/ask", post(ask_question::<S>))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    session_id: String,
    chunks_indexed: usize,
    message: String,
}

/// Index an uploaded PDF and open a session for it.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let upload = read_upload(multipart)
        .await
        .map_err(|error| AppError::rejected(error.status(), error.body_text()))?;
    if upload.bytes.is_empty() && upload.filename.is_none() {
        return Err(AppError::upload(RagError::Validation(
            "A PDF file is required.".into(),
        )));
    }

    let outcome = service.ingest(upload).await.map_err(AppError::upload)?;
    Ok(Json(UploadResponse {
        message: format!("Successfully indexed {} chunks.", outcome.chunks_indexed),
        session_id: outcome.session_id,
        chunks_indexed: outcome.chunks_indexed,
    }))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadRequest, MultipartError> {
    let mut upload = UploadRequest::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                upload.filename = field.file_name().map(str::to_string);
                upload.bytes = field.bytes().await?.to_vec();
            }
            Some("openai_key") => upload.llm_key = Some(field.text().await?),
            Some("pinecone_key") => upload.index_key = Some(field.text().await?),
            Some("index_name") => upload.index_name = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(upload)
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskBody {
    session_id: String,
    question: String,
    /// Overrides the key captured at upload when non-blank.
    #[serde(default)]
    openai_key: Option<String>,
}

/// Response body for `POST /ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    session_id: String,
}

/// Answer a question from a previously uploaded document.
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    body: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError>
where
    S: RagApi,
{
    let Json(body) =
        body.map_err(|rejection| AppError::rejected(rejection.status(), rejection.body_text()))?;
    let AskBody {
        session_id,
        question,
        openai_key,
    } = body;
    let answer = service
        .ask(AskRequest {
            session_id: session_id.clone(),
            question,
            llm_key: openai_key,
        })
        .await
        .map_err(AppError::ask)?;
    Ok(Json(AskResponse { answer, session_id }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Return the ingestion and question counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

/// Error wrapper translating failures into a status code and a `{ "detail": ... }` body.
enum AppError {
    /// The pipeline failed; unexpected errors are answered with `fallback`.
    Pipeline {
        error: RagError,
        fallback: &'static str,
    },
    /// axum refused the request body before it reached the pipeline.
    Rejected { status: StatusCode, detail: String },
}

impl AppError {
    fn upload(error: RagError) -> Self {
        Self::Pipeline {
            error,
            fallback: UPLOAD_FAILED,
        }
    }

    fn ask(error: RagError) -> Self {
        Self::Pipeline {
            error,
            fallback: ANSWER_FAILED,
        }
    }

    fn rejected(status: StatusCode, detail: String) -> Self {
        Self::Rejected { status, detail }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::Rejected { status, detail } => {
                tracing::debug!(status = status.as_u16(), detail = %detail, "Request body rejected");
                (status, detail)
            }
            AppError::Pipeline { error, fallback } => {
                let (status, detail) = match &error {
                    RagError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
                    RagError::NotFound(_) => {
                        (StatusCode::NOT_FOUND, SESSION_NOT_FOUND.to_string())
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string()),
                };
                if status.is_server_error() {
                    tracing::error!(kind = ?error.kind(), error = %error, "Request failed");
                } else {
                    tracing::debug!(error = %error, "Request rejected");
                }
                (status, detail)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
