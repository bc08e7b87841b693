use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chat::accumulator::StreamInterrupted;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A tuning control outside its declared range. Rejected before any LLM call.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed or unreadable PDF. The session's previous resume is left untouched.
    #[error("Could not read PDF: {0}")]
    DocumentParse(String),

    #[error(transparent)]
    StreamInterrupted(#[from] StreamInterrupted),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code, shared by JSON bodies and SSE error events.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidParameter(_) => "INVALID_PARAMETER",
            AppError::DocumentParse(_) => "DOCUMENT_PARSE_ERROR",
            AppError::StreamInterrupted(_) => "STREAM_INTERRUPTED",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidParameter(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::DocumentParse(msg) => {
                tracing::warn!("Rejected upload: {msg}");
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::StreamInterrupted(e) => {
                tracing::warn!("Response stream interrupted: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "The advisor stopped responding before finishing".to_string(),
                )
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::StreamInterrupted(e) = &self {
            error["partial"] = json!(e.partial);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
