use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::chat::prompts::UPLOAD_SUCCESS_MESSAGE;
use crate::errors::AppError;
use crate::extract::extract_pdf;
use crate::session::SessionInfo;
use crate::state::AppState;

/// Multipart field carrying the PDF, shared with the one-shot advise endpoint.
pub const RESUME_FIELD: &str = "resume";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct ResumeTextResponse {
    pub text: String,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionInfo>) {
    (StatusCode::CREATED, Json(state.sessions.create().await))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionInfo>, AppError> {
    Ok(Json(state.sessions.info(id).await?))
}

/// DELETE /api/v1/sessions/:id
///
/// Ends the session. A chat stream still running for it is cancelled.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/resume
///
/// Multipart upload with a `resume` PDF field. On a parse failure the session keeps
/// whatever resume it had before.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    // Fail fast on a dead session before parsing anything.
    state.sessions.info(id).await?;

    let mut pdf: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some(RESUME_FIELD) {
            let filename = field.file_name().unwrap_or("resume.pdf").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
            pdf = Some((filename, data));
        }
    }

    let (filename, data) = pdf.ok_or_else(|| {
        AppError::Validation(format!("Missing '{RESUME_FIELD}' file field"))
    })?;
    info!("Session {id}: received '{filename}' ({} bytes)", data.len());

    let text = extract_pdf(data).await?;
    let session = state.sessions.set_resume(id, text).await?;

    Ok(Json(UploadResponse {
        status: UPLOAD_SUCCESS_MESSAGE.to_string(),
        session,
    }))
}

/// GET /api/v1/sessions/:id/resume
///
/// Returns the extracted text so the user can see what the advisor sees.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeTextResponse>, AppError> {
    let text = state.sessions.resume_text(id).await?;
    Ok(Json(ResumeTextResponse { text }))
}
