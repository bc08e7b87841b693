//! Axum route handlers for the advisor chat.

use std::convert::Infallible;

use axum::{
    extract::{Multipart, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::chat::accumulator::{accumulate, collect};
use crate::chat::events::{prefix_events, EventStream};
use crate::chat::messages::{build_messages, ConversationTurn};
use crate::chat::params::{ChatDefaults, GenerationParams};
use crate::chat::prompts::DEFAULT_SYSTEM_MESSAGE;
use crate::errors::AppError;
use crate::extract::extract_pdf;
use crate::session::handlers::RESUME_FIELD;
use crate::session::SessionStore;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    pub system_message: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct AdviseResponse {
    pub response: String,
}

/// Text fields accepted next to the PDF by the one-shot endpoint.
#[derive(Debug, Default)]
struct AdviseForm {
    resume: Option<Bytes>,
    message: Option<String>,
    system_message: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/defaults
pub async fn handle_defaults() -> Json<ChatDefaults> {
    Json(ChatDefaults::current())
}

/// POST /api/v1/sessions/:id/chat
///
/// Streams the advisor's answer as SSE. Each `message` event carries the whole
/// answer so far; `done` or `error` closes the turn. Sending another message on
/// the same session cancels this one. Whitespace-only messages are rejected.
pub async fn handle_chat(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<EventStream>, AppError> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    let params =
        GenerationParams::from_optional(request.max_tokens, request.temperature, request.top_p)?;
    let system_message = request
        .system_message
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_MESSAGE);

    let turn = state.sessions.begin_turn(session_id).await?;
    let messages = build_messages(
        system_message,
        &request.history,
        &turn.resume_text,
        &request.message,
    );
    info!(
        "Session {session_id}: chat turn with {} history turns, resume {} chars",
        request.history.len(),
        turn.resume_text.len()
    );

    let fragments = match state.llm.stream_chat(&messages, &params).await {
        Ok(fragments) => fragments,
        Err(e) => {
            state.sessions.end_turn(session_id, turn.id).await;
            return Err(e.into());
        }
    };
    let events = prefix_events(Box::pin(accumulate(fragments)), turn.cancel);
    let events = release_turn_on_end(events, state.sessions.clone(), session_id, turn.id);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Clears the session's in-flight marker once `events` is exhausted.
fn release_turn_on_end(
    events: EventStream,
    sessions: SessionStore,
    session_id: Uuid,
    turn_id: Uuid,
) -> EventStream {
    let release = stream::once(async move { sessions.end_turn(session_id, turn_id).await })
        .filter_map(|()| future::ready(None::<Result<Event, Infallible>>));
    Box::pin(events.chain(release))
}

/// POST /api/v1/advise
///
/// One-shot variant: multipart with a `resume` PDF and a `message`, optionally the
/// tuning controls. Waits for the full answer and returns it as JSON. Touches no session.
pub async fn handle_advise(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AdviseResponse>, AppError> {
    let form = read_advise_form(multipart).await?;

    let message = form
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::Validation("message cannot be empty".to_string()))?;
    let params = GenerationParams::from_optional(form.max_tokens, form.temperature, form.top_p)?;
    let resume = form.resume.ok_or_else(|| {
        AppError::Validation(format!("Missing '{RESUME_FIELD}' file field"))
    })?;

    let resume_text = extract_pdf(resume).await?;
    let system_message = form
        .system_message
        .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string());
    let messages = build_messages(&system_message, &[], &resume_text, &message);

    let fragments = state.llm.stream_chat(&messages, &params).await?;
    let response = collect(fragments).await?;
    info!("One-shot advice returned {} chars", response.len());

    Ok(Json(AdviseResponse { response }))
}

async fn read_advise_form(mut multipart: Multipart) -> Result<AdviseForm, AppError> {
    let mut form = AdviseForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == RESUME_FIELD {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
            form.resume = Some(data);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read field '{name}': {e}")))?;
        match name.as_str() {
            "message" => form.message = Some(value),
            "system_message" => form.system_message = Some(value),
            "max_tokens" => form.max_tokens = Some(parse_number(&name, &value)?),
            "temperature" => form.temperature = Some(parse_number(&name, &value)?),
            "top_p" => form.top_p = Some(parse_number(&name, &value)?),
            _ => {}
        }
    }
    Ok(form)
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidParameter(format!("{name} must be a number, got '{raw}'")))
}
