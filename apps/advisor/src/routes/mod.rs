pub mod health;
pub mod ui;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/", get(ui::index_handler))
        .route("/health", get(health::health_handler))
        .route("/api/v1/defaults", get(chat::handle_defaults))
        // Sessions
        .route("/api/v1/sessions", post(session::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(session::handle_get_session).delete(session::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/resume",
            post(session::handle_upload_resume).get(session::handle_get_resume),
        )
        // Chat
        .route("/api/v1/sessions/:id/chat", post(chat::handle_chat))
        .route("/api/v1/advise", post(chat::handle_advise))
        .layer(upload_limit)
        .with_state(state)
}
