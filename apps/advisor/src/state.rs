use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::ChatBackend;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Inference backend. Default: `LlmClient`; tests swap in a stub.
    pub llm: Arc<dyn ChatBackend>,
    pub sessions: SessionStore,
    pub config: Config,
}
