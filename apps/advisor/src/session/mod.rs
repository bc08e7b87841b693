//! Per-session resume state.
//!
//! Each browser session owns one `ResumeSlot`. Sessions never see each other's
//! resume, and a session's slot is dropped with the session.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;

/// Holds the extracted text of the most recent upload. Empty until the first `set`.
#[derive(Debug, Clone, Default)]
pub struct ResumeSlot {
    text: String,
    uploaded_at: Option<DateTime<Utc>>,
}

impl ResumeSlot {
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.uploaded_at = Some(Utc::now());
    }

    pub fn get(&self) -> String {
        self.text.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        self.uploaded_at
    }
}

#[derive(Debug)]
struct InFlightTurn {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Session {
    created_at: DateTime<Utc>,
    last_seen: Instant,
    resume: ResumeSlot,
    /// The chat stream currently in flight, if any. Cleared when it ends.
    in_flight: Option<InFlightTurn>,
}

impl Session {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            last_seen: Instant::now(),
            resume: ResumeSlot::default(),
            in_flight: None,
        }
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn cancel_in_flight(&mut self) {
        if let Some(turn) = self.in_flight.take() {
            turn.cancel.cancel();
        }
    }

    fn info(&self, id: Uuid) -> SessionInfo {
        SessionInfo {
            session_id: id,
            created_at: self.created_at,
            has_resume: !self.resume.is_empty(),
            resume_chars: self.resume.char_count(),
            resume_uploaded_at: self.resume.uploaded_at(),
            streaming: self.in_flight.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub has_resume: bool,
    pub resume_chars: usize,
    pub resume_uploaded_at: Option<DateTime<Utc>>,
    /// A chat stream is currently running for this session.
    pub streaming: bool,
}

/// Everything a chat turn needs from its session.
#[derive(Debug)]
pub struct TurnContext {
    pub id: Uuid,
    pub resume_text: String,
    pub cancel: CancellationToken,
}

/// All live sessions, keyed by id.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> SessionInfo {
        let id = Uuid::new_v4();
        let session = Session::new();
        let info = session.info(id);
        self.sessions.write().await.insert(id, session);
        info!("Session {id} created");
        info
    }

    pub async fn info(&self, id: Uuid) -> Result<SessionInfo, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = lookup(&mut sessions, id)?;
        session.touch();
        Ok(session.info(id))
    }

    /// Ends the session, cancelling any stream still in flight.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        let mut session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found(id))?;
        session.cancel_in_flight();
        info!("Session {id} ended");
        Ok(())
    }

    pub async fn set_resume(&self, id: Uuid, text: String) -> Result<SessionInfo, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = lookup(&mut sessions, id)?;
        session.resume.set(text);
        session.touch();
        Ok(session.info(id))
    }

    /// The session's resume text, or `""` if nothing was uploaded yet.
    pub async fn resume_text(&self, id: Uuid) -> Result<String, AppError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|s| s.resume.get())
            .ok_or_else(|| not_found(id))
    }

    /// Starts a chat turn: cancels the previous turn's stream and hands out a fresh token.
    pub async fn begin_turn(&self, id: Uuid) -> Result<TurnContext, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = lookup(&mut sessions, id)?;
        if session.in_flight.is_some() {
            debug!("Session {id}: new message supersedes the stream in flight");
        }
        session.cancel_in_flight();
        session.touch();

        let turn = TurnContext {
            id: Uuid::new_v4(),
            resume_text: session.resume.get(),
            cancel: CancellationToken::new(),
        };
        session.in_flight = Some(InFlightTurn {
            id: turn.id,
            cancel: turn.cancel.clone(),
        });
        Ok(turn)
    }

    /// Marks turn `turn_id` as finished. A no-op if a newer turn replaced it
    /// or the session is gone.
    pub async fn end_turn(&self, id: Uuid, turn_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&id) {
            if session.in_flight.as_ref().is_some_and(|t| t.id == turn_id) {
                session.in_flight = None;
                debug!("Session {id}: turn {turn_id} finished");
            }
        }
    }

    /// Drops sessions idle for at least `ttl`. Returns how many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.last_seen.elapsed() < ttl;
            if !keep {
                session.cancel_in_flight();
                debug!("Session {id} expired");
            }
            keep
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Periodically sweeps idle sessions until the runtime shuts down.
    pub fn spawn_sweeper(&self, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_idle(ttl).await;
                if removed > 0 {
                    info!("Expired {removed} idle session(s)");
                }
            }
        })
    }
}

fn lookup(sessions: &mut HashMap<Uuid, Session>, id: Uuid) -> Result<&mut Session, AppError> {
    sessions.get_mut(&id).ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}
