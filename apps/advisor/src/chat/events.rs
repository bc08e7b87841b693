//! Maps accumulated prefixes onto SSE events for the chat tab.
//!
//! Events: `message` with `{"text": prefix}` per prefix, `done` with the final
//! text, or `error` with the interruption details. A cancelled turn simply stops.

use std::convert::Infallible;
use std::pin::Pin;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chat::accumulator::StreamInterrupted;

pub type PrefixStream = Pin<Box<dyn Stream<Item = Result<String, StreamInterrupted>> + Send>>;
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub const MESSAGE_EVENT: &str = "message";
pub const DONE_EVENT: &str = "done";
pub const ERROR_EVENT: &str = "error";

struct TurnState {
    prefixes: PrefixStream,
    cancel: CancellationToken,
    latest: String,
}

fn text_event(name: &str, text: &str) -> Event {
    Event::default()
        .event(name)
        .data(json!({ "text": text }).to_string())
}

fn error_event(interrupted: &StreamInterrupted) -> Event {
    Event::default().event(ERROR_EVENT).data(
        json!({
            "code": "STREAM_INTERRUPTED",
            "message": interrupted.to_string(),
            "partial": interrupted.partial,
        })
        .to_string(),
    )
}

/// Streams one chat turn to the browser.
///
/// Stops without a final event once `cancel` fires; the partial text is discarded.
pub fn prefix_events(prefixes: PrefixStream, cancel: CancellationToken) -> EventStream {
    let initial = TurnState {
        prefixes,
        cancel,
        latest: String::new(),
    };

    let events = stream::unfold(Some(initial), |state| async move {
        let mut state = state?;
        tokio::select! {
            biased;
            _ = state.cancel.cancelled() => {
                debug!("Chat turn cancelled after {} chars", state.latest.len());
                None
            }
            next = state.prefixes.next() => {
                match next {
                    Some(Ok(prefix)) => {
                        let event = text_event(MESSAGE_EVENT, &prefix);
                        state.latest = prefix;
                        Some((event, Some(state)))
                    }
                    Some(Err(interrupted)) => {
                        warn!("Chat turn interrupted: {interrupted}");
                        Some((error_event(&interrupted), None))
                    }
                    None => Some((text_event(DONE_EVENT, &state.latest), None)),
                }
            }
        }
    });

    Box::pin(events.map(Ok::<Event, Infallible>))
}
