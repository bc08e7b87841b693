//! Decodes an OpenAI-compatible SSE body into text fragments.
//!
//! Each `data:` event is a `chat.completion.chunk`; `choices[0].delta.content`
//! is the fragment. `data: [DONE]` ends the stream. A chunk carrying an `error`
//! object, a transport error, or a close before completion is a stream error.
//! So is a gap between events longer than the idle timeout.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, trace};

use super::{FragmentStream, LlmError};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum ChunkOutcome {
    Fragment { text: String, finished: bool },
    Finished,
    Skip,
    Done,
}

fn extract_error_message(event_json: &Value) -> Option<String> {
    let error = event_json.get("error")?;
    if let Some(message) = error.get("message").and_then(|value| value.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("An error occurred during streaming".to_string())
}

fn parse_chunk(raw: &str) -> Result<ChunkOutcome, LlmError> {
    let raw = raw.trim();
    if raw == DONE_SENTINEL {
        return Ok(ChunkOutcome::Done);
    }
    if raw.is_empty() {
        return Ok(ChunkOutcome::Skip);
    }

    let event_json: Value = serde_json::from_str(raw)?;
    if let Some(message) = extract_error_message(&event_json) {
        return Err(LlmError::Stream(format!("endpoint reported: {message}")));
    }

    let chunk: ChatCompletionChunk = serde_json::from_value(event_json)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        // Usage-only or keepalive chunk.
        return Ok(ChunkOutcome::Skip);
    };

    let finished = choice.finish_reason.is_some();
    match choice.delta.content {
        Some(text) if !text.is_empty() => Ok(ChunkOutcome::Fragment { text, finished }),
        _ if finished => Ok(ChunkOutcome::Finished),
        _ => Ok(ChunkOutcome::Skip),
    }
}

/// Turns a raw SSE byte stream into a [`FragmentStream`].
///
/// Generic over the byte stream so tests can feed canned bodies.
pub fn decode_fragments<S, B, E>(body: S, idle_timeout: Duration) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<Ev> {
        events: Ev,
        finished: bool,
    }

    let initial = State {
        events: Box::pin(body.eventsource()),
        finished: false,
    };

    let fragments = stream::unfold(Some(initial), move |state| async move {
        let mut state = state?;
        loop {
            let next = match tokio::time::timeout(idle_timeout, state.events.next()).await {
                Ok(next) => next,
                Err(_) => {
                    error!("SSE stream stalled for {:?}", idle_timeout);
                    return Some((
                        Err(LlmError::Timeout(format!(
                            "no data from the endpoint for {idle_timeout:?}"
                        ))),
                        None,
                    ));
                }
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!("SSE stream error: {}", e);
                    return Some((Err(LlmError::Stream(e.to_string())), None));
                }
                // Some servers close right after the finish_reason chunk without [DONE].
                None if state.finished => return None,
                None => {
                    error!("SSE stream closed before response completed");
                    return Some((
                        Err(LlmError::Stream(
                            "stream closed before response completed".to_string(),
                        )),
                        None,
                    ));
                }
            };

            trace!("SSE data: {:?}", event.data);
            match parse_chunk(&event.data) {
                Ok(ChunkOutcome::Fragment { text, finished }) => {
                    state.finished |= finished;
                    trace!("Token: {:?}", text);
                    return Some((Ok(text), Some(state)));
                }
                Ok(ChunkOutcome::Finished) => state.finished = true,
                Ok(ChunkOutcome::Skip) => continue,
                Ok(ChunkOutcome::Done) => return None,
                Err(e) => {
                    error!("SSE chunk rejected: {}, data: {}", e, event.data);
                    return Some((Err(e), None));
                }
            }
        }
    });

    Box::pin(fragments)
}
