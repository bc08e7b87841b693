//! Streaming response accumulator.
//!
//! Folds the fragments of a streaming completion into a running string and
//! yields every cumulative prefix. The chat endpoint forwards each prefix to the
//! browser; the one-shot advise endpoint only keeps the last one via [`collect`].

use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;

use crate::llm_client::LlmError;

/// The fragment stream failed before it finished. Carries the text received so far.
#[derive(Debug, Error)]
#[error("response stream interrupted: {source}")]
pub struct StreamInterrupted {
    pub partial: String,
    #[source]
    pub source: LlmError,
}

/// Yields the running concatenation after each fragment.
///
/// Every item extends the previous one by exactly one fragment. On a fragment
/// error a single `StreamInterrupted` is yielded and the stream ends.
pub fn accumulate<S>(fragments: S) -> impl Stream<Item = Result<String, StreamInterrupted>>
where
    S: Stream<Item = Result<String, LlmError>> + Unpin,
{
    stream::unfold(Some((fragments, String::new())), |state| async move {
        let (mut fragments, mut running) = state?;
        match fragments.next().await? {
            Ok(fragment) => {
                running.push_str(&fragment);
                Some((Ok(running.clone()), Some((fragments, running))))
            }
            Err(source) => Some((
                Err(StreamInterrupted {
                    partial: running,
                    source,
                }),
                None,
            )),
        }
    })
}

/// Drains [`accumulate`] and returns only the final string.
pub async fn collect<S>(fragments: S) -> Result<String, StreamInterrupted>
where
    S: Stream<Item = Result<String, LlmError>> + Unpin,
{
    let prefixes = accumulate(fragments);
    futures::pin_mut!(prefixes);

    let mut last = String::new();
    while let Some(prefix) = prefixes.next().await {
        last = prefix?;
    }
    Ok(last)
}
