/// LLM Client: the single point of entry for all inference calls in the advisor.
///
/// ARCHITECTURAL RULE: No other module may call the inference endpoint directly.
/// Handlers depend on the `ChatBackend` trait; `LlmClient` is the production implementation.
///
/// Endpoint: any OpenAI-compatible `/chat/completions` (Hugging Face by default), always streamed.
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::messages::Message;
use crate::chat::params::GenerationParams;
use crate::config::Config;

pub mod stream;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The SSE stream broke, closed early, or carried an error payload.
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Incremental text fragments of one completion, in delivery order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Something that can stream a chat completion.
///
/// Carried in `AppState` as `Arc<dyn ChatBackend>` so handlers can be driven by a stub in tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens one streaming completion. Errors before the first fragment are returned here;
    /// errors after that arrive inside the stream.
    async fn stream_chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<FragmentStream, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

/// Hugging Face returns either `{"error": "text"}` or OpenAI-style `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Text(String),
    Object { message: String },
}

impl ApiErrorDetail {
    fn into_message(self) -> String {
        match self {
            ApiErrorDetail::Text(message) | ApiErrorDetail::Object { message } => message,
        }
    }
}

/// The inference client used by all chat flows.
/// Wraps the chat-completions API with retry logic on stream open.
///
/// There is no deadline on the whole request: a healthy generation may stream for
/// as long as it needs. Only opening the stream and the gap between events are bounded.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
    open_timeout: Duration,
    idle_timeout: Duration,
    retry_base: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.inference_base_url.trim_end_matches('/')
            ),
            model: config.inference_model.clone(),
            api_token: config.hf_token.clone(),
            open_timeout: config.inference_timeout,
            idle_timeout: config.inference_idle_timeout,
            retry_base: RETRY_BASE_DELAY,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the request and returns the response once the endpoint accepts it.
    /// Retries on transport errors, timeouts, 429 and 5xx with exponential backoff.
    async fn open_stream(
        &self,
        request_body: &ChatCompletionRequest<'_>,
    ) -> Result<reqwest::Response, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .header("accept", "text/event-stream")
                .json(request_body);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            let response = match tokio::time::timeout(self.open_timeout, request.send()).await {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
                Err(_) => {
                    last_error = Some(LlmError::Timeout(format!(
                        "no response within {:?}",
                        self.open_timeout
                    )));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.error.into_message())
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Delay before retry `attempt` (1-based): `base`, then `2 * base`, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt - 1))
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn stream_chat(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<FragmentStream, LlmError> {
        let request_body = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stream: true,
        };

        let response = self.open_stream(&request_body).await?;
        debug!(
            "LLM stream opened: model={}, messages={}, max_tokens={}",
            self.model,
            messages.len(),
            params.max_tokens
        );

        Ok(stream::decode_fragments(
            response.bytes_stream(),
            self.idle_timeout,
        ))
    }
}
