use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/v1";
pub const DEFAULT_INFERENCE_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";

/// Application configuration loaded from environment variables.
/// Everything has a default except the optional `HF_TOKEN`.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub inference_base_url: String,
    pub inference_model: String,
    pub hf_token: Option<String>,
    /// How long opening a completion stream may take (until response headers).
    pub inference_timeout: Duration,
    /// Longest gap allowed between two events of an open stream.
    pub inference_idle_timeout: Duration,
    pub max_upload_bytes: usize,
    pub session_idle_ttl: Duration,
    pub session_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            inference_base_url: std::env::var("INFERENCE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_INFERENCE_BASE_URL.to_string()),
            inference_model: std::env::var("INFERENCE_MODEL")
                .unwrap_or_else(|_| DEFAULT_INFERENCE_MODEL.to_string()),
            hf_token: std::env::var("HF_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            inference_timeout: Duration::from_secs(parse_env("INFERENCE_TIMEOUT_SECS", 120)?),
            inference_idle_timeout: Duration::from_secs(parse_env(
                "INFERENCE_IDLE_TIMEOUT_SECS",
                60,
            )?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            session_idle_ttl: Duration::from_secs(parse_env("SESSION_IDLE_TTL_SECS", 3600)?),
            session_sweep_interval: Duration::from_secs(parse_env(
                "SESSION_SWEEP_INTERVAL_SECS",
                60,
            )?),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
