//! Generation parameters exposed as tuning controls in the chat tab.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 1..=2048;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.1..=4.0;
pub const TOP_P_RANGE: RangeInclusive<f32> = 0.1..=1.0;

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Sampling parameters forwarded unmodified to the inference endpoint.
/// Only constructed through [`GenerationParams::new`], so a value in hand is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl GenerationParams {
    /// Validates each control against its range. NaN and infinities fail the range check.
    pub fn new(max_tokens: u32, temperature: f32, top_p: f32) -> Result<Self, AppError> {
        if !MAX_TOKENS_RANGE.contains(&max_tokens) {
            return Err(out_of_range("max_tokens", max_tokens, &MAX_TOKENS_RANGE));
        }
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(out_of_range("temperature", temperature, &TEMPERATURE_RANGE));
        }
        if !TOP_P_RANGE.contains(&top_p) {
            return Err(out_of_range("top_p", top_p, &TOP_P_RANGE));
        }
        Ok(Self {
            max_tokens,
            temperature,
            top_p,
        })
    }

    /// Fills missing controls with the defaults, then validates.
    pub fn from_optional(
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        top_p: Option<f32>,
    ) -> Result<Self, AppError> {
        Self::new(
            max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_p.unwrap_or(DEFAULT_TOP_P),
        )
    }
}

fn out_of_range<T: std::fmt::Display>(name: &str, value: T, range: &RangeInclusive<T>) -> AppError {
    AppError::InvalidParameter(format!(
        "{name} must be between {} and {}, got {value}",
        range.start(),
        range.end()
    ))
}

/// Control ranges and defaults, served to the UI so the sliders match the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSpec<T> {
    pub min: T,
    pub max: T,
    pub default: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDefaults {
    pub system_message: String,
    pub max_tokens: ControlSpec<u32>,
    pub temperature: ControlSpec<f32>,
    pub top_p: ControlSpec<f32>,
}

impl ChatDefaults {
    pub fn current() -> Self {
        Self {
            system_message: crate::chat::prompts::DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_tokens: ControlSpec {
                min: *MAX_TOKENS_RANGE.start(),
                max: *MAX_TOKENS_RANGE.end(),
                default: DEFAULT_MAX_TOKENS,
            },
            temperature: ControlSpec {
                min: *TEMPERATURE_RANGE.start(),
                max: *TEMPERATURE_RANGE.end(),
                default: DEFAULT_TEMPERATURE,
            },
            top_p: ControlSpec {
                min: *TOP_P_RANGE.start(),
                max: *TOP_P_RANGE.end(),
                default: DEFAULT_TOP_P,
            },
        }
    }
}
