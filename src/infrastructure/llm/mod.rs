//! # LLM
//!
//! OpenAI-compatible chat completion client (Groq by default).

mod client;

pub use client::OpenAiClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured (set ai.api_key or ${0})")]
    MissingApiKey(String),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("no choices in response")]
    EmptyResponse,
}
