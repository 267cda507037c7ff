#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Best-effort AI summaries of report text.
//!
//! Providers are Anthropic, AWS Bedrock (behind the `bedrock` feature) and
//! anything speaking the `OpenAI` chat completions API, including local
//! servers reached through `AI_BASE_URL`. A reply that is not valid JSON
//! still becomes a summary-only analysis; a failed request yields none.

pub mod providers;
pub mod summarize;

pub use providers::{LlmProvider, ProviderKind, create_provider_from_env};
pub use summarize::{DialogLiveness, parse_analysis, summarize, summarize_for_dialog};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// The request never got a usable HTTP response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A reply body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with an error or an unusable reply.
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// Missing or unknown provider settings.
    #[error("Configuration error: {message}")]
    Config { message: String },
}
