//! LLM provider abstraction and implementations.
//!
//! Anthropic, `OpenAI`-compatible servers and AWS Bedrock sit behind the
//! single-turn [`LlmProvider`] trait. Summaries never need tools or
//! multi-turn history, so the trait is text in, text out.

pub mod anthropic;
#[cfg(feature = "bedrock")]
pub mod bedrock;
pub mod openai;

use serde::Deserialize;

use crate::AiError;

/// Upper bound on generated tokens for a single completion.
pub const MAX_TOKENS: u32 = 1024;

/// Trait for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a single-turn completion request and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or the provider reports
    /// an error.
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError>;
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    /// `OpenAI` or any server speaking its chat completions API.
    OpenAi,
    Bedrock,
}

impl ProviderKind {
    /// Parses an `AI_PROVIDER` value.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" | "gpt" | "local" => Some(Self::OpenAi),
            "bedrock" | "aws" => Some(Self::Bedrock),
            _ => None,
        }
    }

    /// Picks a backend from whichever credentials are present.
    ///
    /// A Bedrock bearer token wins, then an Anthropic key, then an
    /// `OpenAI` key or base URL, then any ambient AWS credentials.
    #[must_use]
    pub fn detect(is_set: impl Fn(&str) -> bool) -> Option<Self> {
        if is_set("AWS_BEARER_TOKEN_BEDROCK") {
            Some(Self::Bedrock)
        } else if is_set("ANTHROPIC_API_KEY") {
            Some(Self::Anthropic)
        } else if is_set("OPENAI_API_KEY") || is_set("AI_BASE_URL") {
            Some(Self::OpenAi)
        } else if [
            "AWS_ACCESS_KEY_ID",
            "AWS_PROFILE",
            "AWS_ROLE_ARN",
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
        ]
        .into_iter()
        .any(&is_set)
        {
            Some(Self::Bedrock)
        } else {
            None
        }
    }
}

/// Creates the provider selected by `AI_PROVIDER`, or auto-detected from
/// the credentials in the environment.
///
/// # Errors
///
/// Returns [`AiError::Config`] if the provider name is unknown, nothing
/// could be detected, or the chosen provider is missing its settings.
#[allow(clippy::unused_async)] // async is needed when bedrock feature is enabled
pub async fn create_provider_from_env() -> Result<Box<dyn LlmProvider>, AiError> {
    let kind = match std::env::var("AI_PROVIDER") {
        Ok(name) => ProviderKind::parse(&name).ok_or_else(|| AiError::Config {
            message: format!("Unknown AI provider: {name}. Use anthropic, openai or bedrock."),
        })?,
        Err(_) => ProviderKind::detect(|key| std::env::var(key).is_ok()).ok_or_else(|| {
            AiError::Config {
                message: "No AI credentials found. Set AI_PROVIDER, ANTHROPIC_API_KEY, \
                          OPENAI_API_KEY, AI_BASE_URL or AWS credentials."
                    .to_string(),
            }
        })?,
    };
    log::info!("Using AI provider {kind:?}");

    match kind {
        ProviderKind::Anthropic => Ok(Box::new(anthropic::AnthropicProvider::from_env()?)),
        ProviderKind::OpenAi => Ok(Box::new(openai::OpenAiProvider::from_env()?)),
        #[cfg(feature = "bedrock")]
        ProviderKind::Bedrock => Ok(Box::new(bedrock::BedrockProvider::from_env().await)),
        #[cfg(not(feature = "bedrock"))]
        ProviderKind::Bedrock => Err(AiError::Config {
            message: "Bedrock support not compiled. Rebuild with --features bedrock".to_string(),
        }),
    }
}

fn model_from_env(default: &str) -> String {
    std::env::var("AI_MODEL").unwrap_or_else(|_| default.to_string())
}

/// `{"error": {"message": ...}}`, shared by the Anthropic and `OpenAI` APIs.
#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turns a non-success HTTP reply into a provider error, preferring the
/// API's own message.
fn http_error(status: reqwest::StatusCode, body: &str) -> AiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message);
    AiError::Provider { message }
}
