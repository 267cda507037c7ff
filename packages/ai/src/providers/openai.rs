//! `OpenAI`-compatible chat completions provider.
//!
//! Also used for self-hosted servers that speak the same API (Ollama,
//! vLLM, llama.cpp, LM Studio) by pointing `AI_BASE_URL` at them.

use serde::{Deserialize, Serialize};

use super::{LlmProvider, MAX_TOKENS, http_error, model_from_env};
use crate::AiError;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new provider.
    ///
    /// `api_key` may be `None` for local servers that do not check it.
    /// `base_url` defaults to [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn new(api_key: Option<String>, model: String, base_url: Option<String>) -> Self {
        let base_url = base_url.map_or_else(
            || DEFAULT_BASE_URL.to_string(),
            |url| url.trim_end_matches('/').to_string(),
        );
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Reads `OPENAI_API_KEY`, `AI_BASE_URL` and `AI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Config`] if neither an API key nor a custom base
    /// URL is set.
    pub fn from_env() -> Result<Self, AiError> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        let base_url = std::env::var("AI_BASE_URL").ok();
        if api_key.is_none() && base_url.is_none() {
            return Err(AiError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            });
        }
        Ok(Self::new(api_key, model_from_env(DEFAULT_MODEL), base_url))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Extracts the first choice's text from a chat completions reply.
fn reply_text(body: &str) -> Result<String, AiError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AiError::Provider {
            message: "No choices in OpenAI response".to_string(),
        })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }

        reply_text(&body)
    }
}
