//! Anthropic Messages API provider.

use serde::{Deserialize, Serialize};

use super::{LlmProvider, MAX_TOKENS, http_error, model_from_env};
use crate::AiError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Reads `ANTHROPIC_API_KEY` and the optional `AI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Config`] if the API key is not set.
    pub fn from_env() -> Result<Self, AiError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| AiError::Config {
            message: "ANTHROPIC_API_KEY environment variable not set".to_string(),
        })?;
        Ok(Self::new(api_key, model_from_env(DEFAULT_MODEL)))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
}

#[derive(Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Concatenates the text blocks of a Messages API reply.
fn reply_text(body: &str) -> Result<String, AiError> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    Ok(response
        .content
        .into_iter()
        .filter_map(|block| match block {
            Block::Text { text } => Some(text),
            Block::Other => None,
        })
        .collect())
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: system_prompt,
            messages: [UserTurn {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }

        reply_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let body = r#"{"content":[
            {"type":"text","text":"{\"summary\":"},
            {"type":"thinking","thinking":"..."},
            {"type":"text","text":"\"ok\"}"}
        ]}"#;
        assert_eq!(reply_text(body).unwrap(), r#"{"summary":"ok"}"#);
    }

    #[test]
    fn malformed_reply_is_a_json_error() {
        assert!(matches!(reply_text("not json"), Err(AiError::Json(_))));
    }
}
