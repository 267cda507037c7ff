//! AWS Bedrock provider over the Converse API.
//!
//! Credentials come from the standard AWS chain or from
//! `AWS_BEARER_TOKEN_BEDROCK`.

use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, InferenceConfiguration, Message,
    SystemContentBlock,
};

use super::{LlmProvider, MAX_TOKENS, model_from_env};
use crate::AiError;

const DEFAULT_MODEL: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

/// Bearer tokens carry no region, so one has to be assumed.
const BEARER_TOKEN_REGION: &str = "us-east-1";

pub struct BedrockProvider {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockProvider {
    /// Loads AWS configuration, overriding the region when one is given.
    pub async fn new(model_id: String, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let client = aws_sdk_bedrockruntime::Client::new(&loader.load().await);
        Self { client, model_id }
    }

    /// Builds a provider from `AI_MODEL` and the AWS region variables.
    pub async fn from_env() -> Self {
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .ok()
            .or_else(|| {
                std::env::var("AWS_BEARER_TOKEN_BEDROCK").ok().map(|_| {
                    log::info!("No AWS region set, assuming {BEARER_TOKEN_REGION} for Bedrock");
                    BEARER_TOKEN_REGION.to_string()
                })
            });
        Self::new(model_from_env(DEFAULT_MODEL), region).await
    }
}

fn provider_error(message: impl Into<String>) -> AiError {
    AiError::Provider {
        message: message.into(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for BedrockProvider {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String, AiError> {
        let turn = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.to_string()))
            .build()
            .map_err(|e| provider_error(format!("Invalid Bedrock message: {e}")))?;

        let limits = InferenceConfiguration::builder()
            .max_tokens(i32::try_from(MAX_TOKENS).unwrap_or(i32::MAX))
            .build();

        let response = self
            .client
            .converse()
            .model_id(&self.model_id)
            .system(SystemContentBlock::Text(system_prompt.to_string()))
            .messages(turn)
            .inference_config(limits)
            .send()
            .await
            .map_err(|e| provider_error(format!("Bedrock request failed: {e}")))?;

        match response.output() {
            Some(ConverseOutput::Message(reply)) => Ok(reply
                .content()
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()),
            Some(_) => Err(provider_error("Unexpected Bedrock output variant")),
            None => Err(provider_error("No output in Bedrock response")),
        }
    }
}
