//! Completion Service client.
//!
//! [`CompletionClient`] is the seam the chat service talks to. The shipped
//! implementation, [`OpenAICompatClient`], speaks the OpenAI Chat Completions
//! wire format, which Groq serves at `https://api.groq.com/openai/v1`.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::models::Role;

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generates a completion for `messages` with `model` and returns its text
    /// untrimmed.
    async fn complete(&self, messages: &[PromptMessage], model: &str) -> Result<String>;
}

/// Client for OpenAI-compatible `POST {base_url}/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAICompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAICompatClient {
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAICompatClient {
    async fn complete(&self, messages: &[PromptMessage], model: &str) -> Result<String> {
        let body = ChatCompletionRequest { model, messages };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("Completion API request failed: {err}"))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            bail!(
                "Completion API error {}: {}",
                status,
                error_message(&body_text)
            );
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| anyhow::anyhow!("Failed to parse completion response: {err}"))?;

        extract_text_response(parsed)
    }
}

/// Builds the completion client from config, or `None` without a credential.
pub fn create_completion_client(
    config: &CompletionConfig,
) -> Result<Option<Box<dyn CompletionClient>>> {
    match config.api_key() {
        Some(api_key) => Ok(Some(Box::new(OpenAICompatClient::new(config, api_key)?))),
        None => Ok(None),
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("Completion API returned no content in the response"))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string())
}
