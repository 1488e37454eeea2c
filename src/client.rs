//! HTTP client for the chat service, used by the terminal UI.
//!
//! Calls never fail from the caller's point of view: each outcome carries the
//! text the UI should show, including the local fallbacks for a rejected or
//! unreachable backend.

use std::time::Duration;

use anyhow::Result;

use crate::models::{ChatRequest, ChatResponse, KnowledgeRequest};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

pub const REQUEST_FAILED: &str = "Sorry, I couldn't process your request.";
pub const BACKEND_UNREACHABLE: &str = "Error connecting to backend. Make sure it's running.";

pub const KNOWLEDGE_ADDED_NOTICE: &str = "Knowledge added successfully!";
pub const KNOWLEDGE_FAILED_NOTICE: &str = "Failed to add knowledge.";
pub const KNOWLEDGE_UNREACHABLE_NOTICE: &str = "Error connecting to backend.";
pub const KNOWLEDGE_EMPTY_NOTICE: &str = "Please enter some text.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Reply(String),
    /// The backend answered with a non-200 status.
    Rejected(u16),
    /// The request never completed.
    Unreachable(String),
}

impl ChatOutcome {
    /// Text rendered as the assistant turn.
    pub fn text(&self) -> &str {
        match self {
            ChatOutcome::Reply(text) => text,
            ChatOutcome::Rejected(_) => REQUEST_FAILED,
            ChatOutcome::Unreachable(_) => BACKEND_UNREACHABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeOutcome {
    Added,
    Rejected(u16),
    Unreachable(String),
    /// Nothing was sent because the text was blank.
    Empty,
}

impl KnowledgeOutcome {
    pub fn notice(&self) -> &'static str {
        match self {
            KnowledgeOutcome::Added => KNOWLEDGE_ADDED_NOTICE,
            KnowledgeOutcome::Rejected(_) => KNOWLEDGE_FAILED_NOTICE,
            KnowledgeOutcome::Unreachable(_) => KNOWLEDGE_UNREACHABLE_NOTICE,
            KnowledgeOutcome::Empty => KNOWLEDGE_EMPTY_NOTICE,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn chat(&self, message: &str) -> ChatOutcome {
        let response = match self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&ChatRequest::new(message))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "chat request failed");
                return ChatOutcome::Unreachable(err.to_string());
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return ChatOutcome::Rejected(status.as_u16());
        }

        match response.json::<ChatResponse>().await {
            Ok(body) => ChatOutcome::Reply(body.response),
            Err(err) => ChatOutcome::Unreachable(err.to_string()),
        }
    }

    pub async fn add_knowledge(&self, text: &str) -> KnowledgeOutcome {
        if text.trim().is_empty() {
            return KnowledgeOutcome::Empty;
        }

        match self
            .client
            .post(format!("{}/add_knowledge", self.base_url))
            .json(&KnowledgeRequest::new(text))
            .send()
            .await
        {
            Ok(response) if response.status() == reqwest::StatusCode::OK => KnowledgeOutcome::Added,
            Ok(response) => KnowledgeOutcome::Rejected(response.status().as_u16()),
            Err(err) => {
                tracing::debug!(error = %err, "add_knowledge request failed");
                KnowledgeOutcome::Unreachable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_texts() {
        assert_eq!(ChatOutcome::Rejected(500).text(), REQUEST_FAILED);
        assert_eq!(
            ChatOutcome::Unreachable("refused".into()).text(),
            BACKEND_UNREACHABLE
        );
        assert_eq!(ChatOutcome::Reply("hi".into()).text(), "hi");
        assert_eq!(KnowledgeOutcome::Rejected(500).notice(), "Failed to add knowledge.");
    }

    #[tokio::test]
    async fn unreachable_backend() {
        let client = BackendClient::new("http://127.0.0.1:1/", 2).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
        assert!(matches!(client.chat("hi").await, ChatOutcome::Unreachable(_)));
        assert!(matches!(
            client.add_knowledge("fact").await,
            KnowledgeOutcome::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn blank_knowledge_is_not_sent() {
        let client = BackendClient::new("http://127.0.0.1:1", 2).unwrap();
        assert_eq!(client.add_knowledge("   ").await, KnowledgeOutcome::Empty);
    }
}
