//! Core data models shared by the service, the HTTP surface, and the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata attached to a stored record.
pub type Metadata = Map<String, Value>;

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry in a session's chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "default".to_string()
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: default_user_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /add_knowledge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRequest {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl KnowledgeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub message: String,
}

/// Error body returned with every non-200 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// A piece of text accepted for future retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeItem {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A record as written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Metadata,
}

/// A nearest-neighbour hit, ordered by descending `score`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMatch {
    pub id: String,
    /// The stored `text` metadata field, if the record carries one.
    pub text: Option<String>,
    pub score: f32,
    pub metadata: Metadata,
}

impl RetrievalMatch {
    /// Builds a match from raw record metadata, lifting out the `text` field.
    pub fn from_metadata(id: impl Into<String>, score: f32, metadata: Metadata) -> Self {
        let text = metadata
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            id: id.into(),
            text,
            score,
            metadata,
        }
    }
}
