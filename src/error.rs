//! Service error taxonomy and its HTTP mapping.
//!
//! Only [`ChatError::ServiceUnavailable`], [`ChatError::Store`], and
//! [`ChatError::InvalidInput`] ever reach a caller. The retrieval and
//! completion variants are produced on best-effort paths and consumed by the
//! chat fallback branches in [`crate::service`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A required client was not initialised at startup.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Embedding or upsert failed while ingesting knowledge.
    #[error("{0}")]
    Store(String),

    /// Context lookup failed during chat.
    #[error("retrieval failed: {0}")]
    RetrievalDegraded(String),

    /// The completion call failed during chat.
    #[error("completion failed: {0}")]
    CompletionDegraded(String),

    #[error("{0}")]
    InvalidInput(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
