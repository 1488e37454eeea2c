//! Client-side chat sessions.
//!
//! A session is an append-only list of [`ChatTurn`]s keyed by a UUID.
//! [`SessionStore`] lives in the UI process only; ending a session drops its
//! history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ChatTurn;

#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, ChatSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new empty session and returns its id.
    pub fn create(&mut self) -> String {
        let session = ChatSession::new();
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Appends a turn. Returns `false` if the session does not exist.
    pub fn append(&mut self, session_id: &str, turn: ChatTurn) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.turns.push(turn);
                true
            }
            None => false,
        }
    }

    /// The session's turns in insertion order.
    pub fn read(&self, session_id: &str) -> Option<&[ChatTurn]> {
        self.sessions.get(session_id).map(|s| s.turns())
    }

    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.get(session_id)
    }

    /// Ends a session, discarding its history.
    pub fn end(&mut self, session_id: &str) -> Option<ChatSession> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
