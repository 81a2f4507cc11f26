//! Session and conversation types.
//!
//! A `Session` is one end-to-end research request. Its history is an ordered,
//! append-only sequence of turns owned by the orchestrator task for that
//! session — nothing else writes to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a session's conversation history. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    AwaitingClarification,
    Done,
    Failed,
}

/// One research request: id, original query, and accumulated conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub query: String,
    pub history: Vec<Turn>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create a session seeded with a single user turn carrying the query.
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            session_id: session_id.into(),
            history: vec![Turn::user(query.clone())],
            query,
            status: SessionStatus::Running,
            started_at: Utc::now(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(Turn::assistant(content));
    }

    /// Render the conversation as markdown, used for the reflection pass and
    /// the persisted transcript.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for turn in &self.history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            out.push_str(&format!("### {}\n\n{}\n\n", role, turn.content));
        }
        out
    }
}
