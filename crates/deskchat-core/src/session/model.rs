//! Chat session domain model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a chat session.
///
/// Sessions are never hard-deleted: every lifecycle operation is a status
/// transition, so a "deleted" session still exists in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
    Deleted,
}

/// A supporter's AI chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Identifier of the supporter who owns this session
    pub supporter_id: String,
    /// Human-readable session title
    pub title: String,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
}

impl ChatSession {
    /// Creates a fresh active session for the given supporter.
    pub fn new(supporter_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            supporter_id: supporter_id.into(),
            title: title.into(),
            status: SessionStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Bumps the updated-at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}
