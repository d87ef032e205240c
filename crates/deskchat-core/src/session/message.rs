//! Chat message types.
//!
//! Messages are immutable once persisted and ordered by creation timestamp
//! within a session. Content is stored in storage form: mention tokens stay
//! encoded as `@kind:id:name`.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mention::MentionToken;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// The supporter typing in the chat window.
    User,
    /// The AI assistant.
    Ai,
}

/// Structured metadata attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Mentions embedded in the content, keyed by `kind:id`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mentions: HashMap<String, MentionToken>,
}

/// A single message in a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (UUID format)
    pub id: String,
    /// Parent session identifier
    pub session_id: String,
    /// Who sent the message
    pub sender: SenderKind,
    /// Storage-form content (mention tokens encoded inline)
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format)
    pub created_at: String,
    /// Optional structured metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// True while an assistant reply is still being streamed into this
    /// message. Client-side only, never persisted.
    #[serde(skip)]
    pub streaming: bool,
}

impl ChatMessage {
    /// Creates a user message in storage form with its mention metadata.
    pub fn user(
        session_id: impl Into<String>,
        content: impl Into<String>,
        mentions: HashMap<String, MentionToken>,
    ) -> Self {
        let metadata = if mentions.is_empty() {
            None
        } else {
            Some(MessageMetadata { mentions })
        };
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            sender: SenderKind::User,
            content: content.into(),
            created_at: Utc::now().to_rfc3339(),
            metadata,
            streaming: false,
        }
    }

    /// Creates an empty in-progress assistant message.
    pub fn ai_placeholder(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            sender: SenderKind::Ai,
            content: String::new(),
            created_at: Utc::now().to_rfc3339(),
            metadata: None,
            streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mention::{EntityKind, MentionToken};

    #[test]
    fn test_user_message_without_mentions_has_no_metadata() {
        let message = ChatMessage::user("s1", "hello", HashMap::new());
        assert_eq!(message.sender, SenderKind::User);
        assert!(message.metadata.is_none());
        assert!(!message.streaming);
    }

    #[test]
    fn test_user_message_carries_mentions() {
        let token = MentionToken::new(EntityKind::Ticket, "T1", "Printer issue");
        let mut mentions = HashMap::new();
        mentions.insert(token.key(), token.clone());

        let message = ChatMessage::user("s1", "see @ticket:T1:Printer issue", mentions);
        let metadata = message.metadata.unwrap();
        assert_eq!(metadata.mentions.get("ticket:T1"), Some(&token));
    }

    #[test]
    fn test_placeholder_is_streaming_and_empty() {
        let message = ChatMessage::ai_placeholder("s1");
        assert_eq!(message.sender, SenderKind::Ai);
        assert!(message.streaming);
        assert!(message.content.is_empty());
    }
}
