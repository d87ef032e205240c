//! In-memory chat transcript.
//!
//! The transcript holds the full ordered message list for one open session.
//! All messages stay in memory; support-chat sessions are short, so there is
//! no pagination or windowing here.

use super::message::ChatMessage;
use crate::error::{DeskchatError, Result};

/// Ordered list of messages for one session.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transcript from persisted messages, sorting by creation
    /// timestamp regardless of the order the repository returned them in.
    pub fn load(mut messages: Vec<ChatMessage>) -> Self {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends an already-complete message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Appends an empty in-progress assistant message and returns its ID.
    pub fn begin_streaming(&mut self, session_id: &str) -> String {
        let placeholder = ChatMessage::ai_placeholder(session_id);
        let id = placeholder.id.clone();
        self.messages.push(placeholder);
        id
    }

    /// Appends a chunk to an in-progress message, strictly in arrival order.
    pub fn append_chunk(&mut self, message_id: &str, chunk: &str) -> Result<()> {
        let message = self.streaming_message_mut(message_id)?;
        message.content.push_str(chunk);
        Ok(())
    }

    /// Clears the in-progress marker; the message content is final after
    /// this, even if the stream ended early with partial content.
    pub fn finish_streaming(&mut self, message_id: &str) -> Result<&ChatMessage> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == message_id && m.streaming)
            .ok_or_else(|| DeskchatError::not_found("streaming message", message_id))?;
        self.messages[index].streaming = false;
        Ok(&self.messages[index])
    }

    fn streaming_message_mut(&mut self, message_id: &str) -> Result<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.id == message_id && m.streaming)
            .ok_or_else(|| DeskchatError::not_found("streaming message", message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::SenderKind;
    use std::collections::HashMap;

    fn message_at(session: &str, content: &str, created_at: &str) -> ChatMessage {
        let mut message = ChatMessage::user(session, content, HashMap::new());
        message.created_at = created_at.to_string();
        message
    }

    #[test]
    fn test_load_orders_by_timestamp() {
        // Repository returned the messages shuffled.
        let transcript = Transcript::load(vec![
            message_at("s1", "third", "2026-01-01T00:00:03Z"),
            message_at("s1", "first", "2026-01-01T00:00:01Z"),
            message_at("s1", "second", "2026-01-01T00:00:02Z"),
        ]);
        let contents: Vec<&str> = transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_streaming_appends_in_order() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_streaming("s1");

        for chunk in ["Hel", "lo, ", "world"] {
            transcript.append_chunk(&id, chunk).unwrap();
        }
        let message = transcript.finish_streaming(&id).unwrap();
        assert_eq!(message.content, "Hello, world");
        assert_eq!(message.sender, SenderKind::Ai);
        assert!(!message.streaming);
    }

    #[test]
    fn test_finished_message_rejects_further_chunks() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_streaming("s1");
        transcript.append_chunk(&id, "done").unwrap();
        transcript.finish_streaming(&id).unwrap();

        let err = transcript.append_chunk(&id, "late").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(transcript.messages()[0].content, "done");
    }

    #[test]
    fn test_append_chunk_unknown_id_fails() {
        let mut transcript = Transcript::new();
        assert!(transcript.append_chunk("nope", "x").is_err());
    }
}
