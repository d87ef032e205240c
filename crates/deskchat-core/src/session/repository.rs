//! Session and message repository traits.
//!
//! These traits define the persistence seams, decoupling the pipeline from
//! the specific storage mechanism (TOML files, database, remote API).

use async_trait::async_trait;

use super::message::ChatMessage;
use super::model::ChatSession;
use crate::error::Result;

/// An abstract repository for chat session persistence.
///
/// There is deliberately no hard-delete operation: sessions only ever change
/// status, so "deleting" one is a `save` with `SessionStatus::Deleted`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ChatSession))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Saves a session (create or update).
    async fn save(&self, session: &ChatSession) -> Result<()>;

    /// Lists all stored sessions, most recently updated first.
    async fn list_all(&self) -> Result<Vec<ChatSession>>;

    /// Gets the ID of the currently active session, if any.
    async fn get_active_session_id(&self) -> Result<Option<String>>;

    /// Sets the ID of the currently active session.
    async fn set_active_session_id(&self, session_id: &str) -> Result<()>;
}

/// An append-only repository for chat messages.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Appends one message. Messages are immutable once persisted; there is
    /// no update or delete.
    async fn append(&self, message: &ChatMessage) -> Result<()>;

    /// Lists all messages of a session ordered by creation timestamp.
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}
