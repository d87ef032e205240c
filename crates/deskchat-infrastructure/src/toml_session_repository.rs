//! TOML-based SessionRepository and MessageRepository implementation.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deskchat_core::error::{DeskchatError, Result};
use deskchat_core::session::{
    ChatMessage, ChatSession, MessageRepository, SessionRepository,
};

use crate::paths::DeskchatPaths;

/// Current on-disk format: one TOML file per session holding the session
/// record and its full ordered message list.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFileV1 {
    version: u32,
    session: ChatSession,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

const FILE_VERSION: u32 = 1;

/// A repository implementation for storing chat data in TOML files.
///
/// Stores each session as an individual TOML file in a sessions directory,
/// plus a marker file for the active session:
///
/// ```text
/// base_dir/
/// ├── sessions/
/// │   ├── session-id-1.toml
/// │   └── session-id-2.toml
/// └── active_session.txt
/// ```
///
/// Messages live inside their session file; `append` rewrites the file. That
/// is fine at support-chat scale and keeps a session and its transcript in
/// one place.
pub struct TomlSessionRepository {
    base_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a new `TomlSessionRepository` with the specified base
    /// directory, creating the directory structure if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let sessions_dir = base_dir.join("sessions");
        fs::create_dir_all(&sessions_dir).map_err(|e| {
            DeskchatError::data_access(format!(
                "failed to create sessions directory {sessions_dir:?}: {e}"
            ))
        })?;
        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (`~/.deskchat`).
    pub fn default_location() -> Result<Self> {
        Self::new(DeskchatPaths::base_dir()?)
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{session_id}.toml"))
    }

    fn active_file_path(&self) -> PathBuf {
        self.base_dir.join("active_session.txt")
    }

    fn load_file(&self, path: &Path) -> Result<SessionFileV1> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeskchatError::data_access(format!("failed to read session file {path:?}: {e}"))
        })?;
        let file: SessionFileV1 = toml::from_str(&content)?;
        Ok(file)
    }

    fn store_file(&self, file: &SessionFileV1) -> Result<()> {
        let path = self.session_file_path(&file.session.id);
        let content = toml::to_string_pretty(file)?;
        fs::write(&path, content).map_err(|e| {
            DeskchatError::data_access(format!("failed to write session file {path:?}: {e}"))
        })
    }

    fn load_session_file(&self, session_id: &str) -> Result<Option<SessionFileV1>> {
        let path = self.session_file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        self.load_file(&path).map(Some)
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self
            .load_session_file(session_id)?
            .map(|file| file.session))
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        // Keep existing messages when updating the session record.
        let messages = self
            .load_session_file(&session.id)?
            .map(|file| file.messages)
            .unwrap_or_default();
        self.store_file(&SessionFileV1 {
            version: FILE_VERSION,
            session: session.clone(),
            messages,
        })
    }

    async fn list_all(&self) -> Result<Vec<ChatSession>> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut sessions = Vec::new();

        let entries = fs::read_dir(&sessions_dir).map_err(|e| {
            DeskchatError::data_access(format!("failed to read sessions directory: {e}"))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                DeskchatError::data_access(format!("failed to read directory entry: {e}"))
            })?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }
            match self.load_file(&path) {
                Ok(file) => sessions.push(file.session),
                Err(e) => {
                    tracing::warn!("skipping unreadable session file {:?}: {}", path, e);
                }
            }
        }

        // Most recently updated first.
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn get_active_session_id(&self) -> Result<Option<String>> {
        let active_file = self.active_file_path();
        if !active_file.exists() {
            return Ok(None);
        }
        let session_id = fs::read_to_string(&active_file).map_err(|e| {
            DeskchatError::data_access(format!("failed to read active session ID: {e}"))
        })?;
        Ok(Some(session_id.trim().to_string()))
    }

    async fn set_active_session_id(&self, session_id: &str) -> Result<()> {
        fs::write(self.active_file_path(), session_id).map_err(|e| {
            DeskchatError::data_access(format!("failed to write active session ID: {e}"))
        })
    }
}

#[async_trait]
impl MessageRepository for TomlSessionRepository {
    async fn append(&self, message: &ChatMessage) -> Result<()> {
        let mut file = self
            .load_session_file(&message.session_id)?
            .ok_or_else(|| DeskchatError::not_found("session", &message.session_id))?;
        file.messages.push(message.clone());
        self.store_file(&file)
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = self
            .load_session_file(session_id)?
            .map(|file| file.messages)
            .unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskchat_core::mention::{EntityKind, MentionToken};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_test_session(id: &str) -> ChatSession {
        let mut session = ChatSession::new("sup-1", format!("Test Session {id}"));
        session.id = id.to_string();
        session
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        let session = create_test_session("test-session-1");
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id("test-session-1").await.unwrap();
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.title, session.title);
        assert_eq!(loaded.status, session.status);
    }

    #[tokio::test]
    async fn test_find_missing_session_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();
        assert!(repository.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_sorted_by_updated_at() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        let mut first = create_test_session("session-1");
        first.updated_at = "2026-01-01T00:00:01Z".to_string();
        let mut second = create_test_session("session-2");
        second.updated_at = "2026-01-01T00:00:02Z".to_string();
        repository.save(&first).await.unwrap();
        repository.save(&second).await.unwrap();

        let sessions = repository.list_all().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "session-2");
    }

    #[tokio::test]
    async fn test_append_and_list_messages() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        let session = create_test_session("s1");
        repository.save(&session).await.unwrap();

        let token = MentionToken::new(EntityKind::Ticket, "T1", "Printer issue");
        let mut mentions = HashMap::new();
        mentions.insert(token.key(), token.clone());
        let message = ChatMessage::user("s1", "see @ticket:T1:Printer issue", mentions);
        repository.append(&message).await.unwrap();

        let messages = repository.list_by_session("s1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "see @ticket:T1:Printer issue");
        let metadata = messages[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.mentions.get("ticket:T1"), Some(&token));
        // The streaming marker is client-side only and never persisted.
        assert!(!messages[0].streaming);
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_fails() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        let message = ChatMessage::user("ghost", "hello", HashMap::new());
        let err = repository.append(&message).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_saving_session_keeps_messages() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        let mut session = create_test_session("s1");
        repository.save(&session).await.unwrap();
        repository
            .append(&ChatMessage::user("s1", "hello", HashMap::new()))
            .await
            .unwrap();

        session.title = "renamed".to_string();
        repository.save(&session).await.unwrap();

        assert_eq!(repository.list_by_session("s1").await.unwrap().len(), 1);
        assert_eq!(
            repository.find_by_id("s1").await.unwrap().unwrap().title,
            "renamed"
        );
    }

    #[tokio::test]
    async fn test_active_session_id() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlSessionRepository::new(temp_dir.path()).unwrap();

        assert_eq!(repository.get_active_session_id().await.unwrap(), None);
        repository
            .set_active_session_id("active-session")
            .await
            .unwrap();
        assert_eq!(
            repository.get_active_session_id().await.unwrap(),
            Some("active-session".to_string())
        );
    }
}
