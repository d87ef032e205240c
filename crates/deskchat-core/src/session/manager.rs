//! Chat session lifecycle and send-flow orchestration.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::completion::{CompletionClient, CompletionRequest};
use super::message::ChatMessage;
use super::model::{ChatSession, SessionStatus};
use super::repository::{MessageRepository, SessionRepository};
use super::stream::{StreamOptions, consume_stream};
use super::transcript::Transcript;
use crate::error::{DeskchatError, Result};
use crate::mention::DraftBuffer;

/// The supporter currently using the chat window.
///
/// Passed in explicitly at construction; nothing in the pipeline reads
/// ambient user state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupporterContext {
    pub supporter_id: String,
    pub display_name: String,
}

impl SupporterContext {
    pub fn new(supporter_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            supporter_id: supporter_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Manages chat sessions and runs the send/stream flow.
///
/// `ChatManager` is responsible for:
/// - Creating sessions and transitioning their status (never hard-deleting)
/// - Loading a session's transcript in creation order
/// - The send flow: persist the user message, request a completion, stream
///   the reply into a placeholder, persist the finished assistant message
/// - Keeping at most one response stream in flight at a time
pub struct ChatManager {
    supporter: SupporterContext,
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
    completions: Arc<dyn CompletionClient>,
    idle_timeout: Duration,
    /// Cancellation token of the stream currently in flight, if any.
    active_stream: Mutex<Option<CancellationToken>>,
}

/// Clears the in-flight marker when the send flow exits, on every path.
struct FlightGuard<'a>(&'a Mutex<Option<CancellationToken>>);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }
}

impl ChatManager {
    pub fn new(
        supporter: SupporterContext,
        sessions: Arc<dyn SessionRepository>,
        messages: Arc<dyn MessageRepository>,
        completions: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            supporter,
            sessions,
            messages,
            completions,
            idle_timeout: Duration::from_secs(30),
            active_stream: Mutex::new(None),
        }
    }

    /// Overrides the per-chunk idle deadline for response streams.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn supporter(&self) -> &SupporterContext {
        &self.supporter
    }

    /// Creates a new active session owned by the current supporter and marks
    /// it as the active one.
    pub async fn create_session(&self, title: &str) -> Result<ChatSession> {
        let session = ChatSession::new(&self.supporter.supporter_id, title);
        self.sessions.save(&session).await?;
        self.sessions.set_active_session_id(&session.id).await?;
        tracing::debug!(session_id = %session.id, "created chat session");
        Ok(session)
    }

    /// Loads a session and its transcript, and marks it active.
    pub async fn open_session(&self, session_id: &str) -> Result<(ChatSession, Transcript)> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| DeskchatError::not_found("session", session_id))?;
        let messages = self.messages.list_by_session(session_id).await?;
        self.sessions.set_active_session_id(session_id).await?;
        Ok((session, Transcript::load(messages)))
    }

    /// Lists sessions that have not been marked deleted, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let sessions = self.sessions.list_all().await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.status != SessionStatus::Deleted)
            .collect())
    }

    /// The session currently marked active, if any.
    pub async fn active_session(&self) -> Result<Option<ChatSession>> {
        match self.sessions.get_active_session_id().await? {
            Some(id) => self.sessions.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<ChatSession> {
        self.update_session(session_id, |session| {
            session.title = title.to_string();
        })
        .await
    }

    pub async fn archive_session(&self, session_id: &str) -> Result<ChatSession> {
        self.update_session(session_id, |session| {
            session.status = SessionStatus::Archived;
        })
        .await
    }

    /// Marks a session deleted. The record stays in storage; only the status
    /// changes.
    pub async fn mark_deleted(&self, session_id: &str) -> Result<ChatSession> {
        self.update_session(session_id, |session| {
            session.status = SessionStatus::Deleted;
        })
        .await
    }

    async fn update_session(
        &self,
        session_id: &str,
        mutate: impl FnOnce(&mut ChatSession),
    ) -> Result<ChatSession> {
        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| DeskchatError::not_found("session", session_id))?;
        mutate(&mut session);
        session.touch();
        self.sessions.save(&session).await?;
        Ok(session)
    }

    /// Whether a response stream is currently in flight.
    pub fn is_streaming(&self) -> bool {
        self.active_stream
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Cancels the in-flight response stream, if any.
    pub fn cancel(&self) {
        if let Ok(slot) = self.active_stream.lock() {
            if let Some(token) = slot.as_ref() {
                token.cancel();
            }
        }
    }

    /// Sends the draft and streams the assistant reply into the transcript.
    ///
    /// Ordering contract: the user message is persisted before the
    /// completion request is issued. If persistence fails, nothing is
    /// appended to the transcript and the draft should stay in the input.
    /// Chunks are reported to `on_chunk` as they arrive. The finished (or
    /// partial, on stream failure) assistant message is persisted before the
    /// error, if any, is returned.
    pub async fn send(
        &self,
        session: &ChatSession,
        transcript: &mut Transcript,
        draft: &DraftBuffer,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ChatMessage> {
        if draft.storage().trim().is_empty() {
            return Err(DeskchatError::internal("refusing to send an empty draft"));
        }

        let cancel = CancellationToken::new();
        {
            let mut slot = self
                .active_stream
                .lock()
                .map_err(|_| DeskchatError::internal("stream guard poisoned"))?;
            if slot.is_some() {
                return Err(DeskchatError::StreamInFlight);
            }
            *slot = Some(cancel.clone());
        }
        let _guard = FlightGuard(&self.active_stream);

        let user_message =
            ChatMessage::user(&session.id, draft.storage(), draft.mention_map());
        self.messages.append(&user_message).await?;
        transcript.push(user_message);

        let request = CompletionRequest {
            message: draft.storage().to_string(),
            session_id: session.id.clone(),
            supporter_id: self.supporter.supporter_id.clone(),
            mentions: draft.mention_map(),
        };
        let stream = self.completions.complete(request).await?;

        let placeholder_id = transcript.begin_streaming(&session.id);
        let options = StreamOptions {
            idle_timeout: self.idle_timeout,
            cancel,
        };
        let outcome =
            consume_stream(transcript, &placeholder_id, stream, &options, on_chunk).await;

        let reply = transcript
            .messages()
            .iter()
            .find(|m| m.id == placeholder_id)
            .cloned()
            .ok_or_else(|| DeskchatError::internal("placeholder vanished from transcript"))?;

        // Persist whatever arrived, partial or complete, so the stored
        // transcript matches what the supporter saw.
        if outcome.is_ok() || !reply.content.is_empty() {
            self.messages.append(&reply).await?;
        }
        outcome?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::mention::{DraftBuffer, EntityKind, MentionToken};
    use crate::session::message::SenderKind;
    use crate::session::stream::ChunkStream;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemorySessionRepository {
        sessions: Mutex<HashMap<String, ChatSession>>,
        active: Mutex<Option<String>>,
    }

    #[async_trait]
    impl SessionRepository for MemorySessionRepository {
        async fn find_by_id(&self, session_id: &str) -> Result<Option<ChatSession>> {
            Ok(self.sessions.lock().unwrap().get(session_id).cloned())
        }

        async fn save(&self, session: &ChatSession) -> Result<()> {
            self.sessions
                .lock()
                .unwrap()
                .insert(session.id.clone(), session.clone());
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<ChatSession>> {
            Ok(self.sessions.lock().unwrap().values().cloned().collect())
        }

        async fn get_active_session_id(&self) -> Result<Option<String>> {
            Ok(self.active.lock().unwrap().clone())
        }

        async fn set_active_session_id(&self, session_id: &str) -> Result<()> {
            *self.active.lock().unwrap() = Some(session_id.to_string());
            Ok(())
        }
    }

    /// Message repository that records call order into a shared log.
    #[derive(Default)]
    struct RecordingMessageRepository {
        log: Arc<Mutex<Vec<String>>>,
        stored: Mutex<Vec<ChatMessage>>,
        fail_appends: AtomicBool,
    }

    #[async_trait]
    impl MessageRepository for RecordingMessageRepository {
        async fn append(&self, message: &ChatMessage) -> Result<()> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(DeskchatError::data_access("disk full"));
            }
            let tag = match message.sender {
                SenderKind::User => "persist:user",
                SenderKind::Ai => "persist:ai",
            };
            self.log.lock().unwrap().push(tag.to_string());
            self.stored.lock().unwrap().push(message.clone());
            Ok(())
        }

        async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.session_id == session_id)
                .cloned()
                .collect())
        }
    }

    /// Completion client that yields scripted chunks and logs the call.
    struct ScriptedCompletion {
        log: Arc<Mutex<Vec<String>>>,
        chunks: Vec<String>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, _request: CompletionRequest) -> Result<ChunkStream> {
            self.log.lock().unwrap().push("complete".to_string());
            let items: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    /// Completion client whose stream hangs until cancelled.
    #[derive(Default)]
    struct HangingCompletion {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl CompletionClient for HangingCompletion {
        async fn complete(&self, _request: CompletionRequest) -> Result<ChunkStream> {
            self.started.notify_one();
            Ok(Box::pin(stream::pending::<Result<String>>()))
        }
    }

    fn manager_with(
        messages: Arc<RecordingMessageRepository>,
        completions: Arc<dyn CompletionClient>,
    ) -> (ChatManager, Arc<MemorySessionRepository>) {
        let sessions = Arc::new(MemorySessionRepository::default());
        let manager = ChatManager::new(
            SupporterContext::new("sup-1", "Ana"),
            sessions.clone(),
            messages,
            completions,
        );
        (manager, sessions)
    }

    fn draft_with_mention() -> DraftBuffer {
        let mut draft = DraftBuffer::new();
        let caret = draft.push_str("route @pri");
        draft
            .insert_mention(
                caret,
                &MentionToken::new(EntityKind::Ticket, "T1", "Printer issue"),
            )
            .unwrap();
        draft
    }

    #[tokio::test]
    async fn test_send_persists_user_message_before_completion() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let messages = Arc::new(RecordingMessageRepository {
            log: log.clone(),
            ..Default::default()
        });
        let completions = Arc::new(ScriptedCompletion {
            log: log.clone(),
            chunks: vec!["Sure, ".to_string(), "on it.".to_string()],
        });
        let (manager, _) = manager_with(messages.clone(), completions);

        let session = manager.create_session("triage").await.unwrap();
        let mut transcript = Transcript::new();
        let mut streamed = String::new();
        let reply = manager
            .send(&session, &mut transcript, &draft_with_mention(), &mut |c| {
                streamed.push_str(c)
            })
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["persist:user", "complete", "persist:ai"]
        );
        assert_eq!(reply.content, "Sure, on it.");
        assert_eq!(streamed, "Sure, on it.");
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.messages()[0].content,
            "route @ticket:T1:Printer issue"
        );
        assert!(!manager.is_streaming());

        // Mention metadata rode along with the persisted user message.
        let stored = messages.stored.lock().unwrap();
        let metadata = stored[0].metadata.as_ref().unwrap();
        assert_eq!(
            metadata.mentions.get("ticket:T1").unwrap().display_name,
            "Printer issue"
        );
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_transcript_untouched() {
        let messages = Arc::new(RecordingMessageRepository::default());
        messages.fail_appends.store(true, Ordering::SeqCst);
        let completions = Arc::new(ScriptedCompletion {
            log: Arc::new(Mutex::new(Vec::new())),
            chunks: vec![],
        });
        let (manager, _) = manager_with(messages, completions);

        let session = manager.create_session("triage").await.unwrap();
        let mut transcript = Transcript::new();
        let err = manager
            .send(&session, &mut transcript, &draft_with_mention(), &mut |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, DeskchatError::DataAccess(_)));
        assert!(transcript.is_empty());
        assert!(!manager.is_streaming());
    }

    #[tokio::test]
    async fn test_second_send_refused_while_streaming() {
        let completions = Arc::new(HangingCompletion::default());
        let started = completions.started.clone();
        let messages = Arc::new(RecordingMessageRepository::default());
        let (manager, _) = manager_with(messages, completions);
        let manager = Arc::new(manager);

        let session = manager.create_session("triage").await.unwrap();

        let first_manager = Arc::clone(&manager);
        let first_session = session.clone();
        let first = tokio::spawn(async move {
            let mut transcript = Transcript::new();
            first_manager
                .send(
                    &first_session,
                    &mut transcript,
                    &draft_with_mention(),
                    &mut |_| {},
                )
                .await
        });

        started.notified().await;
        assert!(manager.is_streaming());

        let mut transcript = Transcript::new();
        let err = manager
            .send(&session, &mut transcript, &draft_with_mention(), &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DeskchatError::StreamInFlight));

        manager.cancel();
        let first_err = first.await.unwrap().unwrap_err();
        assert!(first_err.is_stream());
        assert!(!manager.is_streaming());
    }

    #[tokio::test]
    async fn test_empty_draft_is_refused() {
        let messages = Arc::new(RecordingMessageRepository::default());
        let completions = Arc::new(ScriptedCompletion {
            log: Arc::new(Mutex::new(Vec::new())),
            chunks: vec![],
        });
        let (manager, _) = manager_with(messages, completions);

        let session = manager.create_session("triage").await.unwrap();
        let mut transcript = Transcript::new();
        let draft = DraftBuffer::new();
        assert!(
            manager
                .send(&session, &mut transcript, &draft, &mut |_| {})
                .await
                .is_err()
        );
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_never_remove_sessions() {
        let messages = Arc::new(RecordingMessageRepository::default());
        let completions = Arc::new(ScriptedCompletion {
            log: Arc::new(Mutex::new(Vec::new())),
            chunks: vec![],
        });
        let (manager, sessions) = manager_with(messages, completions);

        let session = manager.create_session("before").await.unwrap();
        let renamed = manager.rename_session(&session.id, "after").await.unwrap();
        assert_eq!(renamed.title, "after");

        let archived = manager.archive_session(&session.id).await.unwrap();
        assert_eq!(archived.status, SessionStatus::Archived);

        let deleted = manager.mark_deleted(&session.id).await.unwrap();
        assert_eq!(deleted.status, SessionStatus::Deleted);

        // Deleted sessions drop out of the listing but stay in storage.
        assert!(manager.list_sessions().await.unwrap().is_empty());
        assert!(
            sessions
                .find_by_id(&session.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_open_session_loads_transcript_in_order() {
        let messages = Arc::new(RecordingMessageRepository::default());
        let completions = Arc::new(ScriptedCompletion {
            log: Arc::new(Mutex::new(Vec::new())),
            chunks: vec![],
        });
        let (manager, _) = manager_with(messages.clone(), completions);
        let session = manager.create_session("triage").await.unwrap();

        // Store out of order; open_session must sort by creation timestamp.
        let mut early = ChatMessage::user(&session.id, "first", HashMap::new());
        early.created_at = "2026-01-01T00:00:01Z".to_string();
        let mut late = ChatMessage::user(&session.id, "second", HashMap::new());
        late.created_at = "2026-01-01T00:00:02Z".to_string();
        messages.append(&late).await.unwrap();
        messages.append(&early).await.unwrap();

        let (opened, transcript) = manager.open_session(&session.id).await.unwrap();
        assert_eq!(opened.id, session.id);
        let contents: Vec<&str> = transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_open_unknown_session_is_not_found() {
        let messages = Arc::new(RecordingMessageRepository::default());
        let completions = Arc::new(ScriptedCompletion {
            log: Arc::new(Mutex::new(Vec::new())),
            chunks: vec![],
        });
        let (manager, _) = manager_with(messages, completions);
        let err = manager.open_session("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
