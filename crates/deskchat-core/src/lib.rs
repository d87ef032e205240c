//! Deskchat core domain library.
//!
//! The mention-aware chat pipeline for support desks: the `@` mention
//! grammar and dual-buffer draft model, stale-safe entity search, chat
//! sessions with ordered transcripts, and the streaming consumer that turns
//! a chunked completion response into a live-updating assistant message.
//!
//! All I/O lives behind traits (`EntitySearch`, `SessionRepository`,
//! `MessageRepository`, `CompletionClient`); concrete adapters are provided
//! by `deskchat-infrastructure`.

pub mod error;
pub mod mention;
pub mod search;
pub mod session;

// Re-export common error type
pub use error::DeskchatError;
