//! Chat session domain module.
//!
//! Sessions, messages, the in-memory transcript, the streaming response
//! consumer, and the `ChatManager` that orchestrates the send flow.
//!
//! # Module Structure
//!
//! - `model`: session entity (`ChatSession`, `SessionStatus`)
//! - `message`: message types (`ChatMessage`, `SenderKind`, metadata)
//! - `transcript`: ordered in-memory message list (`Transcript`)
//! - `stream`: chunked response consumer (`ChunkStream`, `consume_stream`)
//! - `completion`: completion endpoint seam (`CompletionClient`)
//! - `repository`: persistence traits (`SessionRepository`, `MessageRepository`)
//! - `manager`: lifecycle + send-flow orchestration (`ChatManager`)

mod completion;
mod manager;
mod message;
mod model;
mod repository;
mod stream;
mod transcript;

// Re-export public API
pub use completion::{CompletionClient, CompletionRequest};
pub use manager::{ChatManager, SupporterContext};
pub use message::{ChatMessage, MessageMetadata, SenderKind};
pub use model::{ChatSession, SessionStatus};
pub use repository::{MessageRepository, SessionRepository};
pub use stream::{ChunkStream, StreamOptions, consume_stream};
pub use transcript::Transcript;
