//! Chat completion client trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::stream::ChunkStream;
use crate::error::Result;
use crate::mention::MentionToken;

/// One completion request, built from the storage form of the user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Storage-form message text (mention tokens encoded inline).
    pub message: String,
    /// Session the conversation belongs to.
    pub session_id: String,
    /// Supporter issuing the request.
    pub supporter_id: String,
    /// Mentions extracted from the message, keyed by `kind:id`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mentions: HashMap<String, MentionToken>,
}

/// Seam to the remote completion endpoint.
///
/// The response is a chunked text stream terminated by stream close; chunk
/// ordering is guaranteed by the transport.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ChunkStream>;
}
