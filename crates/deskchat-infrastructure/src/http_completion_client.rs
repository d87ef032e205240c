//! HTTP-backed chat completion client.
//!
//! Posts the storage-form message with its mention metadata and exposes the
//! chunked response body as a text [`ChunkStream`]. The transport delivers
//! raw bytes, so a small carry buffer reassembles UTF-8 sequences split
//! across chunk boundaries.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;

use deskchat_core::error::{DeskchatError, Result};
use deskchat_core::mention::MentionToken;
use deskchat_core::session::{ChunkStream, CompletionClient, CompletionRequest};

/// Wire body for the completion endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionBody<'a> {
    message: &'a str,
    session_id: &'a str,
    supporter_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<CompletionMetadata>,
}

#[derive(Debug, Serialize)]
struct CompletionMetadata {
    mentions: HashMap<String, MentionWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MentionWire {
    entity_id: String,
    entity_type: String,
    display_name: String,
}

impl From<&MentionToken> for MentionWire {
    fn from(token: &MentionToken) -> Self {
        Self {
            entity_id: token.entity_id.clone(),
            entity_type: token.kind.to_string(),
            display_name: token.display_name.clone(),
        }
    }
}

/// Reassembles UTF-8 text from byte chunks that may split a character.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Appends `bytes` and returns the longest decodable prefix. Bytes of an
    /// incomplete trailing sequence are carried into the next call.
    fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(err) => {
                return Err(DeskchatError::stream(format!(
                    "response stream is not valid UTF-8: {err}"
                )));
            }
        };
        let rest = self.pending.split_off(valid);
        let head = std::mem::replace(&mut self.pending, rest);
        String::from_utf8(head)
            .map_err(|e| DeskchatError::stream(format!("response stream is not valid UTF-8: {e}")))
    }
}

/// Adapts a byte stream into a text [`ChunkStream`].
fn decode_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut carry = Utf8Carry::default();
    let text = bytes
        .map(move |item| match item {
            Ok(bytes) => carry.decode(bytes.as_ref()),
            Err(err) => Err(DeskchatError::stream(format!("stream read error: {err}"))),
        })
        .filter(|item| {
            // Drop the empty strings produced while a character is split.
            let keep = !matches!(item, Ok(text) if text.is_empty());
            futures::future::ready(keep)
        });
    Box::pin(text)
}

/// [`CompletionClient`] implementation backed by the remote chat endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let metadata = if request.mentions.is_empty() {
            None
        } else {
            Some(CompletionMetadata {
                mentions: request
                    .mentions
                    .iter()
                    .map(|(key, token)| (key.clone(), MentionWire::from(token)))
                    .collect(),
            })
        };
        let body = CompletionBody {
            message: &request.message,
            session_id: &request.session_id,
            supporter_id: &request.supporter_id,
            metadata,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeskchatError::stream(format!("completion request failed: {e}")))?
            .error_for_status()
            .map_err(|e| DeskchatError::stream(format!("completion request rejected: {e}")))?;
        Ok(decode_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskchat_core::mention::EntityKind;
    use futures::stream;

    type ByteResult = std::result::Result<Vec<u8>, String>;

    #[tokio::test]
    async fn test_decode_stream_concatenates_chunks() {
        let items: Vec<ByteResult> =
            vec![Ok(b"Hel".to_vec()), Ok(b"lo, ".to_vec()), Ok(b"world".to_vec())];
        let mut stream = decode_stream(stream::iter(items));

        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&chunk.unwrap());
        }
        assert_eq!(collected, "Hello, world");
    }

    #[tokio::test]
    async fn test_decode_stream_rejoins_split_utf8() {
        // "é" (0xC3 0xA9) split across two transport chunks.
        let items: Vec<ByteResult> = vec![Ok(vec![b'h', 0xC3]), Ok(vec![0xA9, b'!'])];
        let mut stream = decode_stream(stream::iter(items));

        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&chunk.unwrap());
        }
        assert_eq!(collected, "hé!");
    }

    #[tokio::test]
    async fn test_decode_stream_surfaces_invalid_utf8() {
        let items: Vec<ByteResult> = vec![Ok(vec![0xFF, 0xFE])];
        let mut stream = decode_stream(stream::iter(items));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_stream());
    }

    #[tokio::test]
    async fn test_decode_stream_surfaces_transport_errors() {
        let items: Vec<ByteResult> = vec![Err("connection reset".to_string())];
        let mut stream = decode_stream(stream::iter(items));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_stream());
    }

    #[test]
    fn test_body_serializes_to_wire_shape() {
        let token = MentionToken::new(EntityKind::Ticket, "T1", "Printer issue");
        let mut mentions = HashMap::new();
        mentions.insert(token.key(), MentionWire::from(&token));

        let body = CompletionBody {
            message: "see @ticket:T1:Printer issue",
            session_id: "s1",
            supporter_id: "sup-1",
            metadata: Some(CompletionMetadata { mentions }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["supporterId"], "sup-1");
        let mention = &value["metadata"]["mentions"]["ticket:T1"];
        assert_eq!(mention["entityId"], "T1");
        assert_eq!(mention["entityType"], "ticket");
        assert_eq!(mention["displayName"], "Printer issue");
    }
}
