//! Streaming response consumer.
//!
//! Consumes a chunked completion response and materializes it as a
//! live-updating assistant message in the transcript. Chunks are applied in
//! strict arrival order; there is no reordering, deduplication, or retry.
//! A cancellation token and a per-chunk idle deadline bound how long the
//! message can stay "in progress".

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::transcript::Transcript;
use crate::error::{DeskchatError, Result};

/// A fallible stream of response text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Bounds on one streaming consumption.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Maximum wait for the next chunk before the stream counts as hung.
    pub idle_timeout: Duration,
    /// Cooperative cancellation for the whole stream.
    pub cancel: CancellationToken,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            cancel: CancellationToken::new(),
        }
    }
}

/// Drains `stream` into the in-progress message `message_id`.
///
/// Every chunk is concatenated onto the message content and reported to
/// `on_chunk` for live display. Whatever ends the stream (completion, error,
/// cancellation, idle timeout), the in-progress marker is cleared and any
/// partial content is left in place.
pub async fn consume_stream(
    transcript: &mut Transcript,
    message_id: &str,
    stream: ChunkStream,
    options: &StreamOptions,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<()> {
    let outcome = drain(transcript, message_id, stream, options, on_chunk).await;
    transcript.finish_streaming(message_id)?;
    outcome
}

async fn drain(
    transcript: &mut Transcript,
    message_id: &str,
    mut stream: ChunkStream,
    options: &StreamOptions,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<()> {
    loop {
        let next = tokio::select! {
            _ = options.cancel.cancelled() => {
                return Err(DeskchatError::stream("response stream cancelled"));
            }
            next = tokio::time::timeout(options.idle_timeout, stream.next()) => next,
        };
        match next {
            Err(_) => {
                return Err(DeskchatError::stream(format!(
                    "no chunk received within {:?}",
                    options.idle_timeout
                )));
            }
            Ok(None) => return Ok(()),
            Ok(Some(Err(err))) => return Err(err),
            Ok(Some(Ok(chunk))) => {
                transcript.append_chunk(message_id, &chunk)?;
                on_chunk(&chunk);
            }
        }
    }
}
