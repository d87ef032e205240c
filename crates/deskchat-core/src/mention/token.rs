//! Mention token encoding and storage-form scanning.
//!
//! A mention is persisted inline in message content as `@kind:id:name`.
//! The display form shows only `@name`. Scanning works on the storage form:
//! the transcript renders from what was actually persisted, never from the
//! editable display buffer.

use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// Storage-form mention span pattern: `@kind:id:name`.
///
/// The name capture runs to the next whitespace. Display names containing
/// spaces ("Printer issue") scan as the first word plus trailing literal
/// text, which keeps the derived display string byte-identical to what the
/// composer produced; only the emphasised range is shorter. Exact tokens for
/// multi-word names come from the draft's tracked spans, not from scanning.
/// The kind capture is validated against [`EntityKind`] separately, so an
/// unknown tag falls back to literal text.
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-z]+):([^:\s]+):([^\s]+)").expect("mention pattern is valid"));

/// An inline reference to a domain entity embedded in chat text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionToken {
    /// The kind of entity referenced.
    pub kind: EntityKind,
    /// Identifier of the referenced entity (weak reference, never ownership).
    pub entity_id: String,
    /// Human-readable name shown in the display form.
    pub display_name: String,
}

impl MentionToken {
    pub fn new(
        kind: EntityKind,
        entity_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Storage-form encoding: `@kind:id:name`.
    pub fn encode(&self) -> String {
        format!("@{}:{}:{}", self.kind, self.entity_id, self.display_name)
    }

    /// Display-form encoding: `@name`.
    pub fn display(&self) -> String {
        format!("@{}", self.display_name)
    }

    /// Stable key for the mention metadata map (`kind:id`).
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.entity_id)
    }
}

/// A segment of storage-form message content, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSegment {
    /// Plain text, rendered as-is.
    Text(String),
    /// A decoded mention, rendered with emphasis as `@name`.
    Mention(MentionToken),
}

/// Splits storage-form content into literal text and mention segments.
///
/// A span only becomes a [`MessageSegment::Mention`] when its kind tag parses
/// into the closed [`EntityKind`] set. Hand-typed text that merely looks like
/// the encoding (`@word:word:word` with an unknown kind) stays literal text.
pub fn segment_storage_text(content: &str) -> Vec<MessageSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in MENTION_RE.captures_iter(content) {
        let whole = caps.get(0).expect("capture 0 always present");
        let Ok(kind) = EntityKind::from_str(&caps[1]) else {
            // Unknown kind tag: leave the span inside the surrounding text.
            continue;
        };

        if whole.start() > cursor {
            segments.push(MessageSegment::Text(
                content[cursor..whole.start()].to_string(),
            ));
        }
        segments.push(MessageSegment::Mention(MentionToken::new(
            kind,
            caps[2].to_string(),
            caps[3].to_string(),
        )));
        cursor = whole.end();
    }

    if cursor < content.len() {
        segments.push(MessageSegment::Text(content[cursor..].to_string()));
    }
    segments
}

/// Renders storage-form content as plain display text (`@name` for mentions).
pub fn storage_to_display(content: &str) -> String {
    segment_storage_text(content)
        .into_iter()
        .map(|segment| match segment {
            MessageSegment::Text(text) => text,
            MessageSegment::Mention(token) => token.display(),
        })
        .collect()
}

/// Extracts the mention metadata map (`kind:id` → token) from storage-form
/// content, for attaching to a completion request.
///
/// Scanner-level fallback for raw content; prefer the draft's tracked tokens
/// when composing, since those carry full multi-word display names.
pub fn extract_mentions(content: &str) -> HashMap<String, MentionToken> {
    segment_storage_text(content)
        .into_iter()
        .filter_map(|segment| match segment {
            MessageSegment::Mention(token) => Some((token.key(), token)),
            MessageSegment::Text(_) => None,
        })
        .collect()
}
