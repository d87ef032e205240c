//! Dual-buffer draft model.
//!
//! A draft keeps two synchronized representations of the same logical
//! message: the storage form (stable `@kind:id:name` encodings, persisted and
//! sent to the agent) and the display form (human-readable `@name` labels,
//! shown in the editable input). Outside mention spans the two buffers are
//! character-identical; they diverge only inside spans, where the storage
//! side is longer.
//!
//! Inserted mentions are tracked as spans. An edit that touches a tracked
//! span deletes the whole mention from both buffers as a unit, so a mention
//! can never be half-edited into a corrupt encoding, and the caret scanner
//! never re-activates inside one.

use std::collections::HashMap;

use crate::error::{DeskchatError, Result};

use super::token::MentionToken;
use super::tokenizer::{self, ActiveMention};

/// A tracked mention span, with its byte range in each buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSpan {
    pub token: MentionToken,
    pub display_start: usize,
    pub display_end: usize,
    pub storage_start: usize,
    pub storage_end: usize,
}

/// The editable message draft: display form, storage form, tracked spans.
#[derive(Debug, Clone, Default)]
pub struct DraftBuffer {
    display: String,
    storage: String,
    spans: Vec<MentionSpan>,
}

impl DraftBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The display-form text (what the input field shows).
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The storage-form text (what gets persisted and sent).
    pub fn storage(&self) -> &str {
        &self.storage
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Tokens of all inserted mentions, in text order.
    pub fn mentions(&self) -> impl Iterator<Item = &MentionToken> {
        self.spans.iter().map(|span| &span.token)
    }

    /// Mention metadata map (`kind:id` → token) for the completion request.
    pub fn mention_map(&self) -> HashMap<String, MentionToken> {
        self.spans
            .iter()
            .map(|span| (span.token.key(), span.token.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.display.clear();
        self.storage.clear();
        self.spans.clear();
    }

    /// Scans for an active mention region under the caret.
    ///
    /// Delegates to the tokenizer, then suppresses matches whose `@` belongs
    /// to an already-inserted mention span.
    pub fn active_mention(&self, caret: usize) -> Option<ActiveMention> {
        let found = tokenizer::active_mention(&self.display, caret)?;
        if self
            .spans
            .iter()
            .any(|span| span.display_start <= found.start && found.start < span.display_end)
        {
            return None;
        }
        Some(found)
    }

    /// Inserts free-typed text at a display position; both buffers receive
    /// the identical edit. Returns the new caret position.
    ///
    /// Inserting inside a tracked mention span first deletes that mention as
    /// a unit, then inserts at the position where the span began.
    pub fn insert_str(&mut self, pos: usize, text: &str) -> Result<usize> {
        self.check_boundary(pos)?;
        let pos = match self.span_strictly_containing(pos) {
            Some(idx) => {
                let start = self.spans[idx].display_start;
                let end = self.spans[idx].display_end;
                self.delete_range(start, end)?;
                start
            }
            None => pos,
        };

        let storage_pos = self.display_to_storage(pos);
        self.display.insert_str(pos, text);
        self.storage.insert_str(storage_pos, text);
        let len = text.len();
        for span in &mut self.spans {
            if span.display_start >= pos {
                span.display_start += len;
                span.display_end += len;
                span.storage_start += len;
                span.storage_end += len;
            }
        }
        Ok(pos + len)
    }

    /// Appends free-typed text at the end of the draft.
    pub fn push_str(&mut self, text: &str) -> usize {
        let end = self.display.len();
        // Appending can never land inside a span.
        self.insert_str(end, text).unwrap_or(end)
    }

    /// Deletes a display-form byte range from both buffers.
    ///
    /// A range that intersects tracked mention spans is widened to cover each
    /// of them entirely, and those mentions are removed as units.
    pub fn delete_range(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end {
            return Err(DeskchatError::internal("delete range is inverted"));
        }
        self.check_boundary(start)?;
        self.check_boundary(end)?;

        let mut start = start;
        let mut end = end;
        loop {
            let mut changed = false;
            for span in &self.spans {
                if span.display_start < end && span.display_end > start {
                    if span.display_start < start {
                        start = span.display_start;
                        changed = true;
                    }
                    if span.display_end > end {
                        end = span.display_end;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let storage_start = self.display_to_storage(start);
        let storage_end = self.display_to_storage(end);
        self.spans
            .retain(|span| !(span.display_start < end && span.display_end > start));
        self.display.replace_range(start..end, "");
        self.storage.replace_range(storage_start..storage_end, "");

        let display_removed = end - start;
        let storage_removed = storage_end - storage_start;
        for span in &mut self.spans {
            if span.display_start >= end {
                span.display_start -= display_removed;
                span.display_end -= display_removed;
                span.storage_start -= storage_removed;
                span.storage_end -= storage_removed;
            }
        }
        Ok(())
    }

    /// Replaces the active mention region at `caret` with the chosen token.
    ///
    /// The region runs from the triggering `@` to the next whitespace (or end
    /// of text). The same logical span is replaced in both buffers: storage
    /// gets `@kind:id:name`, display gets `@name`. Returns the caret position
    /// just after the inserted display span.
    pub fn insert_mention(&mut self, caret: usize, token: &MentionToken) -> Result<usize> {
        let active = self
            .active_mention(caret)
            .ok_or_else(|| DeskchatError::internal("no active mention region at caret"))?;
        let start = active.start;

        let mut end = self.display[start..]
            .find(char::is_whitespace)
            .map(|rel| start + rel)
            .unwrap_or(self.display.len());
        // The region never swallows a following inserted mention.
        if let Some(span) = self.spans.iter().find(|span| span.display_start >= start) {
            end = end.min(span.display_start.max(start));
        }

        let storage_start = self.display_to_storage(start);
        let storage_end = self.display_to_storage(end);
        let display_text = token.display();
        let storage_text = token.encode();
        self.display.replace_range(start..end, &display_text);
        self.storage
            .replace_range(storage_start..storage_end, &storage_text);

        let display_delta = display_text.len() as isize - (end - start) as isize;
        let storage_delta = storage_text.len() as isize - (storage_end - storage_start) as isize;
        for span in &mut self.spans {
            if span.display_start >= end {
                span.display_start = (span.display_start as isize + display_delta) as usize;
                span.display_end = (span.display_end as isize + display_delta) as usize;
                span.storage_start = (span.storage_start as isize + storage_delta) as usize;
                span.storage_end = (span.storage_end as isize + storage_delta) as usize;
            }
        }

        let span = MentionSpan {
            token: token.clone(),
            display_start: start,
            display_end: start + display_text.len(),
            storage_start,
            storage_end: storage_start + storage_text.len(),
        };
        let insert_at = self
            .spans
            .iter()
            .position(|existing| existing.display_start > start)
            .unwrap_or(self.spans.len());
        self.spans.insert(insert_at, span);

        Ok(start + display_text.len())
    }

    /// Maps a display-form position outside any span to its storage-form
    /// position. Positions inside a span clamp to the span's storage start.
    fn display_to_storage(&self, pos: usize) -> usize {
        let mut delta = 0isize;
        for span in &self.spans {
            if span.display_end <= pos {
                delta += (span.storage_end - span.storage_start) as isize
                    - (span.display_end - span.display_start) as isize;
            } else if span.display_start < pos {
                // Inside a span: clamp.
                return span.storage_start;
            }
        }
        (pos as isize + delta) as usize
    }

    fn span_strictly_containing(&self, pos: usize) -> Option<usize> {
        self.spans
            .iter()
            .position(|span| span.display_start < pos && pos < span.display_end)
    }

    fn check_boundary(&self, pos: usize) -> Result<()> {
        if pos > self.display.len() || !self.display.is_char_boundary(pos) {
            return Err(DeskchatError::internal(format!(
                "position {pos} is not a char boundary of the draft"
            )));
        }
        Ok(())
    }
}
