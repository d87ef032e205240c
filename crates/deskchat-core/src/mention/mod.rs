//! Mention domain module.
//!
//! Everything about `@`-mentions in chat text: the closed entity-kind set,
//! the inline token encoding, the caret-aware scanner for in-progress
//! mentions, and the dual-buffer draft model that keeps the storage and
//! display forms of a message consistent.
//!
//! # Module Structure
//!
//! - `entity`: closed entity-kind enumeration (`EntityKind`)
//! - `token`: inline encoding, storage-form scanning (`MentionToken`,
//!   `MessageSegment`)
//! - `tokenizer`: caret-aware active-region scan (`ActiveMention`)
//! - `draft`: dual-buffer draft model (`DraftBuffer`)

mod draft;
mod entity;
mod token;
mod tokenizer;

// Re-export public API
pub use draft::{DraftBuffer, MentionSpan};
pub use entity::EntityKind;
pub use token::{
    MentionToken, MessageSegment, extract_mentions, segment_storage_text, storage_to_display,
};
pub use tokenizer::{ActiveMention, active_mention};
