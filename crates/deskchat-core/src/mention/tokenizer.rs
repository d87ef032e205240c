//! Caret-aware scan for an in-progress mention.
//!
//! Given the display-form text and the caret offset after each edit, decides
//! whether the caret sits inside an `@`-triggered search region and extracts
//! the query typed since the triggering `@`.

/// An in-progress mention region under the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMention {
    /// Byte offset of the triggering `@` in the text.
    pub start: usize,
    /// Characters typed between the `@` and the caret. Empty means "browse".
    pub query: String,
}

/// Scans `text[..caret]` for an active mention region.
///
/// Only the last `@` before the caret counts. The region is active iff the
/// tail after that `@` contains no whitespace; a completed `@word ` ends the
/// region. `caret` is a byte offset and must lie on a char boundary;
/// positions inside a multi-byte character report no active mention.
pub fn active_mention(text: &str, caret: usize) -> Option<ActiveMention> {
    if caret > text.len() || !text.is_char_boundary(caret) {
        return None;
    }
    let prefix = &text[..caret];
    let start = prefix.rfind('@')?;
    let tail = &prefix[start + 1..];
    if tail.chars().any(char::is_whitespace) {
        return None;
    }
    Some(ActiveMention {
        start,
        query: tail.to_string(),
    })
}
