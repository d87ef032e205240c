//! Entity search module.
//!
//! Ranked multi-type entity lookup behind the [`EntitySearch`] trait, plus
//! the stale-safe [`MentionResolver`] and the [`SuggestionState`] dropdown
//! model built on top of it.

mod model;
mod resolver;
mod service;

// Re-export public API
pub use model::{EntityCandidate, EntityQuery, MAX_CANDIDATES};
pub use resolver::{Debounce, MentionResolver, ResolverOutcome, SuggestionState};
pub use service::EntitySearch;
