//! Stale-safe mention resolution and dropdown state.
//!
//! Keystrokes can fire searches faster than they resolve. The resolver
//! stamps every query with a monotonically increasing generation and reports
//! any resolution that finishes after a newer query has started as stale, so
//! the dropdown never shows candidates for a term the user has already typed
//! past.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::DeskchatError;
use crate::search::model::MAX_CANDIDATES;
use crate::search::{EntityCandidate, EntityQuery, EntitySearch};

/// Outcome of one resolution attempt.
#[derive(Debug)]
pub enum ResolverOutcome {
    /// The query is still current; ranked candidates (possibly empty).
    Candidates(Vec<EntityCandidate>),
    /// The lookup failed. Distinct from an empty candidate list so the UI
    /// can show "search failed" instead of "no results".
    Failed(DeskchatError),
    /// A newer query superseded this one; the caller must discard it.
    Stale,
}

/// Maps mention search terms to ranked candidates, discarding stale results.
pub struct MentionResolver {
    service: Arc<dyn EntitySearch>,
    generation: AtomicU64,
}

impl MentionResolver {
    pub fn new(service: Arc<dyn EntitySearch>) -> Self {
        Self {
            service,
            generation: AtomicU64::new(0),
        }
    }

    /// Resolves `term` to candidates, unless a newer call supersedes it.
    ///
    /// An empty term browses recent/default entities.
    pub async fn resolve(&self, term: &str) -> ResolverOutcome {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.service.search(&EntityQuery::new(term)).await;
        if self.generation.load(Ordering::SeqCst) != my_generation {
            return ResolverOutcome::Stale;
        }
        match result {
            Ok(mut candidates) => {
                candidates.truncate(MAX_CANDIDATES);
                ResolverOutcome::Candidates(candidates)
            }
            Err(err) => ResolverOutcome::Failed(err),
        }
    }
}

/// Dropdown model for mention suggestions.
///
/// Holds the current candidate list, the highlighted row, and the failure
/// flag. Reset whenever the active mention region closes.
#[derive(Debug, Default)]
pub struct SuggestionState {
    candidates: Vec<EntityCandidate>,
    highlighted: usize,
    failed: bool,
}

impl SuggestionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a resolver outcome. Stale outcomes are ignored.
    pub fn apply(&mut self, outcome: ResolverOutcome) {
        match outcome {
            ResolverOutcome::Candidates(candidates) => {
                self.candidates = candidates;
                self.highlighted = 0;
                self.failed = false;
            }
            ResolverOutcome::Failed(_) => {
                self.candidates.clear();
                self.highlighted = 0;
                self.failed = true;
            }
            ResolverOutcome::Stale => {}
        }
    }

    pub fn candidates(&self) -> &[EntityCandidate] {
        &self.candidates
    }

    /// Whether the last applied lookup failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The currently highlighted candidate, if any.
    pub fn highlighted(&self) -> Option<&EntityCandidate> {
        self.candidates.get(self.highlighted)
    }

    pub fn highlighted_index(&self) -> usize {
        self.highlighted
    }

    /// Moves the highlight down, wrapping at the end.
    pub fn move_down(&mut self) {
        if !self.candidates.is_empty() {
            self.highlighted = (self.highlighted + 1) % self.candidates.len();
        }
    }

    /// Moves the highlight up, wrapping at the start.
    pub fn move_up(&mut self) {
        if !self.candidates.is_empty() {
            self.highlighted = self
                .highlighted
                .checked_sub(1)
                .unwrap_or(self.candidates.len() - 1);
        }
    }

    /// Clears everything; call when the mention region closes.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.highlighted = 0;
        self.failed = false;
    }
}

/// Minimum-interval gate for resolver calls fired on every keystroke.
#[derive(Debug)]
pub struct Debounce {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Returns true (and arms the gate) if enough time has passed since the
    /// last accepted call.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
