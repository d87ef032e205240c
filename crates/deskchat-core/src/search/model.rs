//! Entity search domain models.

use serde::{Deserialize, Serialize};

use crate::mention::EntityKind;

/// Hard cap on candidates returned for one query.
pub const MAX_CANDIDATES: usize = 5;

/// A ranked multi-type entity search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Free-text search term. Empty means "browse recent/default".
    pub term: String,

    /// Maximum number of results to return.
    pub limit: usize,
}

impl EntityQuery {
    /// Creates a query with the default result cap.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            limit: MAX_CANDIDATES,
        }
    }
}

/// A single entity candidate returned by the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCandidate {
    /// Identifier of the entity.
    pub entity_id: String,

    /// Kind of the entity, decoded into the closed set at the boundary.
    pub kind: EntityKind,

    /// Human-readable name, used as the mention display name.
    pub display_name: String,

    /// Secondary line shown under the name in the dropdown (status, email,
    /// account name, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
}
