//! Entity search service trait definition.

use async_trait::async_trait;

use crate::error::Result;
use crate::search::{EntityCandidate, EntityQuery};

/// Service for ranked multi-type entity lookups.
///
/// This is the seam to the remote search RPC. Implementations must return at
/// most `query.limit` candidates, already ranked, and must decode entity
/// kinds into the closed [`crate::mention::EntityKind`] set; rows carrying
/// unknown kinds are dropped at the boundary, never passed through.
#[async_trait]
pub trait EntitySearch: Send + Sync {
    /// Executes one ranked search.
    ///
    /// # Arguments
    /// * `query` - Search term (empty = browse) and result cap
    ///
    /// # Returns
    /// Ranked candidates, possibly empty. A lookup failure is an `Err`,
    /// distinct from "no matches".
    async fn search(&self, query: &EntityQuery) -> Result<Vec<EntityCandidate>>;
}
