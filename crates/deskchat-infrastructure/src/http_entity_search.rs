//! HTTP-backed entity search client.
//!
//! Calls the ranked multi-type search RPC and decodes its rows into the
//! closed entity-kind set. Rows carrying an unrecognized entity type are
//! dropped with a warning; the remote adding a new type must never crash the
//! mention dropdown.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deskchat_core::error::{DeskchatError, Result};
use deskchat_core::mention::EntityKind;
use deskchat_core::search::{EntityCandidate, EntityQuery, EntitySearch};

/// Wire request for the search RPC.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    search_query: &'a str,
    max_results: usize,
}

/// Wire row returned by the search RPC. The entity type arrives as a free
/// string and is validated into [`EntityKind`] during decoding.
#[derive(Debug, Deserialize)]
struct SearchRow {
    entity_id: String,
    entity_type: String,
    display_name: String,
    #[serde(default)]
    secondary_text: Option<String>,
}

/// Decodes RPC rows into candidates, dropping unknown entity types.
fn candidates_from_rows(rows: Vec<SearchRow>, limit: usize) -> Vec<EntityCandidate> {
    let mut candidates = Vec::new();
    for row in rows {
        match EntityKind::from_str(&row.entity_type) {
            Ok(kind) => candidates.push(EntityCandidate {
                entity_id: row.entity_id,
                kind,
                display_name: row.display_name,
                secondary_text: row.secondary_text,
            }),
            Err(_) => {
                tracing::warn!(
                    entity_type = %row.entity_type,
                    entity_id = %row.entity_id,
                    "dropping search row with unknown entity type"
                );
            }
        }
        if candidates.len() >= limit {
            break;
        }
    }
    candidates
}

/// [`EntitySearch`] implementation backed by the remote search endpoint.
pub struct HttpEntitySearch {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEntitySearch {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl EntitySearch for HttpEntitySearch {
    async fn search(&self, query: &EntityQuery) -> Result<Vec<EntityCandidate>> {
        let request = SearchRequest {
            search_query: &query.term,
            max_results: query.limit,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeskchatError::search(format!("search request failed: {e}")))?
            .error_for_status()
            .map_err(|e| DeskchatError::search(format!("search request rejected: {e}")))?;
        let rows: Vec<SearchRow> = response
            .json()
            .await
            .map_err(|e| DeskchatError::search(format!("malformed search response: {e}")))?;
        Ok(candidates_from_rows(rows, query.limit))
    }
}
