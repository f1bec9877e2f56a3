use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::document_store::{cache::CacheStats, lifecycle::Snapshot};

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Lifecycle phase of the document store.
    pub phase: String,
    /// Number of committed writes since start-up.
    pub generation: u64,
    /// Guild records in the loaded document, absent until it is loaded.
    pub guilds: Option<usize>,
    /// Read cache counters.
    pub cache: CacheReport,
}

/// Read cache counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct CacheReport {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to read the document.
    pub misses: u64,
    /// Values currently cached.
    pub entries: usize,
}

impl HealthResponse {
    /// Build the report; the store is healthy only while its document is loaded.
    pub fn from_store(snapshot: &Snapshot, guilds: Option<usize>, cache: CacheStats) -> Self {
        let status = if snapshot.phase.is_serving() {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            phase: snapshot.phase.label().to_string(),
            generation: snapshot.generation,
            guilds,
            cache: CacheReport {
                hits: cache.hits,
                misses: cache.misses,
                entries: cache.entries,
            },
        }
    }
}
