use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the document store phase, generation and cache counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = state.store();
    let snapshot = store.snapshot().await;

    let guilds = if snapshot.phase.is_serving() {
        match store.load().await {
            Ok(document) => Some(document.guild_count()),
            Err(err) => {
                warn!(error = %err, "document unavailable during health check");
                None
            }
        }
    } else {
        warn!(phase = snapshot.phase.label(), "document store is not serving");
        None
    };

    HealthResponse::from_store(&snapshot, guilds, store.cache_stats())
}
