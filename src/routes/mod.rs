//! HTTP routes of the guild document service.

use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod guild;
pub mod health;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(guild::router())
        .merge(admin::router())
        .merge(docs::router())
        .with_state(state)
}
