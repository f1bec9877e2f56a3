//! Operator endpoints.

use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::guild::{RestoreRequest, RestoreResponse},
    error::AppError,
    services::guild_service,
    state::SharedState,
};

/// Operator endpoints acting on the whole document.
pub fn router() -> Router<SharedState> {
    Router::new().route("/admin/restore", post(restore_backup))
}

/// Roll the guild document back to its `.backup` copy.
#[utoipa::path(
    post,
    path = "/admin/restore",
    tag = "admin",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Document restored", body = RestoreResponse),
        (status = 401, description = "Requester is not an operator"),
        (status = 503, description = "Backup missing, invalid or unwritable")
    )
)]
pub async fn restore_backup(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<RestoreRequest>>,
) -> Result<Json<RestoreResponse>, AppError> {
    Ok(Json(guild_service::restore(&state, request).await?))
}
