//! Guild record, entity and player endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::PlayerRecord,
    dto::guild::{
        DeleteGuildRequest, DeletionRequest, DeletionTicketResponse, EntityQuery,
        EntityResponse, GuildPath, GuildSummary, PlayerPath, SetEntityRequest,
        UpdatePlayerRequest,
    },
    error::AppError,
    services::guild_service,
    state::SharedState,
};

/// Guild record, entity and player endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/guilds/{guild_id}", post(create_guild).delete(delete_guild))
        .route("/guilds/{guild_id}/entity", get(get_entity).put(set_entity))
        .route(
            "/guilds/{guild_id}/players/{user_id}",
            get(get_player).put(update_player),
        )
        .route("/guilds/{guild_id}/deletion", post(request_deletion))
}

/// Create the guild record on first interaction; existing records are returned as-is.
#[utoipa::path(
    post,
    path = "/guilds/{guild_id}",
    tag = "guilds",
    params(GuildPath),
    responses(
        (status = 200, description = "Guild record ready", body = GuildSummary),
        (status = 400, description = "Malformed guild id"),
        (status = 422, description = "Write refused by the document validator"),
        (status = 503, description = "Document store unavailable or write timed out")
    )
)]
pub async fn create_guild(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<GuildPath>>,
) -> Result<Json<GuildSummary>, AppError> {
    Ok(Json(
        guild_service::create_guild(&state, params.guild_id).await?,
    ))
}

/// Read the value stored at a dot-separated path inside a guild record.
#[utoipa::path(
    get,
    path = "/guilds/{guild_id}/entity",
    tag = "guilds",
    params(GuildPath, EntityQuery),
    responses(
        (status = 200, description = "Value at the path, or null", body = EntityResponse),
        (status = 400, description = "Malformed guild id or path")
    )
)]
pub async fn get_entity(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<GuildPath>>,
    Valid(Query(query)): Valid<Query<EntityQuery>>,
) -> Result<Json<EntityResponse>, AppError> {
    Ok(Json(
        guild_service::get_entity(&state, params.guild_id, query.path).await?,
    ))
}

/// Replace the value at a path, creating intermediate objects as needed.
#[utoipa::path(
    put,
    path = "/guilds/{guild_id}/entity",
    tag = "guilds",
    params(GuildPath),
    request_body = SetEntityRequest,
    responses(
        (status = 200, description = "Value stored", body = EntityResponse),
        (status = 404, description = "Guild not found"),
        (status = 422, description = "Write refused by the document validator")
    )
)]
pub async fn set_entity(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<GuildPath>>,
    Valid(Json(request)): Valid<Json<SetEntityRequest>>,
) -> Result<Json<EntityResponse>, AppError> {
    Ok(Json(
        guild_service::set_entity(&state, params.guild_id, request).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/guilds/{guild_id}/players/{user_id}",
    tag = "players",
    params(PlayerPath),
    responses(
        (status = 200, description = "Player profile", body = PlayerRecord),
        (status = 404, description = "Guild or player not found")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<PlayerPath>>,
) -> Result<Json<PlayerRecord>, AppError> {
    Ok(Json(
        guild_service::get_player(&state, params.guild_id, params.user_id).await?,
    ))
}

/// Update a player's profile fields; the guild record must already exist.
#[utoipa::path(
    put,
    path = "/guilds/{guild_id}/players/{user_id}",
    tag = "players",
    params(PlayerPath),
    request_body = UpdatePlayerRequest,
    responses(
        (status = 200, description = "Updated player profile", body = PlayerRecord),
        (status = 404, description = "Guild not found")
    )
)]
pub async fn update_player(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<PlayerPath>>,
    Valid(Json(request)): Valid<Json<UpdatePlayerRequest>>,
) -> Result<Json<PlayerRecord>, AppError> {
    Ok(Json(
        guild_service::update_player(&state, params.guild_id, params.user_id, request).await?,
    ))
}

/// Issue a single-use confirmation token for deleting a guild record.
#[utoipa::path(
    post,
    path = "/guilds/{guild_id}/deletion",
    tag = "guilds",
    params(GuildPath),
    request_body = DeletionRequest,
    responses(
        (status = 201, description = "Confirmation token issued", body = DeletionTicketResponse),
        (status = 401, description = "Requester may not delete guild records"),
        (status = 404, description = "Guild not found")
    )
)]
pub async fn request_deletion(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<GuildPath>>,
    Valid(Json(request)): Valid<Json<DeletionRequest>>,
) -> Result<(StatusCode, Json<DeletionTicketResponse>), AppError> {
    let ticket = guild_service::request_deletion(&state, params.guild_id, request).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Irreversibly delete a guild record using a confirmation token.
#[utoipa::path(
    delete,
    path = "/guilds/{guild_id}",
    tag = "guilds",
    params(GuildPath),
    request_body = DeleteGuildRequest,
    responses(
        (status = 200, description = "Guild record deleted", body = GuildSummary),
        (status = 401, description = "Requester or token rejected"),
        (status = 404, description = "Guild not found")
    )
)]
pub async fn delete_guild(
    State(state): State<SharedState>,
    Valid(Path(params)): Valid<Path<GuildPath>>,
    Valid(Json(request)): Valid<Json<DeleteGuildRequest>>,
) -> Result<Json<GuildSummary>, AppError> {
    Ok(Json(
        guild_service::delete_guild(&state, params.guild_id, request).await?,
    ))
}
