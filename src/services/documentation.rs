use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the guild document store.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::guild::create_guild,
        crate::routes::guild::delete_guild,
        crate::routes::guild::get_entity,
        crate::routes::guild::set_entity,
        crate::routes::guild::get_player,
        crate::routes::guild::update_player,
        crate::routes::guild::request_deletion,
        crate::routes::admin::restore_backup,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::CacheReport,
            crate::dto::guild::EntityResponse,
            crate::dto::guild::SetEntityRequest,
            crate::dto::guild::GuildSummary,
            crate::dto::guild::UpdatePlayerRequest,
            crate::dto::guild::DeletionRequest,
            crate::dto::guild::DeletionTicketResponse,
            crate::dto::guild::DeleteGuildRequest,
            crate::dto::guild::RestoreRequest,
            crate::dto::guild::RestoreResponse,
            crate::dao::models::PlayerRecord,
            crate::dao::models::SafariState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "guilds", description = "Guild records and path-addressed entities"),
        (name = "players", description = "Typed player profiles"),
        (name = "admin", description = "Operator recovery actions"),
    )
)]
pub struct ApiDoc;
