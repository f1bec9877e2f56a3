//! DTO definitions used by the guild REST API and documentation layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::{validate_entity_path, validate_snowflake};

/// Path parameters addressing one guild.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct GuildPath {
    /// Discord server id.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
}

/// Path parameters addressing one member of a guild.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Path)]
pub struct PlayerPath {
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    #[validate(custom(function = "validate_snowflake"))]
    pub user_id: String,
}

/// Query selecting a value inside a guild record.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct EntityQuery {
    /// Dot-separated path, e.g. `players.456.age`.
    #[validate(custom(function = "validate_entity_path"), length(max = 512))]
    pub path: String,
}

/// Replace the value stored at `path` inside a guild record.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetEntityRequest {
    #[validate(custom(function = "validate_entity_path"), length(max = 512))]
    pub path: String,
    #[schema(value_type = Object)]
    pub value: Value,
}

/// Value found at a path inside a guild record.
#[derive(Debug, Serialize, ToSchema)]
pub struct EntityResponse {
    pub guild_id: String,
    pub path: String,
    /// `null` when nothing is stored at the path.
    #[schema(value_type = Option<Object>)]
    pub value: Option<Value>,
}

/// Shape of a guild record, returned after creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuildSummary {
    pub guild_id: String,
    pub players: usize,
    pub tribes: usize,
    pub timezones: usize,
    pub castlists: usize,
}

impl GuildSummary {
    /// Count the entries of each section of a raw guild record.
    ///
    /// Sections that are missing or not objects count as empty.
    pub fn new(guild_id: String, record: &Value) -> Self {
        let entries = |section: &str| {
            record
                .get(section)
                .and_then(Value::as_object)
                .map_or(0, |entries| entries.len())
        };
        Self {
            players: entries("players"),
            tribes: entries("tribes"),
            timezones: entries("timezones"),
            castlists: entries("castlistConfigs"),
            guild_id,
        }
    }
}

/// Partial update of a player profile; omitted fields are left unchanged.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdatePlayerRequest {
    #[validate(length(min = 1, max = 16))]
    pub age: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub emoji_code: Option<String>,
}

/// Ask for a confirmation token before deleting a guild record.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DeletionRequest {
    /// User id of the operator asking for the deletion.
    #[validate(custom(function = "validate_snowflake"))]
    pub requested_by: String,
}

/// Confirmation token issued for one guild deletion.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletionTicketResponse {
    pub token: Uuid,
    pub guild_id: String,
    pub expires_in_secs: u64,
}

/// Irreversibly delete a guild record.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DeleteGuildRequest {
    #[validate(custom(function = "validate_snowflake"))]
    pub requested_by: String,
    pub token: Uuid,
}

/// Roll the document back to its `.backup` copy.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RestoreRequest {
    #[validate(custom(function = "validate_snowflake"))]
    pub requested_by: String,
}

/// Document state after a restore.
#[derive(Debug, Serialize, ToSchema)]
pub struct RestoreResponse {
    pub guilds: usize,
    pub generation: u64,
}
