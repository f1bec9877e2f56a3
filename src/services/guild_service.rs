//! Business logic behind the guild REST routes.
//!
//! Reads go straight to the document store. Writes run through
//! [`AppState::run_write`](crate::state::AppState::run_write) so a slow disk turns
//! into a timeout for the caller rather than a half-applied commit.

use tokio::time::Instant;
use tracing::info;

use crate::{
    dao::{
        document_store::path::EntityPath,
        models::PlayerRecord,
    },
    dto::guild::{
        DeleteGuildRequest, DeletionRequest, DeletionTicketResponse, EntityResponse,
        GuildSummary, RestoreRequest, RestoreResponse, SetEntityRequest, UpdatePlayerRequest,
    },
    error::ServiceError,
    state::SharedState,
};

fn entity_path(raw: &str) -> Result<EntityPath, ServiceError> {
    raw.parse::<EntityPath>().map_err(ServiceError::from)
}

/// Create the guild record if it does not exist yet.
pub async fn create_guild(
    state: &SharedState,
    guild_id: String,
) -> Result<GuildSummary, ServiceError> {
    state
        .run_write("create guild", move |store| async move {
            let record = store.create_guild_record(&guild_id).await?;
            Ok::<_, ServiceError>(GuildSummary::new(guild_id, &record))
        })
        .await
}

/// Read the value at a path inside a guild record.
pub async fn get_entity(
    state: &SharedState,
    guild_id: String,
    path: String,
) -> Result<EntityResponse, ServiceError> {
    let entity = entity_path(&path)?;
    let value = state.store().get_entity(&guild_id, &entity).await?;
    Ok(EntityResponse {
        guild_id,
        path,
        value,
    })
}

/// Overwrite the value at a path inside an existing guild record.
pub async fn set_entity(
    state: &SharedState,
    guild_id: String,
    request: SetEntityRequest,
) -> Result<EntityResponse, ServiceError> {
    let entity = entity_path(&request.path)?;
    let SetEntityRequest { path, value } = request;
    state
        .run_write("set entity", move |store| async move {
            let stored = store.update_entity(&guild_id, &entity, |_| value).await?;
            Ok::<_, ServiceError>(EntityResponse {
                guild_id,
                path,
                value: Some(stored),
            })
        })
        .await
}

/// Typed player profile; `NotFound` when the member has none.
pub async fn get_player(
    state: &SharedState,
    guild_id: String,
    user_id: String,
) -> Result<PlayerRecord, ServiceError> {
    state
        .store()
        .get_player(&guild_id, &user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{user_id}` in guild `{guild_id}`")))
}

/// Apply the provided profile fields, creating the player record when missing.
pub async fn update_player(
    state: &SharedState,
    guild_id: String,
    user_id: String,
    request: UpdatePlayerRequest,
) -> Result<PlayerRecord, ServiceError> {
    state
        .run_write("update player", move |store| async move {
            let player = store
                .update_player(&guild_id, &user_id, |player| {
                    if let Some(age) = request.age {
                        player.age = Some(age);
                    }
                    if let Some(emoji_code) = request.emoji_code {
                        player.emoji_code = Some(emoji_code);
                    }
                })
                .await?;
            Ok::<_, ServiceError>(player)
        })
        .await
}

/// Issue a deletion confirmation token.
pub async fn request_deletion(
    state: &SharedState,
    guild_id: String,
    request: DeletionRequest,
) -> Result<DeletionTicketResponse, ServiceError> {
    let ticket = state
        .store()
        .request_guild_deletion(&guild_id, &request.requested_by)
        .await?;
    Ok(DeletionTicketResponse {
        token: ticket.token,
        expires_in_secs: ticket
            .expires_at
            .saturating_duration_since(Instant::now())
            .as_secs(),
        guild_id,
    })
}

/// Delete a guild record with a previously issued confirmation token.
pub async fn delete_guild(
    state: &SharedState,
    guild_id: String,
    request: DeleteGuildRequest,
) -> Result<GuildSummary, ServiceError> {
    state
        .run_write("delete guild", move |store| async move {
            let removed = store
                .delete_guild_record(&guild_id, &request.requested_by, request.token)
                .await?;
            Ok::<_, ServiceError>(GuildSummary::new(guild_id, &removed))
        })
        .await
}

/// Roll the document back to the `.backup` copy; allow-listed operators only.
pub async fn restore(
    state: &SharedState,
    request: RestoreRequest,
) -> Result<RestoreResponse, ServiceError> {
    let allowed = state
        .store()
        .config()
        .nuke_allow_list
        .contains(&request.requested_by);
    if !allowed {
        return Err(ServiceError::Unauthorized(format!(
            "`{}` may not restore the document",
            request.requested_by
        )));
    }

    info!(requester = %request.requested_by, "restoring document from backup");
    state
        .run_write("restore backup", |store| async move {
            let document = store.restore_from_backup().await?;
            Ok::<_, ServiceError>(RestoreResponse {
                guilds: document.guild_count(),
                generation: store.snapshot().await.generation,
            })
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        dao::document_store::{DocumentStore, config::StoreConfig, validator::Thresholds},
        state::AppState,
    };

    const ADMIN: &str = "391415444084490240";

    fn state() -> (TempDir, SharedState) {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("playerData.json"))
            .with_thresholds(Thresholds::disabled())
            .with_nuke_allow_list([ADMIN]);
        let state = AppState::new(Arc::new(DocumentStore::new(config)));
        (dir, state)
    }

    #[tokio::test]
    async fn entity_written_then_read_back() {
        let (_dir, state) = state();
        create_guild(&state, "123".into()).await.unwrap();

        let written = set_entity(
            &state,
            "123".into(),
            SetEntityRequest {
                path: "players.456.age".into(),
                value: json!("21"),
            },
        )
        .await
        .unwrap();
        assert_eq!(written.value, Some(json!("21")));

        let read = get_entity(&state, "123".into(), "players.456".into())
            .await
            .unwrap();
        assert_eq!(read.value, Some(json!({"age": "21"})));

        let player = get_player(&state, "123".into(), "456".into()).await.unwrap();
        assert_eq!(player.age.as_deref(), Some("21"));
    }

    #[tokio::test]
    async fn partial_player_update_keeps_other_fields() {
        let (_dir, state) = state();
        create_guild(&state, "123".into()).await.unwrap();
        update_player(
            &state,
            "123".into(),
            "456".into(),
            UpdatePlayerRequest {
                age: Some("21".into()),
                emoji_code: Some("<:a:1>".into()),
            },
        )
        .await
        .unwrap();

        let player = update_player(
            &state,
            "123".into(),
            "456".into(),
            UpdatePlayerRequest {
                age: Some("22".into()),
                emoji_code: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(player.age.as_deref(), Some("22"));
        assert_eq!(player.emoji_code.as_deref(), Some("<:a:1>"));
    }

    #[tokio::test]
    async fn missing_player_is_not_found() {
        let (_dir, state) = state();
        create_guild(&state, "123".into()).await.unwrap();

        let err = get_player(&state, "123".into(), "456".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn deletion_flow_through_service() {
        let (_dir, state) = state();
        create_guild(&state, "123".into()).await.unwrap();

        let ticket = request_deletion(
            &state,
            "123".into(),
            DeletionRequest {
                requested_by: ADMIN.into(),
            },
        )
        .await
        .unwrap();
        assert!(ticket.expires_in_secs > 0);

        let removed = delete_guild(
            &state,
            "123".into(),
            DeleteGuildRequest {
                requested_by: ADMIN.into(),
                token: ticket.token,
            },
        )
        .await
        .unwrap();
        assert_eq!(removed.guild_id, "123");

        let after = get_entity(&state, "123".into(), "players".into())
            .await
            .unwrap();
        assert_eq!(after.value, None);
    }

    #[tokio::test]
    async fn restore_requires_allow_listed_requester() {
        let (_dir, state) = state();

        let err = restore(
            &state,
            RestoreRequest {
                requested_by: "555".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn guild_with_unexpected_shapes_is_created_and_deleted() {
        let (dir, state) = state();
        let seed = json!({
            "123": {
                "players": {"456": {"age": "21"}},
                "timezones": {"EST": {"roleId": "1", "offset": "minus five"}},
                "castlistConfigs": {"old": {"id": "old", "name": "Old", "type": "legacy"}}
            }
        });
        std::fs::write(
            dir.path().join("playerData.json"),
            serde_json::to_vec_pretty(&seed).unwrap(),
        )
        .unwrap();

        let summary = create_guild(&state, "123".into()).await.unwrap();
        assert_eq!(
            (summary.players, summary.timezones, summary.castlists),
            (1, 1, 1)
        );
        assert_eq!(state.store().snapshot().await.generation, 0);

        let ticket = request_deletion(
            &state,
            "123".into(),
            DeletionRequest {
                requested_by: ADMIN.into(),
            },
        )
        .await
        .unwrap();
        let removed = delete_guild(
            &state,
            "123".into(),
            DeleteGuildRequest {
                requested_by: ADMIN.into(),
                token: ticket.token,
            },
        )
        .await
        .unwrap();

        assert_eq!(removed.castlists, 1);
        assert!(!state.store().load().await.unwrap().contains_guild("123"));
    }
}
