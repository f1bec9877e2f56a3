//! Guild record creation and the access-controlled "nuke" deletion.

use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::DocumentStore;
use crate::dao::{
    models::{GuildRecord, is_guild_id},
    storage::{StoreError, StoreResult},
};

/// Single-use confirmation issued before a guild record may be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTicket {
    /// Value the caller must echo back.
    pub token: Uuid,
    /// Guild the token may delete.
    pub guild_id: String,
    /// Operator the token was issued to.
    pub requested_by: String,
    /// Instant after which the token is refused.
    pub expires_at: Instant,
}

impl DeletionTicket {
    fn is_valid_for(&self, guild_id: &str, requester: &str) -> bool {
        self.guild_id == guild_id && self.requested_by == requester && Instant::now() < self.expires_at
    }
}

impl DocumentStore {
    /// Return the raw guild record, creating and persisting an empty one if it is missing.
    ///
    /// An existing record is returned as stored, whatever its shape.
    pub async fn create_guild_record(&self, guild_id: &str) -> StoreResult<Value> {
        if !is_guild_id(guild_id) {
            return Err(StoreError::InvalidGuildId(guild_id.to_owned()));
        }

        self.mutate(|document| {
            if let Some(existing) = document.guild(guild_id) {
                return Ok(existing.clone());
            }
            document.insert_guild(guild_id, &GuildRecord::default())?;
            info!(guild_id, "guild record created");
            document
                .guild(guild_id)
                .cloned()
                .ok_or_else(|| StoreError::GuildNotFound(guild_id.to_owned()))
        })
        .await
    }

    /// Issue a confirmation token allowing `requester` to delete one guild record.
    pub async fn request_guild_deletion(
        &self,
        guild_id: &str,
        requester: &str,
    ) -> StoreResult<DeletionTicket> {
        self.authorize_nuke(requester)?;
        let document = self.load().await?;
        if !document.contains_guild(guild_id) {
            return Err(StoreError::GuildNotFound(guild_id.to_owned()));
        }

        self.deletions
            .retain(|_, ticket| Instant::now() < ticket.expires_at);
        let ticket = DeletionTicket {
            token: Uuid::new_v4(),
            guild_id: guild_id.to_owned(),
            requested_by: requester.to_owned(),
            expires_at: Instant::now() + self.config.deletion_ticket_ttl,
        };
        self.deletions.insert(ticket.token, ticket.clone());
        info!(guild_id, requester, "guild deletion requested");
        Ok(ticket)
    }

    /// Irreversibly remove exactly one guild record and save.
    ///
    /// Requires an allow-listed `requester` and a token from
    /// [`DocumentStore::request_guild_deletion`] issued to that requester for this
    /// guild. The token is consumed whether or not it matches.
    pub async fn delete_guild_record(
        &self,
        guild_id: &str,
        requester: &str,
        token: Uuid,
    ) -> StoreResult<Value> {
        self.authorize_nuke(requester)?;

        let ticket = self.deletions.remove(&token).map(|(_, ticket)| ticket);
        if !ticket.is_some_and(|ticket| ticket.is_valid_for(guild_id, requester)) {
            warn!(guild_id, requester, "guild deletion refused: bad confirmation token");
            return Err(StoreError::Unauthorized(
                "missing, expired or mismatched confirmation token".into(),
            ));
        }

        let removed = self
            .mutate(|document| {
                document
                    .remove_guild(guild_id)
                    .ok_or_else(|| StoreError::GuildNotFound(guild_id.to_owned()))
            })
            .await?;
        warn!(guild_id, requester, "guild record deleted");
        Ok(removed)
    }

    fn authorize_nuke(&self, requester: &str) -> StoreResult<()> {
        if self
            .config
            .nuke_allow_list
            .iter()
            .any(|allowed| allowed == requester)
        {
            Ok(())
        } else {
            warn!(requester, "guild deletion attempted by caller outside the allow-list");
            Err(StoreError::Unauthorized(format!(
                "`{requester}` may not delete guild records"
            )))
        }
    }
}
