//! Typed accessors over the sections of a guild record.
//!
//! Each helper decodes or re-encodes only the entry it touches, leaving the rest of
//! the guild sub-tree byte-for-byte as it was. Reads share the read cache with
//! [`DocumentStore::get_entity`].

use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{DocumentStore, path::EntityPath};
use crate::dao::{
    models::{
        CastlistRecord, Document, GuildRecord, PlayerRecord, SafariState, TimezoneRecord,
        TribeRecord, decode, encode,
    },
    storage::{StoreError, StoreResult},
};

const PLAYERS: &str = "players";
const TRIBES: &str = "tribes";
const TIMEZONES: &str = "timezones";
const CASTLISTS: &str = "castlistConfigs";


/// Decode, edit and write back one entry of a section, creating it from
/// `T::default()` when missing.
fn edit_entry<T, F>(
    document: &mut Document,
    guild_id: &str,
    path: &EntityPath,
    edit: F,
) -> StoreResult<T>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    let label = format!("{guild_id}.{path}");
    let guild = document
        .guild_mut(guild_id)
        .ok_or_else(|| StoreError::GuildNotFound(guild_id.to_owned()))?;

    let mut entry = match path.resolve(guild) {
        Some(value) => decode(&label, value)?,
        None => T::default(),
    };
    edit(&mut entry);
    path.assign(guild, encode(&label, &entry)?)?;
    Ok(entry)
}

fn put_entry<T: Serialize>(
    document: &mut Document,
    guild_id: &str,
    path: &EntityPath,
    entry: &T,
) -> StoreResult<()> {
    let value = encode(&format!("{guild_id}.{path}"), entry)?;
    let guild = document
        .guild_mut(guild_id)
        .ok_or_else(|| StoreError::GuildNotFound(guild_id.to_owned()))?;
    path.assign(guild, value)
}

impl DocumentStore {
    /// Cached value at `path` inside an existing guild.
    async fn guild_entry(&self, guild_id: &str, path: &EntityPath) -> StoreResult<Option<Value>> {
        if let Some(value) = self.cached_lookup(guild_id, Some(path)).await? {
            return Ok(Some(value));
        }
        if self.load().await?.contains_guild(guild_id) {
            Ok(None)
        } else {
            Err(StoreError::GuildNotFound(guild_id.to_owned()))
        }
    }

    /// Decode a whole section (`players`, `tribes`, ...) of a guild, empty when absent.
    async fn section<T>(&self, guild_id: &str, name: &str) -> StoreResult<IndexMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let path = EntityPath::from_segments([name])?;
        match self.guild_entry(guild_id, &path).await? {
            Some(value) => decode(&format!("{guild_id}.{name}"), &value),
            None => Ok(IndexMap::new()),
        }
    }

    /// Typed view of a whole guild record.
    pub async fn get_guild(&self, guild_id: &str) -> StoreResult<Option<GuildRecord>> {
        self.cached_lookup(guild_id, None)
            .await?
            .map(|value| decode(guild_id, &value))
            .transpose()
    }

    /// Typed player record, `None` when the member has none yet.
    pub async fn get_player(
        &self,
        guild_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<PlayerRecord>> {
        let path = EntityPath::from_segments([PLAYERS, user_id])?;
        self.guild_entry(guild_id, &path)
            .await?
            .map(|value| decode(&format!("{guild_id}.{path}"), &value))
            .transpose()
    }

    /// Edit a player record in place, creating it when the user has none yet.
    pub async fn update_player<F>(
        &self,
        guild_id: &str,
        user_id: &str,
        edit: F,
    ) -> StoreResult<PlayerRecord>
    where
        F: FnOnce(&mut PlayerRecord),
    {
        let path = EntityPath::from_segments([PLAYERS, user_id])?;
        self.mutate(|document| edit_entry(document, guild_id, &path, edit))
            .await
    }

    /// Tribes of a guild, keyed by role id.
    pub async fn get_guild_tribes(
        &self,
        guild_id: &str,
    ) -> StoreResult<IndexMap<String, TribeRecord>> {
        self.section(guild_id, TRIBES).await
    }

    /// Edit a tribe in place, creating it when the role has none yet.
    pub async fn update_tribe<F>(
        &self,
        guild_id: &str,
        role_id: &str,
        edit: F,
    ) -> StoreResult<TribeRecord>
    where
        F: FnOnce(&mut TribeRecord),
    {
        let path = EntityPath::from_segments([TRIBES, role_id])?;
        self.mutate(|document| edit_entry(document, guild_id, &path, edit))
            .await
    }

    /// Timezone roles of a guild, keyed by label.
    pub async fn get_timezones(
        &self,
        guild_id: &str,
    ) -> StoreResult<IndexMap<String, TimezoneRecord>> {
        self.section(guild_id, TIMEZONES).await
    }

    /// Insert or replace the timezone stored under `label`.
    pub async fn set_timezone(
        &self,
        guild_id: &str,
        label: &str,
        timezone: TimezoneRecord,
    ) -> StoreResult<()> {
        let path = EntityPath::from_segments([TIMEZONES, label])?;
        self.mutate(|document| put_entry(document, guild_id, &path, &timezone))
            .await
    }

    /// Castlists of a guild, keyed by castlist id.
    pub async fn get_castlists(
        &self,
        guild_id: &str,
    ) -> StoreResult<IndexMap<String, CastlistRecord>> {
        self.section(guild_id, CASTLISTS).await
    }

    /// Insert or replace a castlist, keyed by its own id.
    pub async fn upsert_castlist(&self, guild_id: &str, castlist: CastlistRecord) -> StoreResult<()> {
        let path = EntityPath::from_segments([CASTLISTS, castlist.id.as_str()])?;
        self.mutate(|document| put_entry(document, guild_id, &path, &castlist))
            .await
    }

    /// Append to a player's safari activity log, dropping the oldest entries past the cap.
    pub async fn record_safari_activity(
        &self,
        guild_id: &str,
        user_id: &str,
        entry: Value,
    ) -> StoreResult<SafariState> {
        let player = self
            .update_player(guild_id, user_id, |player| {
                player
                    .safari
                    .get_or_insert_with(SafariState::default)
                    .record_activity(entry);
            })
            .await?;
        Ok(player.safari.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::dao::{
        document_store::{
            backend::FsBackend, config::StoreConfig, validator::Thresholds,
        },
        models::{CastlistSettings, CastlistType, SAFARI_HISTORY_LIMIT},
    };

    async fn seeded_store(dir: &std::path::Path) -> Arc<DocumentStore> {
        let path = dir.join("playerData.json");
        let seed = json!({
            "123": {
                "players": {"456": {"age": "21", "emojiCode": "<:a:1>", "pronouns": "she/her"}},
                "tribes": {"789": {"emoji": "🌴", "castlist": "default", "color": "#00ff00"}},
                "timezones": {"EST": {"roleId": "111", "offset": -5, "dstObserved": true}},
                "safariContent": {"buttons": {}}
            }
        });
        fs::write(&path, serde_json::to_vec_pretty(&seed).unwrap()).unwrap();
        let config = StoreConfig::new(path).with_thresholds(Thresholds::disabled());
        Arc::new(DocumentStore::with_backend(config, Arc::new(FsBackend)))
    }

    #[tokio::test]
    async fn player_reads_and_updates_keep_unknown_fields() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let player = store.get_player("123", "456").await.unwrap().unwrap();
        assert_eq!(player.age.as_deref(), Some("21"));
        assert!(store.get_player("123", "999").await.unwrap().is_none());

        store
            .update_player("123", "456", |player| player.age = Some("22".into()))
            .await
            .unwrap();

        let raw = store
            .get_entity("123", &"players.456".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["age"], "22");
        assert_eq!(raw["pronouns"], "she/her");
    }

    #[tokio::test]
    async fn missing_guild_is_reported() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        assert!(matches!(
            store.get_player("555", "456").await,
            Err(StoreError::GuildNotFound(_))
        ));
        assert!(matches!(
            store.update_tribe("555", "1", |_| {}).await,
            Err(StoreError::GuildNotFound(_))
        ));
        assert!(store.get_guild("555").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tribes_and_timezones_round_trip() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        store
            .update_tribe("123", "789", |tribe| tribe.emoji = Some("🔥".into()))
            .await
            .unwrap();
        let tribes = store.get_guild_tribes("123").await.unwrap();
        assert_eq!(tribes["789"].emoji.as_deref(), Some("🔥"));
        assert_eq!(tribes["789"].extra["color"], "#00ff00");

        store
            .set_timezone(
                "123",
                "IST",
                TimezoneRecord {
                    role_id: "222".into(),
                    offset: 5.5,
                    dst_observed: None,
                    standard_name: Some("Asia/Kolkata".into()),
                    extra: Default::default(),
                },
            )
            .await
            .unwrap();
        let timezones = store.get_timezones("123").await.unwrap();
        assert_eq!(timezones.keys().collect::<Vec<_>>(), ["EST", "IST"]);
        assert_eq!(timezones["IST"].offset, 5.5);
        assert_eq!(timezones["EST"].dst_observed, Some(true));
    }

    #[tokio::test]
    async fn castlists_are_keyed_by_id() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        assert!(store.get_castlists("123").await.unwrap().is_empty());

        let castlist = CastlistRecord {
            id: "season_1_winners".into(),
            name: "Winners".into(),
            kind: CastlistType::Winners,
            season_id: Some("season_1".into()),
            settings: CastlistSettings {
                sort_strategy: Some("placements".into()),
                show_rankings: true,
                extra: Default::default(),
            },
            rankings: Some(IndexMap::from([("456".to_string(), 1)])),
            extra: Default::default(),
        };
        store.upsert_castlist("123", castlist.clone()).await.unwrap();

        let castlists = store.get_castlists("123").await.unwrap();
        assert_eq!(castlists["season_1_winners"], castlist);
    }

    #[tokio::test]
    async fn safari_activity_is_capped() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        for step in 0..(SAFARI_HISTORY_LIMIT + 3) {
            store
                .record_safari_activity("123", "456", json!({ "step": step }))
                .await
                .unwrap();
        }

        let safari = store
            .get_player("123", "456")
            .await
            .unwrap()
            .unwrap()
            .safari
            .unwrap();
        assert_eq!(safari.history.len(), SAFARI_HISTORY_LIMIT);
        assert_eq!(safari.history[0]["step"], 3);
    }

    #[tokio::test]
    async fn guild_view_exposes_feature_subtrees() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        let record = store.get_guild("123").await.unwrap().unwrap();
        assert!(record.extra.contains_key("safariContent"));
        assert_eq!(record.players.len(), 1);
    }

    #[tokio::test]
    async fn typed_reads_are_cached_until_the_next_write() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path()).await;

        store.get_player("123", "456").await.unwrap();
        let before = store.cache_stats();
        let player = store.get_player("123", "456").await.unwrap().unwrap();
        assert_eq!(store.cache_stats().hits, before.hits + 1);
        assert_eq!(player.age.as_deref(), Some("21"));

        store
            .update_player("123", "456", |player| player.age = Some("22".into()))
            .await
            .unwrap();

        let after_write = store.cache_stats();
        let player = store.get_player("123", "456").await.unwrap().unwrap();
        assert_eq!(player.age.as_deref(), Some("22"));
        assert_eq!(store.cache_stats().misses, after_write.misses + 1);
    }
}
