use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::dao::storage::{StoreError, StoreResult};

/// Reserved root key holding a documentation placeholder rather than a guild.
pub const PLACEHOLDER_KEY: &str = "/* Server ID */";
/// Maximum number of entries kept in a player's safari activity log.
pub const SAFARI_HISTORY_LIMIT: usize = 50;

const MAX_GUILD_ID_LEN: usize = 20;

/// Whether `key` has the shape of a guild (Discord snowflake) identifier.
pub fn is_guild_id(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_GUILD_ID_LEN && key.bytes().all(|b| b.is_ascii_digit())
}

/// The whole multi-tenant document, keyed by guild identifier.
///
/// Guild sub-trees are kept as raw JSON so feature data the store does not model
/// survives unrelated mutations untouched; typed views are decoded on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Empty document, as created on first run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of root keys shaped like guild identifiers.
    pub fn guild_count(&self) -> usize {
        self.guild_ids().count()
    }

    /// Iterate root keys that are guild identifiers, skipping reserved keys.
    pub fn guild_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str).filter(|key| is_guild_id(key))
    }

    /// Whether a record exists under `guild_id`.
    pub fn contains_guild(&self, guild_id: &str) -> bool {
        self.0.contains_key(guild_id)
    }

    /// Raw JSON for one guild.
    pub fn guild(&self, guild_id: &str) -> Option<&Value> {
        self.0.get(guild_id)
    }

    /// Mutable raw JSON for one guild.
    pub fn guild_mut(&mut self, guild_id: &str) -> Option<&mut Value> {
        self.0.get_mut(guild_id)
    }

    /// Insert or replace a guild record.
    pub fn insert_guild(&mut self, guild_id: &str, record: &GuildRecord) -> StoreResult<()> {
        let value = encode(guild_id, record)?;
        self.0.insert(guild_id.to_owned(), value);
        Ok(())
    }

    /// Remove a guild record, keeping the order of the remaining keys.
    pub fn remove_guild(&mut self, guild_id: &str) -> Option<Value> {
        self.0.shift_remove(guild_id)
    }

    /// Borrow the root object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Decode a typed record out of raw JSON, tagging failures with `path`.
pub fn decode<T: DeserializeOwned>(path: &str, value: &Value) -> StoreResult<T> {
    T::deserialize(value).map_err(|source| StoreError::Shape {
        path: path.to_owned(),
        source,
    })
}

/// Encode a typed record into raw JSON, tagging failures with `path`.
pub fn encode<T: Serialize>(path: &str, record: &T) -> StoreResult<Value> {
    serde_json::to_value(record).map_err(|source| StoreError::Shape {
        path: path.to_owned(),
        source,
    })
}

/// Per-tenant container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildRecord {
    /// Member profiles keyed by user id.
    #[serde(default)]
    pub players: IndexMap<String, PlayerRecord>,
    /// Tribes keyed by role id.
    #[serde(default)]
    pub tribes: IndexMap<String, TribeRecord>,
    /// Timezone roles keyed by label.
    #[serde(default)]
    pub timezones: IndexMap<String, TimezoneRecord>,
    /// Castlists keyed by id.
    #[serde(default)]
    pub castlist_configs: IndexMap<String, CastlistRecord>,
    /// Season application settings.
    #[serde(default)]
    pub application_configs: Map<String, Value>,
    /// Submitted applications.
    #[serde(default)]
    pub applications: Map<String, Value>,
    /// Feature sub-trees (safari economy, analytics, ...) kept as opaque payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Profile data for one member of a guild.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Age as the player entered it.
    pub age: Option<String>,
    /// Custom emoji shown next to the player.
    pub emoji_code: Option<String>,
    /// Mini-game state, once the player has joined.
    pub safari: Option<SafariState>,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

/// Mini-game state attached to a player.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SafariState {
    /// Spendable balance.
    #[serde(default)]
    pub currency: i64,
    /// Items held, keyed by item id.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub inventory: Map<String, Value>,
    /// Exploration state per map.
    #[schema(value_type = Option<Object>)]
    pub map_progress: Option<Value>,
    /// Recent actions, oldest first, capped at [`SAFARI_HISTORY_LIMIT`].
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub history: VecDeque<Value>,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

impl SafariState {
    /// Append an activity entry, evicting the oldest ones past the cap.
    pub fn record_activity(&mut self, entry: Value) {
        self.history.push_back(entry);
        while self.history.len() > SAFARI_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }
}

/// Role-backed tribe shown on castlists.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TribeRecord {
    /// Emoji shown for the tribe.
    pub emoji: Option<String>,
    /// Castlist the tribe is shown on.
    pub castlist: Option<String>,
    /// Id of the castlist the tribe belongs to.
    pub castlist_id: Option<String>,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Timezone role definition, keyed by its label in the guild record.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneRecord {
    /// Discord role granting the timezone.
    pub role_id: String,
    /// Offset from UTC in hours; may be fractional.
    pub offset: f64,
    /// Whether the zone shifts for daylight saving.
    pub dst_observed: Option<bool>,
    /// IANA zone name, when known.
    pub standard_name: Option<String>,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind of castlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastlistType {
    Custom,
    Alumni,
    Winners,
    System,
}

/// Display settings of a castlist.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastlistSettings {
    /// How members are ordered.
    pub sort_strategy: Option<String>,
    /// Whether placements are displayed.
    #[serde(default)]
    pub show_rankings: bool,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A configured castlist.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastlistRecord {
    /// Stable castlist id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Castlist kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: CastlistType,
    /// Season the castlist belongs to.
    pub season_id: Option<String>,
    /// Display settings.
    #[serde(default)]
    pub settings: CastlistSettings,
    /// Final placement per user id.
    pub rankings: Option<IndexMap<String, u32>>,
    /// Fields this crate does not model, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
