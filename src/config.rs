//! Application-level configuration loading, including the document store settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::document_store::{
    config::{
        DEFAULT_DATA_PATH, DEFAULT_DELETION_TICKET_TTL, DEFAULT_MIN_BYTES, DEFAULT_MIN_GUILDS,
        StoreConfig,
    },
    validator::Thresholds,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CASTBOT_CONFIG_PATH";
const DATA_PATH_ENV: &str = "CASTBOT_DATA_PATH";
const MIN_BYTES_ENV: &str = "CASTBOT_MIN_BYTES";
const MIN_GUILDS_ENV: &str = "CASTBOT_MIN_GUILDS";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    store: StoreConfig,
    port: u16,
}

impl AppConfig {
    /// Load the configuration file, then apply environment overrides.
    ///
    /// A missing or unreadable file falls back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded config");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let config = Self::from_raw(raw.with_env_overrides(), server_port());
        info!(
            data_path = %config.store.path.display(),
            min_bytes = config.store.thresholds.min_bytes,
            min_guilds = config.store.thresholds.min_guilds,
            nuke_allow_list = config.store.nuke_allow_list.len(),
            "document store configured"
        );
        config
    }

    fn from_raw(raw: RawConfig, port: u16) -> Self {
        let mut store = StoreConfig::new(raw.data_path)
            .with_thresholds(Thresholds::new(raw.min_bytes, raw.min_guilds))
            .with_nuke_allow_list(raw.nuke_allow_list)
            .with_deletion_ticket_ttl(Duration::from_secs(raw.deletion_ticket_ttl_secs));
        if let Some(dir) = raw.snapshot_dir {
            store = store.with_snapshots(dir, raw.snapshot_retain);
        }
        Self { store, port }
    }

    /// Settings for the guild document store.
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// TCP port the HTTP facade listens on.
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_path: PathBuf,
    min_bytes: u64,
    min_guilds: usize,
    snapshot_dir: Option<PathBuf>,
    snapshot_retain: usize,
    nuke_allow_list: Vec<String>,
    deletion_ticket_ttl_secs: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            min_bytes: DEFAULT_MIN_BYTES,
            min_guilds: DEFAULT_MIN_GUILDS,
            snapshot_dir: None,
            snapshot_retain: 20,
            nuke_allow_list: Vec::new(),
            deletion_ticket_ttl_secs: DEFAULT_DELETION_TICKET_TTL.as_secs(),
        }
    }
}

impl RawConfig {
    fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env::var_os(DATA_PATH_ENV).filter(|path| !path.is_empty()) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(min_bytes) = parsed_env(MIN_BYTES_ENV) {
            self.min_bytes = min_bytes;
        }
        if let Some(min_guilds) = parsed_env(MIN_GUILDS_ENV) {
            self.min_guilds = min_guilds;
        }
        self
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(name, %value, "ignoring unparsable environment override");
            None
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn server_port() -> u16 {
    env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"dataPath": "/srv/castbot/playerData.json", "nukeAllowList": ["391415444084490240"]}"#,
        )
        .unwrap();
        let config = AppConfig::from_raw(raw, 3000);

        assert_eq!(
            config.store().path,
            PathBuf::from("/srv/castbot/playerData.json")
        );
        assert_eq!(
            config.store().thresholds,
            Thresholds::new(DEFAULT_MIN_BYTES, DEFAULT_MIN_GUILDS)
        );
        assert_eq!(config.store().nuke_allow_list, ["391415444084490240"]);
        assert!(config.store().snapshots.is_none());
        assert_eq!(config.port(), 3000);
    }

    #[test]
    fn snapshot_dir_enables_snapshots() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"snapshotDir": "backups", "snapshotRetain": 3}"#).unwrap();
        let snapshots = AppConfig::from_raw(raw, DEFAULT_PORT).store().snapshots.clone().unwrap();

        assert_eq!(snapshots.dir, PathBuf::from("backups"));
        assert_eq!(snapshots.retain, 3);
    }
}
