//! Document store configuration.

use std::{path::PathBuf, time::Duration};

use super::{validator::Thresholds, writer::SnapshotPolicy};

/// Default location of the guild document.
pub const DEFAULT_DATA_PATH: &str = "playerData.json";
/// Default byte floor for the document once it has reached production scale.
pub const DEFAULT_MIN_BYTES: u64 = 50_000;
/// Default guild-count floor for the document once it has reached production scale.
pub const DEFAULT_MIN_GUILDS: usize = 10;
/// How long a guild deletion confirmation token stays valid.
pub const DEFAULT_DELETION_TICKET_TTL: Duration = Duration::from_secs(300);

/// Runtime configuration of a [`super::DocumentStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Location of the guild document.
    pub path: PathBuf,
    /// Size and guild-count floors.
    pub thresholds: Thresholds,
    /// Timestamped copies taken before each commit, if enabled.
    pub snapshots: Option<SnapshotPolicy>,
    /// User ids allowed to delete guild records.
    pub nuke_allow_list: Vec<String>,
    /// Lifetime of a deletion confirmation token.
    pub deletion_ticket_ttl: Duration,
}

impl StoreConfig {
    /// Configuration for the document at `path` with default floors.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            thresholds: Thresholds::new(DEFAULT_MIN_BYTES, DEFAULT_MIN_GUILDS),
            snapshots: None,
            nuke_allow_list: Vec::new(),
            deletion_ticket_ttl: DEFAULT_DELETION_TICKET_TTL,
        }
    }

    /// Replace the default floors.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Keep up to `retain` timestamped copies of the previous document in `dir`.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>, retain: usize) -> Self {
        self.snapshots = Some(SnapshotPolicy {
            dir: dir.into(),
            retain,
        });
        self
    }

    /// User ids allowed to delete guild records and restore backups.
    pub fn with_nuke_allow_list<I, S>(mut self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nuke_allow_list = user_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Override how long deletion tokens stay valid.
    pub fn with_deletion_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.deletion_ticket_ttl = ttl;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}
