//! Pure acceptance checks applied to the document on load and on save.
//!
//! Two independent heuristics guard the file: a byte-size floor and a guild-count
//! floor. A partial read can yield JSON that parses but is nearly empty; either
//! check alone lets some of those through, so both must pass.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dao::{
    models::Document,
    storage::{Rejection, StoreError, StoreResult},
};

/// Configured floors for document size and guild count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Smallest acceptable file, in bytes.
    pub min_bytes: u64,
    /// Fewest guild records an acceptable document may hold.
    pub min_guilds: usize,
}

impl Thresholds {
    /// Floors of `min_bytes` bytes and `min_guilds` guilds.
    pub const fn new(min_bytes: u64, min_guilds: usize) -> Self {
        Self {
            min_bytes,
            min_guilds,
        }
    }

    /// No floors at all.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Floors in force given the high-water mark of committed documents.
    ///
    /// Each floor is armed once some committed document has reached it, so a fresh
    /// document may grow from nothing while a production-scale one can never shrink
    /// below the floor. Loads and saves arm against the same mark, so a file the
    /// store committed always passes its own load check.
    pub fn armed_for(&self, baseline: &Baseline) -> Thresholds {
        Thresholds {
            min_bytes: if baseline.bytes >= self.min_bytes {
                self.min_bytes
            } else {
                0
            },
            min_guilds: if baseline.guilds >= self.min_guilds {
                self.min_guilds
            } else {
                0
            },
        }
    }
}

/// Largest size and guild count of any document committed so far.
///
/// Persisted next to the document so the floors stay armed across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// Serialized size in bytes.
    pub bytes: u64,
    /// Guild records, reserved keys excluded.
    pub guilds: usize,
}

impl Baseline {
    /// Size and guild count of one serialized document.
    pub fn of(bytes: u64, document: &Document) -> Self {
        Self {
            bytes,
            guilds: document.guild_count(),
        }
    }

    /// Field-wise maximum of two marks.
    pub fn max(self, other: Baseline) -> Self {
        Self {
            bytes: self.bytes.max(other.bytes),
            guilds: self.guilds.max(other.guilds),
        }
    }
}

/// Rejection reported when the document is missing but the floors are armed.
pub fn missing_file_rejection(armed: &Thresholds) -> Option<Rejection> {
    if armed.min_bytes > 0 {
        Some(Rejection::TooSmall {
            actual: 0,
            minimum: armed.min_bytes,
        })
    } else if armed.min_guilds > 0 {
        Some(Rejection::TooFewGuilds {
            actual: 0,
            minimum: armed.min_guilds,
        })
    } else {
        None
    }
}

/// A save candidate that failed validation, with the bytes kept for forensics.
#[derive(Debug)]
pub struct RejectedPayload {
    /// Failed check.
    pub reason: Rejection,
    /// Serialized candidate; empty when it could not be serialized.
    pub bytes: Vec<u8>,
}

/// Validate bytes read from disk and parse them into a document.
///
/// `stat_size` is the length reported by the file metadata before reading.
pub fn validate_for_load(
    path: &Path,
    raw: &[u8],
    stat_size: u64,
    thresholds: &Thresholds,
) -> StoreResult<Document> {
    let corrupted = |reason: Rejection| StoreError::CorruptedStore {
        path: path.to_path_buf(),
        reason,
    };

    if stat_size < thresholds.min_bytes {
        return Err(corrupted(Rejection::TooSmall {
            actual: stat_size,
            minimum: thresholds.min_bytes,
        }));
    }

    let read = raw.len() as u64;
    if read != stat_size {
        return Err(corrupted(Rejection::PartialRead {
            read,
            expected: stat_size,
        }));
    }

    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let serde_json::Value::Object(root) = value else {
        return Err(corrupted(Rejection::NotAnObject));
    };

    let document = Document::from(root);
    check_guild_count(&document, thresholds).map_err(corrupted)?;

    Ok(document)
}

/// Serialize a save candidate and check it against the floors.
pub fn validate_for_save(
    document: &Document,
    thresholds: &Thresholds,
) -> Result<Vec<u8>, RejectedPayload> {
    let bytes = serde_json::to_vec_pretty(document).map_err(|err| RejectedPayload {
        reason: Rejection::Unserializable(err.to_string()),
        bytes: Vec::new(),
    })?;

    let actual = bytes.len() as u64;
    if actual < thresholds.min_bytes {
        return Err(RejectedPayload {
            reason: Rejection::TooSmall {
                actual,
                minimum: thresholds.min_bytes,
            },
            bytes,
        });
    }

    if let Err(reason) = check_guild_count(document, thresholds) {
        return Err(RejectedPayload { reason, bytes });
    }

    Ok(bytes)
}

fn check_guild_count(document: &Document, thresholds: &Thresholds) -> Result<(), Rejection> {
    let actual = document.guild_count();
    if actual < thresholds.min_guilds {
        return Err(Rejection::TooFewGuilds {
            actual,
            minimum: thresholds.min_guilds,
        });
    }
    Ok(())
}
