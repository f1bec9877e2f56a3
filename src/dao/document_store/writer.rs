//! Backup, snapshot and atomic replacement of the document file.

use std::{
    ffi::OsString,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};

use time::{OffsetDateTime, macros::format_description};
use tracing::{debug, info, warn};

use super::{backend::DocumentBackend, validator::Baseline};
use crate::dao::storage::{StoreError, StoreResult};

/// Suffix of the copy of the previous good document.
pub const BACKUP_SUFFIX: &str = ".backup";
/// Suffix of the staging file renamed over the document.
pub const TEMP_SUFFIX: &str = ".tmp";
/// Suffix of the file holding the most recently refused save.
pub const REJECTED_SUFFIX: &str = ".REJECTED";
/// Suffix of the file recording the largest document ever committed.
pub const WATERMARK_SUFFIX: &str = ".watermark";

/// `path` with `suffix` appended to its file name.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Where timestamped copies of the previous document go, and how many to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPolicy {
    /// Directory holding the copies.
    pub dir: PathBuf,
    /// Newest copies kept; older ones are pruned.
    pub retain: usize,
}

/// Commits serialized documents with backup, temp write, verification and atomic rename.
#[derive(Clone)]
pub struct AtomicWriter {
    backend: Arc<dyn DocumentBackend>,
    snapshots: Option<SnapshotPolicy>,
}

impl AtomicWriter {
    /// Writer over `backend`, taking snapshots when a policy is given.
    pub fn new(backend: Arc<dyn DocumentBackend>, snapshots: Option<SnapshotPolicy>) -> Self {
        Self { backend, snapshots }
    }

    /// Back up the current file, then replace it with `bytes`.
    ///
    /// `path` is untouched unless the final rename succeeds.
    pub async fn commit(&self, path: &Path, bytes: Vec<u8>, min_bytes: u64) -> StoreResult<()> {
        self.backup_previous(path).await;
        self.replace(path, bytes, min_bytes).await
    }

    /// Replace the file with `bytes` through a verified temp file, without taking a backup.
    pub async fn replace(&self, path: &Path, bytes: Vec<u8>, min_bytes: u64) -> StoreResult<()> {
        let tmp = sibling(path, TEMP_SUFFIX);
        let expected = bytes.len() as u64;

        if let Err(source) = self.backend.write(tmp.clone(), bytes).await {
            self.discard(&tmp).await;
            return Err(StoreError::io("writing temp file", tmp, source));
        }

        let written = match self.backend.file_len(tmp.clone()).await {
            Ok(len) => len.unwrap_or(0),
            Err(source) => {
                self.discard(&tmp).await;
                return Err(StoreError::io("checking temp file", tmp, source));
            }
        };

        if written < min_bytes || written != expected {
            warn!(
                path = %tmp.display(),
                written,
                expected,
                min_bytes,
                "temp file failed verification; discarding"
            );
            self.discard(&tmp).await;
            let source = io::Error::new(
                ErrorKind::InvalidData,
                format!("temp file holds {written} bytes, expected {expected}"),
            );
            return Err(StoreError::io("verifying temp file", tmp, source));
        }

        if let Err(source) = self.backend.rename(tmp.clone(), path.to_path_buf()).await {
            self.discard(&tmp).await;
            return Err(StoreError::io("renaming temp file", path, source));
        }

        debug!(path = %path.display(), bytes = written, "document replaced");
        Ok(())
    }

    /// Atomically record `mark` as the high-water mark of the document at `path`.
    pub async fn record_watermark(&self, path: &Path, mark: Baseline) -> StoreResult<()> {
        let target = sibling(path, WATERMARK_SUFFIX);
        let bytes = serde_json::to_vec(&mark).map_err(|err| {
            StoreError::io("encoding watermark", &target, io::Error::other(err))
        })?;
        self.replace(&target, bytes, 0).await
    }

    /// Persist a refused payload next to the document, replacing the previous one.
    pub async fn write_rejected(&self, path: &Path, bytes: Vec<u8>) -> io::Result<PathBuf> {
        let target = sibling(path, REJECTED_SUFFIX);
        self.backend.write(target.clone(), bytes).await?;
        Ok(target)
    }

    async fn backup_previous(&self, path: &Path) {
        match self.backend.file_len(path.to_path_buf()).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not stat document before backup");
                return;
            }
        }

        let backup = sibling(path, BACKUP_SUFFIX);
        if let Err(err) = self.backend.copy(path.to_path_buf(), backup.clone()).await {
            // Best effort: a stale backup never blocks the write.
            warn!(
                path = %backup.display(),
                error = %err,
                "backup copy failed; continuing with write"
            );
        }

        if let Some(policy) = &self.snapshots {
            match self.snapshot(path, policy).await {
                Ok(target) => debug!(path = %target.display(), "timestamped snapshot written"),
                Err(err) => warn!(
                    dir = %policy.dir.display(),
                    error = %err,
                    "timestamped snapshot failed"
                ),
            }
        }
    }

    async fn snapshot(&self, path: &Path, policy: &SnapshotPolicy) -> io::Result<PathBuf> {
        let stem = snapshot_stem(path);
        let stamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year][month][day]T[hour][minute][second][subsecond digits:3]Z"
            ))
            .map_err(io::Error::other)?;

        self.backend.create_dir_all(policy.dir.clone()).await?;
        let target = policy.dir.join(format!("{stem}-{stamp}.json"));
        self.backend.copy(path.to_path_buf(), target.clone()).await?;

        let pruned = self.prune(policy, &stem).await?;
        if pruned > 0 {
            info!(dir = %policy.dir.display(), pruned, "pruned old snapshots");
        }
        Ok(target)
    }

    async fn prune(&self, policy: &SnapshotPolicy, stem: &str) -> io::Result<usize> {
        let prefix = format!("{stem}-");
        let mut snapshots: Vec<PathBuf> = self
            .backend
            .list(policy.dir.clone())
            .await?
            .into_iter()
            .filter(|entry| {
                entry
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".json"))
            })
            .collect();

        if snapshots.len() <= policy.retain {
            return Ok(0);
        }

        // Timestamps sort lexically, oldest first.
        snapshots.sort();
        let excess = snapshots.len() - policy.retain;
        for stale in snapshots.into_iter().take(excess) {
            self.backend.remove(stale).await?;
        }
        Ok(excess)
    }

    async fn discard(&self, tmp: &Path) {
        if let Err(err) = self.backend.remove(tmp.to_path_buf()).await
            && err.kind() != ErrorKind::NotFound
        {
            warn!(path = %tmp.display(), error = %err, "failed to remove temp file");
        }
    }
}

fn snapshot_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_owned()
}
