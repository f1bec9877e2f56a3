//! Concurrent access layer over the single guild JSON document.
//!
//! One [`DocumentStore`] owns the in-memory document for the whole process. Every
//! disk operation (first load, each commit, backup restore) runs behind one fair
//! mutex, so writes reach the file in call order and never interleave. Reads of an
//! already loaded document never touch disk.
//!
//! The size and guild-count floors arm against a high-water mark persisted beside
//! the document (`<path>.watermark`). Loads and saves read the same mark, so the
//! store never commits a file it would refuse at the next start.
//!
//! Write futures must be driven to completion: dropping one midway can leave the
//! in-memory document behind the file. Callers that need a deadline should spawn
//! the operation and time out the wait instead.

pub mod backend;
pub mod cache;
pub mod config;
mod entities;
mod guild;
pub mod lifecycle;
pub mod path;
pub mod validator;
pub mod writer;

#[cfg(test)]
mod testing;

use std::{
    io::{self, ErrorKind},
    path::Path,
    sync::Arc,
};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dao::{
    models::Document,
    storage::{StoreError, StoreResult},
};

pub use self::guild::DeletionTicket;
use self::{
    backend::{DocumentBackend, FsBackend},
    cache::{CacheStats, ReadCache, entity_key},
    config::StoreConfig,
    lifecycle::{Lifecycle, Snapshot, StoreEvent, StorePhase},
    path::EntityPath,
    validator::{Baseline, RejectedPayload},
    writer::{AtomicWriter, BACKUP_SUFFIX, WATERMARK_SUFFIX, sibling},
};

struct Current {
    document: Arc<Document>,
    /// High-water mark the floors arm against.
    baseline: Baseline,
    /// Mark last persisted to the watermark file.
    recorded: Baseline,
}

struct FromDisk {
    document: Document,
    stats: Baseline,
    recorded: Baseline,
}

/// The guild document store shared by every collaborator.
pub struct DocumentStore {
    config: StoreConfig,
    backend: Arc<dyn DocumentBackend>,
    writer: AtomicWriter,
    cache: ReadCache,
    lifecycle: RwLock<Lifecycle>,
    current: RwLock<Option<Current>>,
    io_gate: Mutex<()>,
    deletions: DashMap<Uuid, DeletionTicket>,
}

impl DocumentStore {
    /// Store backed by the local filesystem.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_backend(config, Arc::new(FsBackend))
    }

    /// Store performing its file operations through `backend`.
    pub fn with_backend(config: StoreConfig, backend: Arc<dyn DocumentBackend>) -> Self {
        let writer = AtomicWriter::new(backend.clone(), config.snapshots.clone());
        Self {
            config,
            backend,
            writer,
            cache: ReadCache::new(),
            lifecycle: RwLock::new(Lifecycle::new()),
            current: RwLock::new(None),
            io_gate: Mutex::new(()),
            deletions: DashMap::new(),
        }
    }

    /// Configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Location of the guild document.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Current lifecycle phase and commit generation.
    pub async fn snapshot(&self) -> Snapshot {
        self.lifecycle.read().await.snapshot()
    }

    /// Counters of the read cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Return the loaded document, reading and validating the file on first use.
    ///
    /// Concurrent first calls share a single read. A document that fails
    /// validation moves the store to its failed phase for good.
    pub async fn load(&self) -> StoreResult<Arc<Document>> {
        if let Some(document) = self.current_document().await {
            return Ok(document);
        }

        let _gate = self.io_gate.lock().await;
        if let Some(document) = self.current_document().await {
            debug!("load coalesced with a concurrent caller");
            return Ok(document);
        }
        if let StorePhase::Failed(reason) = self.lifecycle.read().await.phase() {
            return Err(StoreError::Failed(reason));
        }

        self.transition(StoreEvent::LoadStarted).await?;
        match self.read_from_disk().await {
            Ok(FromDisk {
                document,
                stats,
                recorded,
            }) => {
                let document = Arc::new(document);
                let baseline = recorded.max(stats);
                *self.current.write().await = Some(Current {
                    document: document.clone(),
                    baseline,
                    recorded,
                });
                self.transition(StoreEvent::LoadCompleted).await?;
                info!(
                    path = %self.path().display(),
                    bytes = stats.bytes,
                    guilds = stats.guilds,
                    watermark_bytes = baseline.bytes,
                    watermark_guilds = baseline.guilds,
                    "guild document loaded"
                );
                Ok(document)
            }
            Err(err) if err.is_fatal_on_load() => {
                error!(
                    path = %self.path().display(),
                    error = %err,
                    min_bytes = self.config.thresholds.min_bytes,
                    min_guilds = self.config.thresholds.min_guilds,
                    "guild document failed validation; refusing to serve it"
                );
                self.transition(StoreEvent::LoadRejected(err.to_string()))
                    .await?;
                Err(err)
            }
            Err(err) => {
                warn!(path = %self.path().display(), error = %err, "guild document read failed");
                self.transition(StoreEvent::LoadAborted).await?;
                Err(err)
            }
        }
    }

    /// Validate and durably write `document`, replacing the current one.
    ///
    /// On rejection the caller keeps `document`; nothing on disk or in memory changes
    /// apart from the `.REJECTED` forensic copy.
    pub async fn save(&self, document: &Document) -> StoreResult<()> {
        self.load().await?;
        let _gate = self.io_gate.lock().await;
        self.commit_locked(document.clone()).await
    }

    /// Run `f` against a copy of the current document and commit the result.
    ///
    /// The whole read-modify-write happens behind the write gate, so concurrent
    /// transactions cannot lose each other's updates. Nothing is written when `f`
    /// fails or leaves the document unchanged.
    pub async fn mutate<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Document) -> StoreResult<T>,
    {
        self.load().await?;
        let _gate = self.io_gate.lock().await;
        let current = self.require_document().await?;

        let mut next = (*current).clone();
        let outcome = f(&mut next)?;
        if next != *current {
            self.commit_locked(next).await?;
        }
        Ok(outcome)
    }

    /// Value at `path` inside a guild record, served from the read cache when possible.
    pub async fn get_entity(&self, guild_id: &str, path: &EntityPath) -> StoreResult<Option<Value>> {
        self.cached_lookup(guild_id, Some(path)).await
    }

    /// Cached read of a whole guild (`path` of `None`) or of one value inside it.
    pub(crate) async fn cached_lookup(
        &self,
        guild_id: &str,
        path: Option<&EntityPath>,
    ) -> StoreResult<Option<Value>> {
        let rendered = path.map(ToString::to_string).unwrap_or_default();
        let key = entity_key(guild_id, &rendered);
        if let Some(value) = self.cache.get(&key) {
            return Ok(Some(value));
        }

        let generation = self.cache.generation();
        let document = self.load().await?;
        let value = document.guild(guild_id).and_then(|guild| match path {
            Some(path) => path.resolve(guild),
            None => Some(guild),
        });
        let value = value.cloned();

        if let Some(value) = &value {
            self.cache.insert(generation, key, value.clone());
        }
        Ok(value)
    }

    /// Replace the value at `path` with `mutator(previous)` and commit.
    ///
    /// Intermediate objects are created as needed; the guild itself must exist.
    pub async fn update_entity<F>(
        &self,
        guild_id: &str,
        path: &EntityPath,
        mutator: F,
    ) -> StoreResult<Value>
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        self.mutate(|document| {
            let guild = document
                .guild_mut(guild_id)
                .ok_or_else(|| StoreError::GuildNotFound(guild_id.to_owned()))?;
            let next = mutator(path.resolve(guild).cloned());
            path.assign(guild, next.clone())?;
            Ok(next)
        })
        .await
    }

    /// Roll the file and the in-memory document back to the `.backup` copy.
    ///
    /// The backup must pass load validation. It is written through a temp file and
    /// rename, and the backup itself is left in place.
    pub async fn restore_from_backup(&self) -> StoreResult<Arc<Document>> {
        self.load().await?;
        let _gate = self.io_gate.lock().await;

        let backup = sibling(self.path(), BACKUP_SUFFIX);
        let Some(stat_size) = self
            .backend
            .file_len(backup.clone())
            .await
            .map_err(|source| StoreError::io("reading backup metadata", &backup, source))?
        else {
            return Err(StoreError::io(
                "reading backup",
                backup,
                io::Error::from(ErrorKind::NotFound),
            ));
        };
        let raw = self
            .backend
            .read(backup.clone())
            .await
            .map_err(|source| StoreError::io("reading backup", &backup, source))?;
        let (baseline, recorded) = self.marks().await?;
        let armed = self.config.thresholds.armed_for(&baseline);
        let document = validator::validate_for_load(&backup, &raw, stat_size, &armed)?;

        self.transition(StoreEvent::SaveStarted).await?;
        let restored = Baseline::of(stat_size, &document);
        let result = self.writer.replace(self.path(), raw, armed.min_bytes).await;

        let document = Arc::new(document);
        if result.is_ok() {
            let baseline = baseline.max(restored);
            let recorded = self.record_watermark(baseline, recorded).await;
            self.install(document.clone(), baseline, recorded).await;
            warn!(
                path = %self.path().display(),
                bytes = restored.bytes,
                guilds = restored.guilds,
                "guild document restored from backup"
            );
        }
        self.transition(StoreEvent::SaveFinished {
            committed: result.is_ok(),
        })
        .await?;

        result.map(|()| document)
    }

    async fn current_document(&self) -> Option<Arc<Document>> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|current| current.document.clone())
    }

    async fn require_document(&self) -> StoreResult<Arc<Document>> {
        match self.current_document().await {
            Some(document) => Ok(document),
            None => Err(self.not_loaded(StoreEvent::SaveStarted).await),
        }
    }

    async fn not_loaded(&self, event: StoreEvent) -> StoreError {
        let from = self.lifecycle.read().await.phase();
        match from {
            StorePhase::Failed(reason) => StoreError::Failed(reason),
            from => lifecycle::InvalidTransition { from, event }.into(),
        }
    }

    async fn transition(&self, event: StoreEvent) -> StoreResult<StorePhase> {
        let mut lifecycle = self.lifecycle.write().await;
        Ok(lifecycle.apply(event)?)
    }

    async fn marks(&self) -> StoreResult<(Baseline, Baseline)> {
        match self.current.read().await.as_ref() {
            Some(current) => Ok((current.baseline, current.recorded)),
            None => Err(self.not_loaded(StoreEvent::SaveStarted).await),
        }
    }

    /// Persisted high-water mark; the default (nothing armed) when none was recorded.
    async fn read_watermark(&self) -> StoreResult<Baseline> {
        let path = sibling(self.path(), WATERMARK_SUFFIX);
        let stat = self
            .backend
            .file_len(path.clone())
            .await
            .map_err(|source| StoreError::io("reading watermark metadata", &path, source))?;
        if stat.is_none() {
            return Ok(Baseline::default());
        }

        let raw = self
            .backend
            .read(path.clone())
            .await
            .map_err(|source| StoreError::io("reading watermark", &path, source))?;
        match serde_json::from_slice(&raw) {
            Ok(mark) => Ok(mark),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable watermark ignored");
                Ok(Baseline::default())
            }
        }
    }

    async fn read_from_disk(&self) -> StoreResult<FromDisk> {
        let path = self.path();
        let recorded = self.read_watermark().await?;
        let armed = self.config.thresholds.armed_for(&recorded);
        let stat = self
            .backend
            .file_len(path.to_path_buf())
            .await
            .map_err(|source| StoreError::io("reading document metadata", path, source))?;

        let Some(stat_size) = stat else {
            if let Some(reason) = validator::missing_file_rejection(&armed) {
                return Err(StoreError::CorruptedStore {
                    path: path.to_path_buf(),
                    reason,
                });
            }
            info!(path = %path.display(), "no document on disk; starting empty");
            return Ok(FromDisk {
                document: Document::new(),
                stats: Baseline::default(),
                recorded,
            });
        };

        let raw = self
            .backend
            .read(path.to_path_buf())
            .await
            .map_err(|source| StoreError::io("reading document", path, source))?;
        let document = validator::validate_for_load(path, &raw, stat_size, &armed)?;
        let stats = Baseline::of(stat_size, &document);
        Ok(FromDisk {
            document,
            stats,
            recorded,
        })
    }

    /// Validate, write and install `next`. The caller must hold `io_gate`.
    async fn commit_locked(&self, next: Document) -> StoreResult<()> {
        let (baseline, recorded) = self.marks().await?;

        self.transition(StoreEvent::SaveStarted).await?;
        let result = self.write_validated(&next, baseline).await;
        let committed = result.is_ok();
        if let Ok(written) = result.as_ref() {
            let baseline = baseline.max(*written);
            let recorded = self.record_watermark(baseline, recorded).await;
            self.install(Arc::new(next), baseline, recorded).await;
        }
        self.transition(StoreEvent::SaveFinished { committed }).await?;

        result.map(|_| ())
    }

    /// Persist `mark` if it moved past `recorded`; returns the mark now on disk.
    ///
    /// Runs after the document rename, so a failure here leaves the floors less
    /// strict than they could be, never stricter than the file on disk.
    async fn record_watermark(&self, mark: Baseline, recorded: Baseline) -> Baseline {
        if mark == recorded {
            return recorded;
        }
        match self.writer.record_watermark(self.path(), mark).await {
            Ok(()) => {
                debug!(bytes = mark.bytes, guilds = mark.guilds, "watermark recorded");
                mark
            }
            Err(err) => {
                warn!(
                    error = %err,
                    bytes = mark.bytes,
                    guilds = mark.guilds,
                    "could not record watermark"
                );
                recorded
            }
        }
    }

    async fn write_validated(&self, next: &Document, baseline: Baseline) -> StoreResult<Baseline> {
        let armed = self.config.thresholds.armed_for(&baseline);
        let bytes = match validator::validate_for_save(next, &armed) {
            Ok(bytes) => bytes,
            Err(RejectedPayload { reason, bytes }) => {
                warn!(
                    path = %self.path().display(),
                    %reason,
                    candidate_bytes = bytes.len(),
                    candidate_guilds = next.guild_count(),
                    watermark_bytes = baseline.bytes,
                    watermark_guilds = baseline.guilds,
                    min_bytes = armed.min_bytes,
                    min_guilds = armed.min_guilds,
                    "save rejected; on-disk document left untouched"
                );
                if !bytes.is_empty() {
                    match self.writer.write_rejected(self.path(), bytes).await {
                        Ok(target) => info!(path = %target.display(), "rejected payload kept"),
                        Err(err) => warn!(error = %err, "could not keep rejected payload"),
                    }
                }
                return Err(StoreError::ValidationRejected { reason });
            }
        };

        let written = Baseline::of(bytes.len() as u64, next);
        self.writer
            .commit(self.path(), bytes, armed.min_bytes)
            .await?;
        info!(
            path = %self.path().display(),
            bytes = written.bytes,
            guilds = written.guilds,
            watermark_bytes = baseline.bytes,
            "guild document committed"
        );
        Ok(written)
    }

    /// Swap in a committed document, then invalidate the read cache.
    async fn install(&self, document: Arc<Document>, baseline: Baseline, recorded: Baseline) {
        *self.current.write().await = Some(Current {
            document,
            baseline,
            recorded,
        });
        self.cache.invalidate_all();
    }
}
