//! Fault-injecting backend used by the store tests.

use std::{
    collections::HashSet,
    io,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use super::backend::{DocumentBackend, FsBackend};

/// A single failure to inject into the next matching operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `copy` fails.
    Copy,
    /// `write` fails before touching the file.
    Write,
    /// `write` persists only half of the bytes.
    ShortWrite,
    /// `rename` fails.
    Rename,
    /// `read` returns only half of the file.
    ShortRead,
    /// `read` fails.
    Read,
}

/// Filesystem backend whose operations can be made to fail on demand.
#[derive(Clone, Default)]
pub struct FaultyBackend {
    inner: FsBackend,
    faults: Arc<Mutex<HashSet<Fault>>>,
    reads: Arc<AtomicUsize>,
    paused: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl FaultyBackend {
    /// Backend with no faults armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `fault`; it stays armed until [`FaultyBackend::clear`].
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().insert(fault);
    }

    /// Disarm every fault.
    pub fn clear(&self) {
        self.faults.lock().unwrap().clear();
    }

    /// Hold every `write` issued from now on until [`FaultyBackend::resume_writes`].
    pub fn pause_writes(&self) {
        *self.paused.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Release the held writes.
    pub fn resume_writes(&self) {
        if let Some(gate) = self.paused.lock().unwrap().take() {
            gate.close();
        }
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn armed(&self, fault: Fault) -> bool {
        self.faults.lock().unwrap().contains(&fault)
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {what} failure"))
}

impl DocumentBackend for FaultyBackend {
    fn file_len(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Option<u64>>> {
        self.inner.file_len(path)
    }

    fn read(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.armed(Fault::Read) {
            return Box::pin(async { Err(injected("read")) });
        }
        let short = self.armed(Fault::ShortRead);
        let read = self.inner.read(path);
        Box::pin(async move {
            let mut bytes = read.await?;
            if short {
                bytes.truncate(bytes.len() / 2);
            }
            Ok(bytes)
        })
    }

    fn write(&self, path: PathBuf, mut bytes: Vec<u8>) -> BoxFuture<'static, io::Result<()>> {
        if self.armed(Fault::Write) {
            return Box::pin(async { Err(injected("write")) });
        }
        if self.armed(Fault::ShortWrite) {
            bytes.truncate(bytes.len() / 2);
        }
        let paused = self.paused.lock().unwrap().clone();
        let inner = self.inner;
        Box::pin(async move {
            if let Some(gate) = paused {
                // Closing the semaphore wakes every waiter with an error.
                let _ = gate.acquire().await;
            }
            inner.write(path, bytes).await
        })
    }

    fn copy(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<u64>> {
        if self.armed(Fault::Copy) {
            return Box::pin(async { Err(injected("copy")) });
        }
        self.inner.copy(from, to)
    }

    fn rename(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        if self.armed(Fault::Rename) {
            return Box::pin(async { Err(injected("rename")) });
        }
        self.inner.rename(from, to)
    }

    fn remove(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        self.inner.remove(path)
    }

    fn create_dir_all(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn list(&self, dir: PathBuf) -> BoxFuture<'static, io::Result<Vec<PathBuf>>> {
        self.inner.list(dir)
    }
}
