//! File operations behind the document store.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};

use futures::future::BoxFuture;
use tokio::{fs, io::AsyncWriteExt};

/// File operations the document store performs, abstracted so tests can inject faults.
pub trait DocumentBackend: Send + Sync {
    /// Length of the file at `path`, or `None` when it does not exist.
    fn file_len(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Option<u64>>>;
    /// Whole contents of `path`.
    fn read(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Vec<u8>>>;
    /// Create or truncate `path` and write `bytes`, flushed to stable storage.
    fn write(&self, path: PathBuf, bytes: Vec<u8>) -> BoxFuture<'static, io::Result<()>>;
    /// Copy `from` over `to`, returning the bytes copied.
    fn copy(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<u64>>;
    /// Atomically replace `to` with `from`.
    fn rename(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<()>>;
    /// Delete the file at `path`.
    fn remove(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>>;
    /// Create `path` and any missing parents.
    fn create_dir_all(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>>;
    /// Entries directly inside `dir`.
    fn list(&self, dir: PathBuf) -> BoxFuture<'static, io::Result<Vec<PathBuf>>>;
}

/// Backend writing to the local filesystem through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBackend;

impl DocumentBackend for FsBackend {
    fn file_len(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Option<u64>>> {
        Box::pin(async move {
            match fs::metadata(&path).await {
                Ok(meta) => Ok(Some(meta.len())),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err),
            }
        })
    }

    fn read(&self, path: PathBuf) -> BoxFuture<'static, io::Result<Vec<u8>>> {
        Box::pin(async move { fs::read(&path).await })
    }

    fn write(&self, path: PathBuf, bytes: Vec<u8>) -> BoxFuture<'static, io::Result<()>> {
        Box::pin(async move {
            let mut file = fs::File::create(&path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await
        })
    }

    fn copy(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<u64>> {
        Box::pin(async move { fs::copy(&from, &to).await })
    }

    fn rename(&self, from: PathBuf, to: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        Box::pin(async move { fs::rename(&from, &to).await })
    }

    fn remove(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        Box::pin(async move { fs::remove_file(&path).await })
    }

    fn create_dir_all(&self, path: PathBuf) -> BoxFuture<'static, io::Result<()>> {
        Box::pin(async move { fs::create_dir_all(&path).await })
    }

    fn list(&self, dir: PathBuf) -> BoxFuture<'static, io::Result<Vec<PathBuf>>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(&dir).await?;
            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                paths.push(entry.path());
            }
            Ok(paths)
        })
    }
}
