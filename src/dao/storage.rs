use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dao::document_store::lifecycle::InvalidTransition;

/// Result alias for guild document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Why the validator refused a document, on load or on save.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The document is smaller than the configured byte floor.
    #[error("document is {actual} bytes, below the {minimum} byte minimum")]
    TooSmall { actual: u64, minimum: u64 },
    /// Fewer bytes were read than the file metadata reported.
    #[error("read {read} bytes but the file reports {expected}")]
    PartialRead { read: u64, expected: u64 },
    /// The document holds fewer guild records than the configured floor.
    #[error("document holds {actual} guilds, below the minimum of {minimum}")]
    TooFewGuilds { actual: usize, minimum: usize },
    /// The JSON root is something other than an object.
    #[error("document root is not a JSON object")]
    NotAnObject,
    /// The candidate could not be serialized at all.
    #[error("document could not be serialized: {0}")]
    Unserializable(String),
}

/// Error raised by the guild document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bytes on disk are not valid JSON.
    #[error("failed to parse `{path}` as JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Size or structural validation failed while loading.
    #[error("document store at `{path}` is corrupted: {reason}")]
    CorruptedStore { path: PathBuf, reason: Rejection },
    /// An earlier load failed validation; the store refuses to serve.
    #[error("document store failed to load and refuses service: {0}")]
    Failed(String),
    /// A save candidate failed validation and was not committed.
    #[error("refused to save document: {reason}")]
    ValidationRejected { reason: Rejection },
    /// The operating system rejected a file operation.
    #[error("{op} failed for `{path}`")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// No record exists for the guild.
    #[error("guild `{0}` not found")]
    GuildNotFound(String),
    /// The identifier does not have the shape of a guild snowflake.
    #[error("invalid guild identifier `{0}`")]
    InvalidGuildId(String),
    /// The entity path is malformed or crosses a non-object value.
    #[error("invalid entity path `{0}`")]
    InvalidPath(String),
    /// A stored value does not match the typed record expected at `path`.
    #[error("value at `{path}` does not match the expected shape")]
    Shape {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The operation is not valid in the current lifecycle phase.
    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),
}

impl StoreError {
    /// Wrap an I/O failure with the operation and path that produced it.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error, raised while loading, must put the store in its terminal failed phase.
    pub fn is_fatal_on_load(&self) -> bool {
        matches!(
            self,
            StoreError::Parse { .. } | StoreError::CorruptedStore { .. }
        )
    }
}
