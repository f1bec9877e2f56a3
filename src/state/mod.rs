//! Shared application state handed to every route.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{error, warn};

use crate::{dao::document_store::DocumentStore, error::ServiceError};

/// State handle shared by every route.
pub type SharedState = Arc<AppState>;
/// How long a request waits for its write before giving up.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state holding the guild document store.
pub struct AppState {
    store: Arc<DocumentStore>,
    write_timeout: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(store: Arc<DocumentStore>) -> SharedState {
        Self::with_write_timeout(store, DEFAULT_WRITE_TIMEOUT)
    }

    /// Same as [`AppState::new`] with a custom write deadline.
    pub fn with_write_timeout(store: Arc<DocumentStore>, write_timeout: Duration) -> SharedState {
        Arc::new(Self {
            store,
            write_timeout,
        })
    }

    /// The guild document store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Run a store write on its own task and wait for it at most `write_timeout`.
    ///
    /// A timed-out write keeps running to completion in the background, so the
    /// document in memory never falls behind the file.
    pub async fn run_write<F, Fut, T>(&self, label: &'static str, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(Arc<DocumentStore>) -> Fut,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(work(self.store.clone()));
        match timeout(self.write_timeout, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                error!(operation = label, error = %join_err, "store write task failed");
                Err(ServiceError::Internal(format!("{label} task failed")))
            }
            Err(_) => {
                warn!(
                    operation = label,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "store write still running after timeout"
                );
                Err(ServiceError::Timeout)
            }
        }
    }
}
