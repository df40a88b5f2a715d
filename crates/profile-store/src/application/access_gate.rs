//! AccessGate: one read-modify-write at a time, in arrival order.
//!
//! Two UI events fired back to back (say, two quick profile switches) would
//! otherwise both read the document, both modify their copy, and the second
//! write would silently drop the first one's change.  Every store operation
//! therefore runs inside [`AccessGate::with_lock`].
//!
//! # Guarantees
//!
//! - **Mutual exclusion** – at most one operation runs at a time.
//! - **FIFO admission** – waiters are admitted in the order they started
//!   waiting (`tokio::sync::Mutex` is fair).
//! - **No poisoning** – an operation that returns an error, or even panics,
//!   releases the gate for the next waiter.
//! - **Run to completion** – once admitted, the operation runs on its own
//!   task.  Dropping the caller's future after admission does not cancel it.
//!   Dropping it while still queued simply leaves the queue.
//!
//! There is no acquisition timeout: a storage call that hangs stalls every
//! queued operation behind it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Failure of the gate itself (never of the guarded operation).
#[derive(Debug, Error)]
pub enum GateError {
    /// The admitted operation's task panicked or was cancelled by the runtime.
    #[error("operation aborted: {0}")]
    Aborted(String),
}

/// FIFO mutual-exclusion boundary around the persisted document.
#[derive(Debug, Default)]
pub struct AccessGate {
    lock: Arc<Mutex<()>>,
    /// Ticket counter for log correlation.
    admitted: AtomicU64,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` once every earlier caller has finished.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error unchanged, or
    /// [`GateError::Aborted`] (converted into `E`) if the operation panicked.
    pub async fn with_lock<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<GateError> + Send + 'static,
    {
        let permit = Arc::clone(&self.lock).lock_owned().await;
        let ticket = self.admitted.fetch_add(1, Ordering::Relaxed);
        debug!(ticket, "gate admitted operation");

        let task = tokio::spawn(async move {
            // Released when the task ends, however it ends.
            let _permit = permit;
            operation().await
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(ticket, "gated operation aborted: {e}");
                Err(GateError::Aborted(e.to_string()).into())
            }
        }
    }
}
