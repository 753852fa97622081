//! Single-holder async mutex for serializing critical sections.
//!
//! Waiters are suspended futures, not blocked threads. The lock is not
//! reentrant: calling [`AsyncMutex::run_exclusive`] on the same instance from
//! inside a critical section waits forever for a permit it already holds.

use std::future::Future;
use tokio::sync::Mutex;
use tracing::trace;

/// Serializes async critical sections across concurrent callers.
///
/// At most one critical section passed to [`run_exclusive`](Self::run_exclusive)
/// executes at any instant across all callers sharing an instance.
#[derive(Debug, Default)]
pub struct AsyncMutex {
    /// One permit. Held for the duration of a critical section.
    gate: Mutex<()>,
}

impl AsyncMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the permit, run `critical`, then release the permit.
    ///
    /// The permit is released however the section ends. An `Err` returned by
    /// the section is handed back unchanged; a panic resumes in the caller
    /// after the permit has been released.
    pub async fn run_exclusive<F, Fut, T>(&self, critical: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.gate.lock().await;
        trace!("async mutex acquired");
        critical().await
    }

    /// Run `critical` only if the permit is free right now.
    ///
    /// Returns `None` without running anything when another section holds it.
    pub async fn try_run_exclusive<F, Fut, T>(&self, critical: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Ok(_permit) = self.gate.try_lock() else {
            return None;
        };
        Some(critical().await)
    }

    /// Whether a critical section currently holds the permit.
    pub fn is_locked(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}
