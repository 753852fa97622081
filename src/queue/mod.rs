//! Bounded work queue.
//!
//! Callers submit async work items; at most `concurrency_limit` of them run
//! at once. Each item is counted as in flight from the moment it is
//! submitted until it completes, so [`WorkQueue::wait_for_drain`] never
//! returns while anything is still queued or running. Failures inside items
//! are contained: they are collected as [`Fault`]s and never reach the
//! submitter.
//!
//! Admission order among submitters blocked on a full queue is whatever the
//! underlying semaphore provides; no FIFO guarantee is made.

mod drain;
mod faults;
mod handle;

pub use handle::ResultHandle;

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};
use tracing::{Instrument, Span, debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::limits::Limit;
use crate::model::{Admission, Fault, FaultKind, Outcome, WorkId, WorkState};
use crate::sync::CancellationToken;
use crate::telemetry::metrics;
use crate::telemetry::work::{record_state_transition, start_work_span};

use drain::DrainState;
use faults::FaultSet;

/// Per-submission options.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Human-readable name carried into spans and faults.
    pub label: Option<String>,
    /// Withdraws the item if triggered before it is admitted.
    pub cancel: Option<CancellationToken>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// An item that holds a permit and is counted as in flight, ready to run.
struct Admitted {
    work_id: WorkId,
    permit: OwnedSemaphorePermit,
    /// Opened when the item was queued.
    span: Span,
}

struct Shared {
    /// Admission gate. Swapped wholesale on reset.
    gate: RwLock<Arc<Semaphore>>,
    limit: AtomicUsize,
    wait_for_first: AtomicBool,
    drain: DrainState,
    faults: FaultSet,
}

/// Bounded-concurrency async work queue.
///
/// Cloning is cheap; clones share the same gate, counters and faults.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(Limit::Default)
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("concurrency_limit", &self.concurrency_limit())
            .field("in_flight", &self.in_flight())
            .field("is_faulted", &self.is_faulted())
            .finish()
    }
}

impl WorkQueue {
    /// Create a queue. Zero or absurdly large limits resolve to the
    /// hardware concurrency.
    pub fn new(limit: impl Into<Limit>) -> Self {
        let permits = limit.into().resolve();
        Self {
            shared: Arc::new(Shared {
                gate: RwLock::new(Arc::new(Semaphore::new(permits))),
                limit: AtomicUsize::new(permits),
                wait_for_first: AtomicBool::new(true),
                drain: DrainState::default(),
                faults: FaultSet::default(),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.concurrency).with_wait_for_first(config.wait_for_first_submission)
    }

    /// Set the drain mode used by [`wait_for_drain`](Self::wait_for_drain).
    pub fn with_wait_for_first(self, wait_for_first: bool) -> Self {
        self.shared
            .wait_for_first
            .store(wait_for_first, Ordering::SeqCst);
        self
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a work item with default options.
    ///
    /// Returns once the item holds a permit and has been handed to the
    /// runtime, not when it finishes.
    pub async fn submit<Fut, E>(&self, work: Fut) -> Admission
    where
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        self.submit_with(work, SubmitOptions::default()).await
    }

    /// Submit a work item.
    ///
    /// An already-cancelled token rejects the item without counting it. A
    /// token that fires while the item waits for a permit withdraws it.
    pub async fn submit_with<Fut, E>(&self, work: Fut, options: SubmitOptions) -> Admission
    where
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        match self.admit(&options).await {
            Ok(admitted) => {
                let work_id = admitted.work_id;
                self.dispatch(admitted, options.label, work, |_| {});
                Admission::Admitted(work_id)
            }
            Err(admission) => admission,
        }
    }

    /// Submit a work item only if a permit is free right now.
    ///
    /// Never waits. Returns [`Admission::Rejected`] when the queue is full.
    pub fn try_submit<Fut, E>(&self, work: Fut, options: SubmitOptions) -> Admission
    where
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return self.reject();
        }
        let Ok(permit) = self.gate().try_acquire_owned() else {
            return self.reject();
        };

        self.shared.drain.enter().commit();
        let work_id = WorkId::new();
        let span = start_work_span(&work_id, options.label.as_deref());
        record_submitted("admitted");
        let admitted = Admitted {
            work_id,
            permit,
            span,
        };
        self.dispatch(admitted, options.label, work, |_| {});
        Admission::Admitted(work_id)
    }

    /// Submit a work item that produces a value.
    ///
    /// On admission returns a handle resolving to the item's value or its
    /// fault. Faults are recorded by the queue as well. On rejection or
    /// withdrawal returns the [`Admission`] instead.
    pub async fn submit_value<T, Fut, E>(
        &self,
        work: Fut,
        options: SubmitOptions,
    ) -> std::result::Result<ResultHandle<T>, Admission>
    where
        T: Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let admitted = self.admit(&options).await?;
        let work_id = admitted.work_id;
        let (tx, rx) = oneshot::channel();
        self.dispatch(admitted, options.label.clone(), work, move |outcome| {
            // The receiver may have been dropped; the queue keeps the fault.
            let _ = tx.send(outcome);
        });
        Ok(ResultHandle::new(work_id, options.label, rx))
    }

    /// Count the item, then wait for a permit unless cancelled.
    ///
    /// The count is released if the returned future is dropped before a
    /// permit arrives.
    async fn admit(
        &self,
        options: &SubmitOptions,
    ) -> std::result::Result<Admitted, Admission> {
        let cancel = options.cancel.as_ref();
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(self.reject());
        }

        let pending = self.shared.drain.enter();
        let work_id = WorkId::new();
        let span = start_work_span(&work_id, options.label.as_deref());
        let gate = self.gate();

        let acquire = gate.acquire_owned().instrument(span.clone());
        let permit = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = acquire => permit.ok(),
            },
            None => acquire.await.ok(),
        };

        match permit {
            Some(permit) if !cancel.is_some_and(CancellationToken::is_cancelled) => {
                pending.commit();
                record_submitted("admitted");
                Ok(Admitted {
                    work_id,
                    permit,
                    span,
                })
            }
            _ => {
                // A permit acquired after cancellation is released here.
                span.in_scope(|| debug!("submission withdrawn while waiting for a permit"));
                drop(pending);
                record_submitted("withdrawn");
                Err(Admission::Withdrawn)
            }
        }
    }

    fn reject(&self) -> Admission {
        debug!("submission rejected");
        record_submitted("rejected");
        Admission::Rejected
    }

    /// Hand an admitted item to the runtime.
    ///
    /// The item runs in its own task so a panic is caught by its join
    /// handle. The supervising task records the outcome, decrements the
    /// in-flight count and only then releases the permit.
    fn dispatch<T, Fut, E, C>(
        &self,
        admitted: Admitted,
        label: Option<String>,
        work: Fut,
        on_complete: C,
    ) where
        T: Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        C: FnOnce(Outcome<T>) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let Admitted {
            work_id,
            permit,
            span,
        } = admitted;
        record_state_transition(&span, WorkState::Queued, WorkState::Admitted);

        let supervisor = async move {
            let span = Span::current();
            let started = Instant::now();
            record_state_transition(&span, WorkState::Admitted, WorkState::Running);

            let joined = tokio::spawn(work.instrument(span.clone())).await;
            let outcome = match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(Fault::failed(work_id, label, e.into())),
                Err(e) if e.is_panic() => Err(Fault::panicked(
                    work_id,
                    label,
                    panic_message(e.into_panic()),
                )),
                Err(_) => Err(Fault::aborted(work_id, label)),
            };

            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            let result = match &outcome {
                Ok(_) => "ok",
                Err(fault) => {
                    warn!(%fault, duration_ms, "work item faulted");
                    shared.faults.record(fault.clone());
                    match fault.kind {
                        FaultKind::Failed(_) => "failed",
                        FaultKind::Panicked(_) => "panicked",
                        FaultKind::Aborted => "aborted",
                    }
                }
            };
            metrics::work_completed().add(1, &[KeyValue::new("outcome", result)]);
            metrics::work_duration_ms().record(duration_ms, &[]);
            record_state_transition(&span, WorkState::Running, WorkState::Completed);

            on_complete(outcome);
            shared.drain.leave();
            drop(permit);
        };

        tokio::spawn(supervisor.instrument(span));
    }

    // -----------------------------------------------------------------------
    // Drain
    // -----------------------------------------------------------------------

    /// Wait until nothing is in flight, using the queue's drain mode
    /// (by default, at least one submission must have drained).
    pub async fn wait_for_drain(&self) {
        let wait_for_first = self.shared.wait_for_first.load(Ordering::SeqCst);
        self.shared.drain.wait(wait_for_first).await;
    }

    /// Wait until nothing is in flight.
    ///
    /// With `wait_for_first`, a queue that has never drained keeps waiting
    /// until its first wave of work completes. Cancelling `cancel` stops the
    /// wait with [`Error::Cancelled`]; queued work is unaffected.
    pub async fn wait_for_drain_with(
        &self,
        wait_for_first: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = self.shared.drain.wait(wait_for_first) => Ok(()),
                _ = token.cancelled() => Err(Error::Cancelled),
            },
            None => {
                self.shared.drain.wait(wait_for_first).await;
                Ok(())
            }
        }
    }

    /// Like [`wait_for_drain_with`](Self::wait_for_drain_with), giving up
    /// with [`Error::Timeout`] after `timeout`.
    pub async fn wait_for_drain_timeout(
        &self,
        wait_for_first: bool,
        timeout: Duration,
    ) -> Result<()> {
        tokio::time::timeout(timeout, self.shared.drain.wait(wait_for_first))
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    /// Drain, then reinitialize with a new limit.
    ///
    /// Clears the faulted flag, the fault collection and the drain history.
    /// Callers must not submit concurrently with a reset.
    pub async fn reset(&self, limit: impl Into<Limit>) {
        let permits = limit.into().resolve();
        self.shared.drain.wait(false).await;

        *self
            .shared
            .gate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(Semaphore::new(permits));
        self.shared.limit.store(permits, Ordering::SeqCst);
        self.shared.drain.reset();
        self.shared.faults.clear();

        info!(limit = permits, "work queue reset");
        metrics::queue_resets().add(1, &[KeyValue::new("limit", permits as i64)]);
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Whether any item has faulted since construction or the last reset.
    pub fn is_faulted(&self) -> bool {
        self.shared.faults.is_faulted()
    }

    /// Snapshot of collected faults, in completion order.
    pub fn faults(&self) -> Vec<Fault> {
        self.shared.faults.snapshot()
    }

    pub fn fault_count(&self) -> usize {
        self.shared.faults.len()
    }

    /// Items submitted and not yet completed or withdrawn.
    pub fn in_flight(&self) -> usize {
        self.shared.drain.in_flight()
    }

    /// Number of times the in-flight count has fallen to zero since
    /// construction or the last reset.
    pub fn drain_count(&self) -> u64 {
        self.shared.drain.epoch()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.shared.limit.load(Ordering::SeqCst)
    }

    pub fn available_permits(&self) -> usize {
        self.gate().available_permits()
    }

    fn gate(&self) -> Arc<Semaphore> {
        Arc::clone(&self.shared.gate.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn record_submitted(result: &'static str) {
    metrics::work_submitted().add(1, &[KeyValue::new("result", result)]);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
