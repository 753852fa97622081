//! In-flight accounting and the drain signal.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counts items that are queued or executing and wakes waiters when the
/// count returns to zero.
///
/// A drain is observed only while the count is zero; the epoch records how
/// many times the count has fallen to zero since construction or reset.
#[derive(Debug, Default)]
pub(crate) struct DrainState {
    in_flight: AtomicUsize,
    epoch: AtomicU64,
    notify: Notify,
}

impl DrainState {
    /// Count one more item. Called before the item waits for a permit.
    ///
    /// The count is given back when the returned guard drops, unless the
    /// item is committed to run, in which case the completing task calls
    /// [`leave`](Self::leave).
    pub fn enter(&self) -> Pending<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Pending {
            drain: self,
            armed: true,
        }
    }

    /// Count one item finished or withdrawn.
    pub fn leave(&self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "in-flight count underflow");
        if previous == 1 {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn is_drained(&self, wait_for_first: bool) -> bool {
        self.in_flight() == 0 && (!wait_for_first || self.epoch() > 0)
    }

    /// Resolve once nothing is in flight, and, with `wait_for_first`, at
    /// least one drain has happened.
    pub async fn wait(&self, wait_for_first: bool) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_drained(wait_for_first) {
                return;
            }
            notified.await;
        }
    }

    /// Forget all history. Only valid while nothing is in flight.
    pub fn reset(&self) {
        self.in_flight.store(0, Ordering::SeqCst);
        self.epoch.store(0, Ordering::SeqCst);
    }
}

/// An in-flight count held by a submission that has not been dispatched.
///
/// Dropping it (withdrawal, or the submitting future being dropped while
/// it waits for a permit) gives the count back.
#[must_use = "dropping the guard immediately releases the in-flight count"]
pub(crate) struct Pending<'a> {
    drain: &'a DrainState,
    armed: bool,
}

impl Pending<'_> {
    /// Hand the count over to the task that will run the item.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.drain.leave();
        }
    }
}
