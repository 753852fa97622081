//! Result handle for work items that produce a value.

use tokio::sync::oneshot;

use crate::model::{Fault, Outcome, WorkId};

/// Resolves to the value produced by a work item submitted with
/// [`WorkQueue::submit_value`](super::WorkQueue::submit_value).
///
/// Dropping the handle does not cancel the item; its fault, if any, is
/// still recorded by the queue.
#[derive(Debug)]
pub struct ResultHandle<T> {
    work_id: WorkId,
    label: Option<String>,
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> ResultHandle<T> {
    pub(crate) fn new(
        work_id: WorkId,
        label: Option<String>,
        rx: oneshot::Receiver<Outcome<T>>,
    ) -> Self {
        Self { work_id, label, rx }
    }

    pub fn work_id(&self) -> WorkId {
        self.work_id
    }

    /// Wait for the item to complete.
    pub async fn outcome(self) -> Outcome<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Fault::aborted(self.work_id, self.label)),
        }
    }
}
