//! Fault collection shared by concurrently completing work items.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::Fault;

/// Faults in completion order plus the monotonic faulted flag.
#[derive(Debug, Default)]
pub(crate) struct FaultSet {
    faults: Mutex<Vec<Fault>>,
    faulted: AtomicBool,
}

impl FaultSet {
    pub fn record(&self, fault: Fault) {
        let mut faults = self.lock();
        faults.push(fault);
        self.faulted.store(true, Ordering::SeqCst);
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> Vec<Fault> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        let mut faults = self.lock();
        faults.clear();
        self.faulted.store(false, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Fault>> {
        // A panic while holding this lock cannot leave the Vec half-written.
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
