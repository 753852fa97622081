//! Core data model.
//!
//! A work item is a deferred computation handed to a [`WorkQueue`]. It is
//! identified by a [`WorkId`], moves through [`WorkState`]s, and either
//! completes cleanly or completes with a [`Fault`] attached.
//!
//! [`WorkQueue`]: crate::queue::WorkQueue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Work item lifecycle. There is no separate failed state: a fault is data
/// attached to the `Completed` transition.
///
/// ```text
/// Queued → Admitted → Running → Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Counted as in flight, waiting for an admission permit.
    Queued,
    /// Holds a permit, handed to the runtime.
    Admitted,
    /// Executing.
    Running,
    /// Finished, successfully or with a fault.
    Completed,
}

impl WorkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkState::Queued => "queued",
            WorkState::Admitted => "admitted",
            WorkState::Running => "running",
            WorkState::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The item holds a permit and has been handed off for execution.
    Admitted(WorkId),
    /// The cancellation token was already triggered (or, for
    /// `try_submit`, no permit was free). Nothing was counted or run.
    Rejected,
    /// The token fired while the item waited for a permit. The item was
    /// withdrawn without running or faulting.
    Withdrawn,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    pub fn work_id(&self) -> Option<WorkId> {
        match self {
            Admission::Admitted(id) => Some(*id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// Why a work item faulted.
#[derive(Debug, Clone)]
pub enum FaultKind {
    /// The item returned an error.
    Failed(Arc<anyhow::Error>),
    /// The item panicked. Carries the panic message when it was a string.
    Panicked(String),
    /// The runtime dropped the item before it finished (shutdown).
    Aborted,
}

/// A captured work item failure.
#[derive(Debug, Clone)]
pub struct Fault {
    pub work_id: WorkId,
    pub label: Option<String>,
    pub kind: FaultKind,
    pub at: DateTime<Utc>,
}

impl Fault {
    pub fn failed(work_id: WorkId, label: Option<String>, error: anyhow::Error) -> Self {
        Self {
            work_id,
            label,
            kind: FaultKind::Failed(Arc::new(error)),
            at: Utc::now(),
        }
    }

    pub fn panicked(work_id: WorkId, label: Option<String>, message: String) -> Self {
        Self {
            work_id,
            label,
            kind: FaultKind::Panicked(message),
            at: Utc::now(),
        }
    }

    pub fn aborted(work_id: WorkId, label: Option<String>) -> Self {
        Self {
            work_id,
            label,
            kind: FaultKind::Aborted,
            at: Utc::now(),
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.kind, FaultKind::Panicked(_))
    }

    /// The underlying error, if the item returned one.
    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.kind {
            FaultKind::Failed(e) => Some(&**e),
            FaultKind::Panicked(_) | FaultKind::Aborted => None,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            FaultKind::Failed(e) => format!("{e:#}"),
            FaultKind::Panicked(msg) => format!("panicked: {msg}"),
            FaultKind::Aborted => "aborted before completion".to_string(),
        }
    }

    pub fn report(&self) -> FaultReport {
        FaultReport {
            work_id: self.work_id.0,
            label: self.label.clone(),
            panicked: self.is_panic(),
            message: self.message(),
            at: self.at,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "work {} ({label}): {}", self.work_id, self.message()),
            None => write!(f, "work {}: {}", self.work_id, self.message()),
        }
    }
}

/// Serializable view of a [`Fault`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultReport {
    pub work_id: Uuid,
    pub label: Option<String>,
    pub panicked: bool,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Per-item result: success or the captured fault.
pub type Outcome<T = ()> = std::result::Result<T, Fault>;
