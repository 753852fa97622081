//! Work execution span helpers.
//!
//! Provides span creation and state-transition recording for work items
//! flowing through a queue.

use tracing::Span;

use crate::model::{WorkId, WorkState};

/// Start a span for a work item when it is queued.
///
/// The span covers the permit wait as well as execution. `work.state`
/// starts as `queued` and is updated via [`record_state_transition`].
pub fn start_work_span(work_id: &WorkId, label: Option<&str>) -> Span {
    tracing::info_span!(
        "work.execute",
        "work.id" = %work_id,
        "work.label" = label.unwrap_or(""),
        "work.state" = WorkState::Queued.as_str(),
    )
}

/// Record a state transition on the given span.
///
/// Updates `work.state` and emits a tracing `info` event scoped to the span.
pub fn record_state_transition(span: &Span, from: WorkState, to: WorkState) {
    span.record("work.state", to.as_str());
    span.in_scope(|| {
        tracing::info!(from = from.as_str(), to = to.as_str(), "state_transition");
    });
}
