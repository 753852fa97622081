//! Metric instrument factories for workq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"workq"` meter; without a
//! registered provider they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for workq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workq")
}

/// Counter: submissions by result.
/// Labels: `result` ("admitted" | "rejected" | "withdrawn").
pub fn work_submitted() -> Counter<u64> {
    meter()
        .u64_counter("workq.work.submitted")
        .with_description("Number of work item submissions")
        .build()
}

/// Counter: completed work items.
/// Labels: `outcome` ("ok" | "failed" | "panicked" | "aborted").
pub fn work_completed() -> Counter<u64> {
    meter()
        .u64_counter("workq.work.completed")
        .with_description("Number of completed work items")
        .build()
}

/// Histogram: work item run time in milliseconds, admission to completion.
pub fn work_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workq.work.duration_ms")
        .with_description("Work item run time in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: queue resets.
/// Labels: `limit`.
pub fn queue_resets() -> Counter<u64> {
    meter()
        .u64_counter("workq.queue.resets")
        .with_description("Number of queue resets")
        .build()
}
