//! # workq
//!
//! Bounded-concurrency async work queue for tokio.
//!
//! Provides a work queue with a fixed number of execution slots, drain
//! waiting, and fault aggregation ([`queue`]), an async mutex and
//! cancellation tokens ([`sync`]), and tracing/OpenTelemetry setup
//! ([`telemetry`]).
//!
//! ```no_run
//! # async fn demo() {
//! use workq::WorkQueue;
//!
//! let queue = WorkQueue::new(2usize);
//! for n in 0..5 {
//!     queue
//!         .submit(async move {
//!             if n == 3 {
//!                 anyhow::bail!("item {n} failed");
//!             }
//!             Ok(())
//!         })
//!         .await;
//! }
//! queue.wait_for_drain().await;
//! assert!(queue.is_faulted());
//! # }
//! ```

pub mod config;
pub mod error;
pub mod limits;
pub mod model;
pub mod queue;
pub mod sync;
pub mod telemetry;

pub use error::{Error, Result};
pub use limits::Limit;
pub use model::{Admission, Fault, FaultKind, Outcome, WorkId, WorkState};
pub use queue::{ResultHandle, SubmitOptions, WorkQueue};
pub use sync::{AsyncMutex, CancellationToken};
