//! Async coordination primitives: cooperative cancellation and a
//! single-holder async mutex.

pub mod cancel;
pub mod mutex;

pub use cancel::CancellationToken;
pub use mutex::AsyncMutex;
