//! Error types for workq.
//!
//! Work-item failures are not errors of the queue: they are captured as
//! [`Fault`](crate::model::Fault) values. This enum covers the queue's own
//! operations (waiting, configuration, telemetry setup).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("wait cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
