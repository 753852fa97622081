//! Concurrency limits for the admission gate.
//!
//! A limit is either an explicit positive number of execution slots or the
//! hardware default. Anything that cannot be a sensible slot count
//! (zero, negative, absurdly large) resolves to the hardware default.

use serde::{Deserialize, Serialize};
use std::num::NonZero;

/// Largest limit honoured as given. Larger requests fall back to the
/// hardware default.
pub const MAX_CONCURRENCY_LIMIT: usize = 1 << 16;

/// Requested concurrency for a [`WorkQueue`](crate::queue::WorkQueue).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Limit {
    /// Use the number of hardware execution contexts.
    #[default]
    Default,

    /// At most this many items run at once.
    Max(NonZero<usize>),
}

impl Limit {
    /// Resolve to a concrete number of permits.
    pub fn resolve(self) -> usize {
        match self {
            Limit::Max(max) if max.get() <= MAX_CONCURRENCY_LIMIT => max.get(),
            _ => hardware_concurrency(),
        }
    }
}

impl From<usize> for Limit {
    fn from(value: usize) -> Self {
        NonZero::new(value).map(Limit::Max).unwrap_or(Limit::Default)
    }
}

impl From<i64> for Limit {
    fn from(value: i64) -> Self {
        usize::try_from(value)
            .map(Limit::from)
            .unwrap_or(Limit::Default)
    }
}

impl From<Limit> for i64 {
    fn from(value: Limit) -> Self {
        match value {
            Limit::Default => 0,
            Limit::Max(max) => i64::try_from(max.get()).unwrap_or(i64::MAX),
        }
    }
}

/// Number of hardware execution contexts, at least 1.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZero::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_limit_is_kept() {
        assert_eq!(Limit::from(5usize).resolve(), 5);
        assert_eq!(Limit::from(MAX_CONCURRENCY_LIMIT).resolve(), MAX_CONCURRENCY_LIMIT);
    }

    #[test]
    fn non_positive_limits_use_hardware_default() {
        assert_eq!(Limit::from(0usize), Limit::Default);
        assert_eq!(Limit::from(-4i64), Limit::Default);
        assert_eq!(Limit::from(0i64).resolve(), hardware_concurrency());
    }

    #[test]
    fn oversized_limits_use_hardware_default() {
        assert_eq!(Limit::from(MAX_CONCURRENCY_LIMIT + 1).resolve(), hardware_concurrency());
        assert_eq!(Limit::from(i64::MAX).resolve(), hardware_concurrency());
    }

    #[test]
    fn limit_round_trips_through_i64() {
        assert_eq!(i64::from(Limit::Default), 0);
        assert_eq!(i64::from(Limit::from(12usize)), 12);
    }
}
