//! Gateway and presence metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Gateway client counters.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Calls issued, one per API method invocation.
    pub calls: AtomicU64,
    /// Transport attempts, including retries.
    pub attempts: AtomicU64,
    /// Attempts that were followed by a retry.
    pub retries: AtomicU64,
    /// Calls that succeeded.
    pub succeeded: AtomicU64,
    /// Calls that failed with a non-retryable error.
    pub fatal: AtomicU64,
    /// Calls that used up every attempt.
    pub exhausted: AtomicU64,
}

impl GatewayMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> GatewayMetricsSnapshot {
        GatewayMetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMetricsSnapshot {
    /// Calls issued
    pub calls: u64,
    /// Transport attempts
    pub attempts: u64,
    /// Retries
    pub retries: u64,
    /// Successful calls
    pub succeeded: u64,
    /// Fatal failures
    pub fatal: u64,
    /// Exhausted calls
    pub exhausted: u64,
}

/// Presence publisher counters.
///
/// `failed` is the operational signal for lost presence notifications;
/// the presence state behind each of them was already committed.
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    /// Events raised by a transition or status change.
    pub raised: AtomicU64,
    /// Events the sink accepted.
    pub published: AtomicU64,
    /// Events the sink failed to deliver.
    pub failed: AtomicU64,
}

impl PublisherMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            raised: self.raised.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`PublisherMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherMetricsSnapshot {
    /// Events raised
    pub raised: u64,
    /// Events published
    pub published: u64,
    /// Events lost
    pub failed: u64,
}
