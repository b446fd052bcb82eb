//! Counters for converter session monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Session metrics.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Fetches issued to the rate source.
    pub fetches_started: AtomicU64,
    /// Fetches that produced a held snapshot.
    pub fetches_succeeded: AtomicU64,
    /// Fetches that failed.
    pub fetches_failed: AtomicU64,
    /// Failures served from the offline cache.
    pub offline_fallbacks: AtomicU64,
    /// Failures with nothing cached.
    pub errors: AtomicU64,
    /// Requests joined to an outstanding fetch.
    pub coalesced_requests: AtomicU64,
    /// Results dropped because the base changed while in flight.
    pub stale_results: AtomicU64,
    /// Single-currency conversions that failed after the retry.
    pub conversion_failures: AtomicU64,
    /// Snapshots that could not be persisted.
    pub cache_write_failures: AtomicU64,
}

impl SessionMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            offline_fallbacks: self.offline_fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub offline_fallbacks: u64,
    pub errors: u64,
    pub coalesced_requests: u64,
    pub stale_results: u64,
    pub conversion_failures: u64,
    pub cache_write_failures: u64,
}
