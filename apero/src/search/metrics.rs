//! Engine metrics for observability.
//!
//! Lock-free atomic counters recorded by the engine, snapshotted for display.
//! Counters are monotonic over the life of the service instance.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters recorded by [`crate::search::VenueSearch`].
#[derive(Debug, Default)]
pub struct SearchMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    dedup_joins: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller joined an already-pending network operation.
    pub fn dedup_join(&self) {
        self.dedup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_started(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            dedup_joins: self.dedup_joins.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`SearchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub dedup_joins: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SearchMetrics::new();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.cache_miss();
        metrics.fetch_started();
        metrics.fetch_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.fetches, 1);
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.dedup_joins, 0);
    }
}
