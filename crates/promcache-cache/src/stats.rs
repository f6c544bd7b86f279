//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters updated on the request path.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    partial_hits: AtomicU64,
    misses: AtomicU64,
    pending_waits: AtomicU64,
    pending_timeouts: AtomicU64,
    merges: AtomicU64,
    malformed_merges: AtomicU64,
    lru_evictions: AtomicU64,
    janitor_evictions: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial_hit(&self) {
        self.partial_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending_wait(&self) {
        self.pending_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending_timeout(&self) {
        self.pending_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_merge(&self) {
        self.malformed_merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lru_eviction(&self) {
        self.lru_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_janitor_evictions(&self, n: u64) {
        self.janitor_evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            partial_hits: self.partial_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            pending_waits: self.pending_waits.load(Ordering::Relaxed),
            pending_timeouts: self.pending_timeouts.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            malformed_merges: self.malformed_merges.load(Ordering::Relaxed),
            lru_evictions: self.lru_evictions.load(Ordering::Relaxed),
            janitor_evictions: self.janitor_evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub partial_hits: u64,
    pub misses: u64,
    pub pending_waits: u64,
    pub pending_timeouts: u64,
    pub merges: u64,
    pub malformed_merges: u64,
    pub lru_evictions: u64,
    pub janitor_evictions: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of fetches served entirely from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.partial_hits + self.misses + self.pending_timeouts;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_janitor_evictions(2);

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 3);
        assert_eq!(snap.janitor_evictions, 2);
        assert!((snap.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(CacheStats::default().snapshot()).unwrap();
        assert!(json["pendingTimeouts"].is_number());
        assert!(json["janitorEvictions"].is_number());
    }
}
