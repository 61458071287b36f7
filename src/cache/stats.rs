use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime counters for a cache coordinator
#[derive(Debug, Default)]
pub struct CacheStats {
    exact_hits: AtomicU64,
    fuzzy_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    failed_writes: AtomicU64,
    evictions: AtomicU64,
    store_errors: AtomicU64,
    malformed_skipped: AtomicU64,
    stale_skipped: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_exact_hit, exact_hits);
    counter!(record_fuzzy_hit, fuzzy_hits);
    counter!(record_miss, misses);
    counter!(record_write, writes);
    counter!(record_failed_write, failed_writes);
    counter!(record_store_error, store_errors);
    counter!(record_malformed, malformed_skipped);
    counter!(record_stale, stale_skipped);

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            fuzzy_hits: self.fuzzy_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            malformed_skipped: self.malformed_skipped.load(Ordering::Relaxed),
            stale_skipped: self.stale_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub exact_hits: u64,
    pub fuzzy_hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub failed_writes: u64,
    pub evictions: u64,
    pub store_errors: u64,
    pub malformed_skipped: u64,
    /// Candidates skipped because their feature vector predates the current formulas
    pub stale_skipped: u64,
}

impl CacheStatsSnapshot {
    pub fn lookups(&self) -> u64 {
        self.exact_hits + self.fuzzy_hits + self.misses
    }

    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            (self.exact_hits + self.fuzzy_hits) as f64 / lookups as f64 * 100.0
        }
    }

    /// Format stats for display
    pub fn format(&self) -> String {
        format!(
            "Cache Statistics:\n\
            Hit Rate: {:.1}% ({} exact, {} fuzzy, {} misses)\n\
            Writes: {} ({} failed, {} evicted)\n\
            Skipped: {} malformed, {} stale\n\
            Store Errors: {}",
            self.hit_rate(),
            self.exact_hits,
            self.fuzzy_hits,
            self.misses,
            self.writes,
            self.failed_writes,
            self.evictions,
            self.malformed_skipped,
            self.stale_skipped,
            self.store_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        stats.record_exact_hit();
        stats.record_fuzzy_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_evictions(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lookups(), 4);
        assert_eq!(snapshot.hit_rate(), 50.0);
        assert_eq!(snapshot.evictions, 3);
        assert!(snapshot.format().contains("50.0%"));
    }
}
