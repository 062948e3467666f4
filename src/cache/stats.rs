//! Engine Statistics Module
//!
//! Counts lookups and populate outcomes of a cache engine.

use serde::Serialize;

// == Engine Stats ==
/// Lookup and populate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Index entry present and file on disk
    pub hits: u64,
    /// No live index entry
    pub misses: u64,
    /// Index entry present but file gone
    pub stale_hits: u64,
    /// Populate operations that completed and were registered
    pub populations: u64,
    /// Populate operations that failed
    pub failures: u64,
}

impl EngineStats {
    // == Constructor ==
    /// Creates a new EngineStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// hits / (hits + misses + stale_hits), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of lookups.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.stale_hits
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_stale(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_population(&mut self) {
        self.populations += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = EngineStats::new();
        assert_eq!(stats.lookups(), 0);
        assert_eq!(stats.populations, 0);
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(EngineStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = EngineStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_stale();
        stats.record_hit();
        assert_eq!(stats.lookups(), 4);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_populate_counters() {
        let mut stats = EngineStats::new();
        stats.record_population();
        stats.record_failure();
        stats.record_failure();
        assert_eq!(stats.populations, 1);
        assert_eq!(stats.failures, 2);
    }
}
