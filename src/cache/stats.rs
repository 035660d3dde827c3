//! Cache Statistics Module
//!
//! Tracks cache performance metrics: requests, hits, misses, evictions,
//! expirations and per-tier item counts and sizes. The snapshot is also the
//! persisted statistics artifact, flushed to the disk root on a cadence.

use serde::{Deserialize, Serialize};

// == Tier Stats ==
/// Item count and byte size for a single tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of entries resident in the tier
    pub item_count: usize,
    /// Bytes of serialized values resident in the tier
    pub size_bytes: u64,
}

// == Cache Stats ==
/// Cache performance counters and aggregate sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of get operations observed
    pub requests: u64,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries removed under size pressure
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expirations: u64,
    /// Memory tier aggregates
    pub memory: TierStats,
    /// Disk tier aggregates
    pub disk: TierStats,
    /// When this snapshot was last persisted (RFC 3339), None if never
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flushed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Records a get that found a valid entry.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }

    // == Record Miss ==
    /// Records a get that found nothing usable.
    pub fn record_miss(&mut self) {
        self.requests += 1;
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Expiration ==
    /// Increments the expiration counter.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Update Tier Aggregates ==
    /// Replaces the per-tier aggregates with current readings.
    pub fn set_tier_usage(&mut self, memory: TierStats, disk: TierStats) {
        self.memory = memory;
        self.disk = disk;
    }

    /// Stamps the snapshot as persisted now.
    pub fn mark_flushed(&mut self) {
        self.flushed_at = Some(chrono::Utc::now());
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 0);
        assert_eq!(stats.memory, TierStats::default());
        assert_eq!(stats.disk, TierStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.requests, 2);
    }

    #[test]
    fn test_record_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_expiration();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 1);
        // Neither touches the request counters
        assert_eq!(stats.requests, 0);
    }

    #[test]
    fn test_set_tier_usage() {
        let mut stats = CacheStats::new();
        stats.set_tier_usage(
            TierStats { item_count: 3, size_bytes: 120 },
            TierStats { item_count: 1, size_bytes: 4096 },
        );
        assert_eq!(stats.memory.item_count, 3);
        assert_eq!(stats.memory.size_bytes, 120);
        assert_eq!(stats.disk.item_count, 1);
        assert_eq!(stats.disk.size_bytes, 4096);
    }

    #[test]
    fn test_stats_persistence_round_trip() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_expiration();
        stats.mark_flushed();

        let encoded = serde_json::to_string(&stats).unwrap();
        let decoded: CacheStats = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, stats);
        assert!(decoded.flushed_at.is_some());
    }
}
