//! Cache Entry Metadata Module
//!
//! Defines the per-entry record: tier placement, priority, timestamps,
//! expiry and size. Values themselves live in the tier stores; this record
//! is the single authoritative description of each key.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Tier ==
/// Storage tier(s) an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Process-local fast tier only
    Memory,
    /// Persisted slower tier only
    Disk,
    /// Both tiers hold the entry simultaneously
    MemoryAndDisk,
}

impl Tier {
    /// Whether entries with this placement occupy the memory tier.
    pub fn uses_memory(self) -> bool {
        matches!(self, Tier::Memory | Tier::MemoryAndDisk)
    }

    /// Whether entries with this placement occupy the disk tier.
    pub fn uses_disk(self) -> bool {
        matches!(self, Tier::Disk | Tier::MemoryAndDisk)
    }
}

// == Priority ==
/// Eviction priority. Higher priorities survive eviction longer.
///
/// The derived `Ord` follows declaration order: `Low < Normal < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

// == Entry Metadata ==
/// Per-key record held alongside each value.
///
/// This is also the on-disk metadata artifact, so it must stay serde
/// round-trippable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The cache key this record describes
    pub key: String,
    /// Tier placement
    pub tier: Tier,
    /// Eviction priority
    pub priority: Priority,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last write timestamp (Unix milliseconds)
    pub updated_at: u64,
    /// Last read timestamp (Unix milliseconds); never decreases
    pub last_accessed_at: u64,
    /// Expiration timestamp (Unix milliseconds), 0 = never expires
    pub expires_at: u64,
    /// Byte size of the serialized value, computed at write time
    pub size: u64,
    /// Tags for bulk invalidation and search
    pub tags: BTreeSet<String>,
}

impl EntryMetadata {
    // == Constructor ==
    /// Creates metadata for a fresh entry.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `tier` - Tier placement
    /// * `priority` - Eviction priority
    /// * `ttl_ms` - TTL in milliseconds, 0 = never expires
    /// * `size` - Serialized value size in bytes
    /// * `tags` - Tags for bulk invalidation
    pub fn new(
        key: String,
        tier: Tier,
        priority: Priority,
        ttl_ms: u64,
        size: u64,
        tags: BTreeSet<String>,
    ) -> Self {
        let now = current_timestamp_ms();
        let expires_at = if ttl_ms == 0 { 0 } else { now + ttl_ms };

        Self {
            key,
            tier,
            priority,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            expires_at,
            size,
            tags,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration time. `expires_at == 0`
    /// means the entry never expires.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at != 0 && now >= self.expires_at
    }

    /// Checks if the entry has expired as of the current wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Touch ==
    /// Marks the entry as accessed now. `last_accessed_at` never decreases.
    pub fn touch(&mut self) {
        let now = current_timestamp_ms();
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if the entry never expires.
    ///
    /// Returns `Some(0)` once the TTL has elapsed.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        if self.expires_at == 0 {
            return None;
        }
        Some(self.expires_at.saturating_sub(current_timestamp_ms()))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn meta(ttl_ms: u64) -> EntryMetadata {
        EntryMetadata::new(
            "k".to_string(),
            Tier::Memory,
            Priority::Normal,
            ttl_ms,
            16,
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_metadata_no_ttl_never_expires() {
        let m = meta(0);
        assert_eq!(m.expires_at, 0);
        assert!(!m.is_expired());
        assert!(m.ttl_remaining_ms().is_none());
    }

    #[test]
    fn test_metadata_with_ttl() {
        let m = meta(60_000);
        assert!(m.expires_at >= m.created_at);
        assert!(!m.is_expired());

        let remaining = m.ttl_remaining_ms().unwrap();
        assert!(remaining <= 60_000);
        assert!(remaining >= 59_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let mut m = meta(1000);
        // Expired exactly at the expiry instant
        assert!(m.is_expired_at(m.expires_at));
        assert!(!m.is_expired_at(m.expires_at - 1));

        // Sentinel 0 never expires regardless of clock
        m.expires_at = 0;
        assert!(!m.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_ttl_remaining_expired_is_zero() {
        let mut m = meta(1000);
        m.expires_at = current_timestamp_ms().saturating_sub(500);
        assert_eq!(m.ttl_remaining_ms().unwrap(), 0);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut m = meta(0);
        let before = m.last_accessed_at;
        m.touch();
        assert!(m.last_accessed_at >= before);
        assert!(m.last_accessed_at >= m.created_at);
    }

    #[test]
    fn test_tier_placement_helpers() {
        assert!(Tier::Memory.uses_memory());
        assert!(!Tier::Memory.uses_disk());
        assert!(Tier::Disk.uses_disk());
        assert!(!Tier::Disk.uses_memory());
        assert!(Tier::MemoryAndDisk.uses_memory());
        assert!(Tier::MemoryAndDisk.uses_disk());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn test_metadata_serde_round_trip() {
        let mut m = meta(5000);
        m.tags.insert("video".to_string());
        let encoded = serde_json::to_string(&m).unwrap();
        let decoded: EntryMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, m);
    }
}
