//! Tiered Store Module
//!
//! The engine core: routes get/set/remove across the memory and disk tiers
//! according to each entry's tier placement, keeps the metadata index, size
//! accountant and statistics consistent with every physical mutation, and
//! invokes the eviction policy before a write that would not fit.
//!
//! All methods run under the engine's single write guard, so every mutation
//! here - including the section spanning a disk await - is serialized.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::eviction::plan_eviction;
use crate::cache::search::{run_query, SearchQuery};
use crate::cache::{
    current_timestamp_ms, BatchCoordinator, BudgetDeficit, CacheEvent, CacheStats, ChangeKind,
    DiskTier, EntryMetadata, MemoryTier, Priority, SizeAccountant, Tier, TierStats,
    MAX_KEY_LENGTH,
};
use crate::config::{CacheConfig, ConfigUpdate};
use crate::error::{CacheError, Result};

// == Operation Options ==
/// Options for `set`. Defaults: memory tier, normal priority, the
/// configured default TTL, no tags.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL in milliseconds; `None` = configuration default, `Some(0)` = never expires
    pub ttl_ms: Option<u64>,
    /// Tier placement; `None` = memory only
    pub tier: Option<Tier>,
    /// Eviction priority; `None` = normal
    pub priority: Option<Priority>,
    /// Tags for bulk invalidation and search
    pub tags: Vec<String>,
}

/// Options for `get`.
#[derive(Debug, Clone, Copy)]
pub struct GetOptions {
    /// Return the value even when the TTL has elapsed
    pub ignore_expiry: bool,
    /// Update `last_accessed_at` on a hit
    pub update_access_time: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            ignore_expiry: false,
            update_access_time: true,
        }
    }
}

/// Filters for `clear`. All `None`/empty = clear everything.
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    /// Only entries occupying this tier
    pub tier: Option<Tier>,
    /// Only entries created before this timestamp (Unix milliseconds)
    pub older_than: Option<u64>,
    /// Only entries carrying all of these tags
    pub tags: Vec<String>,
}

/// Options for an explicit `cleanup` pass.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Bytes to free via eviction, beyond the expiry sweep
    pub target_bytes: Option<u64>,
    /// Maximum priority the eviction pass may remove
    pub priority_ceiling: Option<Priority>,
}

// == Cache State ==
/// All engine state: configuration, metadata index, both tiers, accountant,
/// statistics and the batch coordinator.
#[derive(Debug)]
pub struct CacheState {
    config: CacheConfig,
    metadata: HashMap<String, EntryMetadata>,
    memory: MemoryTier,
    disk: DiskTier,
    accountant: SizeAccountant,
    stats: CacheStats,
    batch: BatchCoordinator,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheState {
    // == Constructor ==
    /// Creates an empty store over the given disk tier.
    pub fn new(config: CacheConfig, disk: DiskTier, events: broadcast::Sender<CacheEvent>) -> Self {
        let accountant = SizeAccountant::new(&config);
        Self {
            config,
            metadata: HashMap::new(),
            memory: MemoryTier::new(),
            disk,
            accountant,
            stats: CacheStats::new(),
            batch: BatchCoordinator::new(),
            events,
        }
    }

    // == Startup Scan ==
    /// Rebuilds the metadata index and accountant from the disk tier's
    /// persisted artifacts, and restores the persisted statistics counters.
    /// Entries that were dual-tiered before the restart lost their memory
    /// copy, so they come back as disk-only.
    pub async fn restore_from_disk(&mut self) -> Result<()> {
        if !self.disk.available() {
            return Ok(());
        }

        if let Some(mut stats) = self.disk.read_stats().await {
            stats.set_tier_usage(TierStats::default(), TierStats::default());
            self.stats = stats;
        }

        for mut metadata in self.disk.scan().await? {
            metadata.tier = Tier::Disk;
            self.accountant.add(Tier::Disk, metadata.size);
            self.metadata.insert(metadata.key.clone(), metadata);
        }

        self.refresh_tier_stats();
        debug!(entries = self.metadata.len(), "store: restored disk-tier entries");
        Ok(())
    }

    // == Set ==
    /// Stores a key-value pair per the supplied options.
    ///
    /// Checks the size budgets before committing; on pressure, evicts
    /// entries from the budgets in deficit, bounded by the new entry's
    /// priority, until the write fits. If that still cannot make room,
    /// fails with `CapacityExceeded` and leaves the key unchanged.
    pub async fn set(&mut self, key: String, value: Value, options: SetOptions) -> Result<()> {
        validate_key(&key)?;

        let tier = options.tier.unwrap_or(Tier::Memory);
        let priority = options.priority.unwrap_or(Priority::Normal);
        let ttl_ms = options.ttl_ms.unwrap_or(self.config.default_ttl_ms);

        if tier.uses_disk() && !self.disk.available() {
            return Err(CacheError::TierUnavailable(format!(
                "cannot store '{}' on disk: no disk root configured",
                key
            )));
        }

        let value_bytes = serde_json::to_vec(&value)?;
        let size = value_bytes.len() as u64;

        // Capacity check nets out the old entry, which this write replaces
        let shortfall = self.projected_deficit(&key, tier, size).largest();
        if shortfall > 0 {
            let freed = self.evict_until_fit(&key, tier, size, priority).await;
            if !self.projected_deficit(&key, tier, size).is_zero() {
                return Err(CacheError::CapacityExceeded {
                    requested: shortfall,
                    freed,
                });
            }
        }

        let is_overwrite = self.metadata.contains_key(&key);
        let mut metadata = EntryMetadata::new(
            key.clone(),
            tier,
            priority,
            ttl_ms,
            size,
            options.tags.into_iter().collect(),
        );
        if let Some(old) = self.metadata.get(&key) {
            metadata.created_at = old.created_at;
            metadata.last_accessed_at = metadata.last_accessed_at.max(old.last_accessed_at);
        }

        // Disk write happens before any bookkeeping so an I/O failure leaves
        // the prior entry fully intact
        if tier.uses_disk() {
            self.disk.write_entry(&metadata, &value_bytes).await?;
        }

        // Atomic section: retire the old entry, commit the new one
        if let Some(old) = self.metadata.remove(&key) {
            self.accountant.remove(old.tier, old.size);
            if old.tier.uses_memory() {
                self.memory.remove(&key);
            }
            if old.tier.uses_disk() && !tier.uses_disk() {
                self.disk.delete_entry_best_effort(&key).await;
            }
        }
        if tier.uses_memory() {
            self.memory.insert(key.clone(), value);
        }
        self.accountant.add(tier, size);
        self.metadata.insert(key.clone(), metadata);
        self.refresh_tier_stats();

        let kind = if is_overwrite {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        self.dispatch(CacheEvent::new(key, kind));
        Ok(())
    }

    // == Get ==
    /// Retrieves a value. The memory tier is checked first; a disk hit is
    /// served read-through without promotion into memory. Absence, expiry
    /// and unreadable disk artifacts all return `None` and count as a miss.
    pub async fn get(&mut self, key: &str, options: GetOptions) -> Option<Value> {
        let Some(metadata) = self.metadata.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if !options.ignore_expiry && metadata.is_expired() {
            let _ = self.remove_entry(key, ChangeKind::Expired, false).await;
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        let tier = metadata.tier;
        let value = if tier.uses_memory() {
            self.memory.get(key).cloned()
        } else {
            self.disk.read_value(key).await
        };

        match value {
            Some(value) => {
                if options.update_access_time {
                    if let Some(metadata) = self.metadata.get_mut(key) {
                        metadata.touch();
                    }
                }
                self.stats.record_hit();
                Some(value)
            }
            None => {
                // Metadata without a readable value: drop the record so the
                // accountant does not carry a phantom entry
                warn!(key, "store: entry value unreadable, dropping record");
                let _ = self.remove_entry(key, ChangeKind::Removed, false).await;
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Existence probe honoring expiry semantics. Does not update access
    /// time or request statistics.
    pub fn has(&self, key: &str, ignore_expiry: bool) -> bool {
        match self.metadata.get(key) {
            Some(metadata) => ignore_expiry || !metadata.is_expired(),
            None => false,
        }
    }

    // == Remove ==
    /// Removes a key from whichever tier(s) hold it. No-op if absent.
    pub async fn remove(&mut self, key: &str) -> Result<()> {
        self.remove_entry(key, ChangeKind::Removed, true).await?;
        Ok(())
    }

    // == Clear ==
    /// Bulk removal filtered by tier occupancy, creation age and tags.
    pub async fn clear(&mut self, options: ClearOptions) -> Result<()> {
        let query = SearchQuery {
            tier: options.tier,
            created_before: options.older_than,
            tags: options.tags,
            ..Default::default()
        };
        let now = current_timestamp_ms();
        let victims: Vec<String> = self
            .metadata
            .values()
            .filter(|m| query.matches(m, now))
            .map(|m| m.key.clone())
            .collect();

        debug!(count = victims.len(), "store: clearing entries");
        for key in victims {
            self.remove_entry(&key, ChangeKind::Cleared, true).await?;
        }
        Ok(())
    }

    // == Expiry Sweep ==
    /// Removes every entry whose TTL has elapsed. Returns the number removed.
    pub async fn sweep_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .metadata
            .values()
            .filter(|m| m.is_expired_at(now))
            .map(|m| m.key.clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            if self
                .remove_entry(&key, ChangeKind::Expired, false)
                .await
                .unwrap_or(false)
            {
                self.stats.record_expiration();
                removed += 1;
            }
        }
        removed
    }

    // == Evict ==
    /// Runs one eviction pass requesting a `target_bytes` reduction of total
    /// usage, bounded by `priority_ceiling`. Every entry is a candidate; the
    /// write path uses `evict_until_fit`, which scopes victims to the budgets
    /// actually in deficit. Returns bytes actually freed.
    pub async fn evict(&mut self, target_bytes: u64, priority_ceiling: Option<Priority>) -> u64 {
        let candidates: Vec<&EntryMetadata> = self.metadata.values().collect();
        let plan = plan_eviction(candidates, target_bytes, priority_ceiling);

        let mut freed = 0u64;
        for key in &plan.victims {
            if let Some(size) = self.metadata.get(key).map(|m| m.size) {
                if self
                    .remove_entry(key, ChangeKind::Evicted, false)
                    .await
                    .unwrap_or(false)
                {
                    self.stats.record_eviction();
                    freed += size;
                }
            }
        }
        if freed > 0 {
            debug!(freed, target_bytes, "store: eviction pass complete");
        }
        freed
    }

    /// Evicts victims one at a time until a pending write of `size` bytes on
    /// `tier` fits, or no eligible victim remains. An entry is eligible only
    /// while its placement intersects a budget still in deficit, so memory
    /// pressure can never destroy disk-resident data that would not relieve
    /// it. The incoming key itself is never a victim. Returns bytes freed.
    async fn evict_until_fit(
        &mut self,
        key: &str,
        tier: Tier,
        size: u64,
        priority_ceiling: Priority,
    ) -> u64 {
        let mut freed = 0u64;
        loop {
            let deficit = self.projected_deficit(key, tier, size);
            if deficit.is_zero() {
                break;
            }

            let victim = {
                let candidates: Vec<&EntryMetadata> = self
                    .metadata
                    .values()
                    .filter(|m| m.key != key)
                    .filter(|m| deficit.relieved_by(m.tier))
                    .collect();
                plan_eviction(candidates, u64::MAX, Some(priority_ceiling))
                    .victims
                    .into_iter()
                    .next()
            };
            let Some(victim) = victim else {
                break;
            };

            let victim_size = self.metadata.get(&victim).map(|m| m.size).unwrap_or(0);
            if self
                .remove_entry(&victim, ChangeKind::Evicted, false)
                .await
                .unwrap_or(false)
            {
                self.stats.record_eviction();
                freed += victim_size;
            } else {
                break;
            }
        }
        if freed > 0 {
            debug!(freed, key, "store: write-path eviction complete");
        }
        freed
    }

    // == Search ==
    /// Predicate-based enumeration of metadata across both tiers. Returns
    /// metadata only, never values.
    pub fn search(&self, query: &SearchQuery) -> Vec<EntryMetadata> {
        run_query(self.metadata.values(), query, current_timestamp_ms())
    }

    // == Statistics ==
    /// Returns an owned snapshot of the current statistics.
    pub fn statistics(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Persists the statistics artifact to the disk root, if configured.
    pub async fn flush_stats(&mut self) -> Result<()> {
        if !self.disk.available() {
            return Ok(());
        }
        self.stats.mark_flushed();
        self.disk.write_stats(&self.stats).await
    }

    // == Batch ==
    /// Opens a batch: subsequent change events are buffered.
    pub fn begin_batch(&mut self) {
        self.batch.begin();
    }

    /// Flushes buffered change events in one dispatch pass.
    pub fn commit_batch(&mut self) {
        for event in self.batch.commit() {
            let _ = self.events.send(event);
        }
    }

    /// Closes the batch, discarding anything uncommitted.
    pub fn end_batch(&mut self) {
        self.batch.end();
    }

    // == Configuration ==
    /// Applies a partial configuration update. Returns whether the janitor
    /// interval changed (the engine restarts the janitor when it did).
    pub fn update_config(&mut self, update: ConfigUpdate) -> bool {
        let interval_changed = self.config.apply(update);
        self.accountant.set_limits(&self.config);
        interval_changed
    }

    /// Read access to the current configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Introspection ==
    /// Number of logical entries currently indexed.
    pub fn entry_count(&self) -> usize {
        self.metadata.len()
    }

    // == Internals ==
    /// Physically removes one entry: disk artifacts, memory residency,
    /// accountant contribution and metadata record, in one guarded section.
    /// `strict` propagates disk deletion failures (caller-initiated writes);
    /// sweep/eviction/read paths pass `false` and degrade. Returns whether
    /// an entry was actually removed.
    async fn remove_entry(&mut self, key: &str, kind: ChangeKind, strict: bool) -> Result<bool> {
        let Some(metadata) = self.metadata.get(key) else {
            return Ok(false);
        };
        let tier = metadata.tier;
        let size = metadata.size;

        if tier.uses_disk() {
            if strict {
                self.disk.delete_entry(key).await?;
            } else {
                self.disk.delete_entry_best_effort(key).await;
            }
        }
        if tier.uses_memory() {
            self.memory.remove(key);
        }
        self.accountant.remove(tier, size);
        self.metadata.remove(key);
        self.refresh_tier_stats();
        self.dispatch(CacheEvent::new(key, kind));
        Ok(true)
    }

    /// Per-budget deficits for landing `size` bytes on `tier`, net of the
    /// old entry this write would replace.
    fn projected_deficit(&self, key: &str, tier: Tier, size: u64) -> BudgetDeficit {
        let mut probe = self.accountant.clone();
        if let Some(old) = self.metadata.get(key) {
            probe.remove(old.tier, old.size);
        }
        probe.deficits(tier, size)
    }

    /// Routes a change event through the batch coordinator; immediate events
    /// go straight to subscribers.
    fn dispatch(&mut self, event: CacheEvent) {
        if let Some(event) = self.batch.record(event) {
            let _ = self.events.send(event);
        }
    }

    /// Mirrors current tier readings into the statistics snapshot.
    fn refresh_tier_stats(&mut self) {
        let disk_count = self.metadata.values().filter(|m| m.tier.uses_disk()).count();
        self.stats.set_tier_usage(
            TierStats {
                item_count: self.memory.len(),
                size_bytes: self.accountant.memory_used(),
            },
            TierStats {
                item_count: disk_count,
                size_bytes: self.accountant.disk_used(),
            },
        );
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
