//! Cache Engine Module
//!
//! The public façade consumed by domain repositories. Owns the shared state
//! behind a single `Arc<RwLock<_>>`, the change-event channel, and the
//! janitor lifecycle. Construction is explicit: embedders build one engine
//! and pass it by handle, there is no hidden global instance.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{
    CacheEvent, CacheState, CacheStats, CleanupOptions, ClearOptions, DiskTier, EntryMetadata,
    GetOptions, SearchQuery, SetOptions,
};
use crate::config::{CacheConfig, ConfigUpdate};
use crate::error::Result;
use crate::tasks::spawn_janitor_task;

/// Capacity of the change-event broadcast channel. Slow subscribers that
/// fall further behind than this lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// == Cache Engine ==
/// Handle to a running tiered cache engine.
///
/// Cloning is cheap; clones share the same underlying cache.
#[derive(Debug, Clone)]
pub struct CacheEngine {
    state: Arc<RwLock<CacheState>>,
    events: broadcast::Sender<CacheEvent>,
    janitor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CacheEngine {
    // == Constructor ==
    /// Builds a ready engine: prepares the disk tier under `cache_dir` (or a
    /// memory-only engine when `None`), restores any persisted entries and
    /// statistics, and starts the janitor.
    pub async fn new(config: CacheConfig, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let disk = DiskTier::new(cache_dir).await?;

        let mut state = CacheState::new(config.clone(), disk, events.clone());
        state.restore_from_disk().await?;

        let state = Arc::new(RwLock::new(state));
        let janitor = spawn_janitor_task(
            state.clone(),
            config.cleanup_interval_ms,
            config.stats_flush_every,
        );

        info!(
            memory_limit = config.memory_limit,
            disk_limit = config.disk_limit,
            max_size = config.max_size,
            "cache engine initialized"
        );
        Ok(Self {
            state,
            events,
            janitor: Arc::new(Mutex::new(Some(janitor))),
        })
    }

    // == Core Operations ==
    /// Stores a value under a key. See [`SetOptions`] for tier, TTL,
    /// priority and tag defaults.
    pub async fn set(&self, key: impl Into<String>, value: Value, options: SetOptions) -> Result<()> {
        self.state.write().await.set(key.into(), value, options).await
    }

    /// Retrieves a value, or `None` on a clean miss. Misses are not errors.
    pub async fn get(&self, key: &str, options: GetOptions) -> Option<Value> {
        self.state.write().await.get(key, options).await
    }

    /// Removes a key from whichever tier(s) hold it. No-op if absent.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.state.write().await.remove(key).await
    }

    /// Removes several keys in one guarded pass.
    pub async fn batch_remove(&self, keys: &[String]) -> Result<()> {
        let mut guard = self.state.write().await;
        for key in keys {
            guard.remove(key).await?;
        }
        Ok(())
    }

    /// Existence probe honoring expiry semantics; never touches statistics
    /// or access times.
    pub async fn has(&self, key: &str, ignore_expiry: bool) -> bool {
        self.state.read().await.has(key, ignore_expiry)
    }

    /// Bulk removal filtered by tier, creation age and tags.
    pub async fn clear(&self, options: ClearOptions) -> Result<()> {
        self.state.write().await.clear(options).await
    }

    /// Predicate-based enumeration of entry metadata. Values are never
    /// returned; callers `get` explicitly.
    pub async fn search(&self, query: &SearchQuery) -> Vec<EntryMetadata> {
        self.state.read().await.search(query)
    }

    /// Runs an expiry sweep now, plus an eviction pass when the options
    /// request a byte reduction.
    pub async fn cleanup(&self, options: CleanupOptions) {
        let mut guard = self.state.write().await;
        guard.sweep_expired().await;
        if let Some(target) = options.target_bytes {
            guard.evict(target, options.priority_ceiling).await;
        }
    }

    /// Returns an owned snapshot of the current statistics.
    pub async fn statistics(&self) -> CacheStats {
        self.state.read().await.statistics()
    }

    /// Number of logical entries currently cached.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entry_count()
    }

    // == Batch ==
    /// Opens a batch: change events are buffered until commit.
    pub async fn begin_batch(&self) {
        self.state.write().await.begin_batch();
    }

    /// Flushes all buffered change events as one dispatch pass.
    pub async fn commit_batch(&self) {
        self.state.write().await.commit_batch();
    }

    /// Closes the batch, discarding uncommitted events. Stored data is
    /// never rolled back - batching controls notification timing only.
    pub async fn end_batch(&self) {
        self.state.write().await.end_batch();
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    // == Lifecycle ==
    /// Applies a partial configuration update. When the janitor interval
    /// changed, the janitor is restarted on the new cadence.
    pub async fn update_config(&self, update: ConfigUpdate) {
        let (interval_changed, interval_ms, flush_every) = {
            let mut guard = self.state.write().await;
            let changed = guard.update_config(update);
            let config = guard.config();
            (changed, config.cleanup_interval_ms, config.stats_flush_every)
        };

        if interval_changed {
            info!(interval_ms, "janitor interval changed, restarting janitor");
            let replacement = spawn_janitor_task(self.state.clone(), interval_ms, flush_every);
            let previous = self
                .janitor
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .replace(replacement);
            if let Some(handle) = previous {
                handle.abort();
            }
        }
    }

    /// Stops the janitor and flushes the statistics artifact.
    pub async fn shutdown(&self) {
        let handle = self
            .janitor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }

        if let Err(e) = self.state.write().await.flush_stats().await {
            warn!(error = %e, "shutdown: statistics flush failed");
        }
        info!("cache engine shut down");
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ChangeKind, Priority, SortBy, Tier};
    use serde_json::json;

    fn test_config() -> CacheConfig {
        CacheConfig {
            memory_limit: 64 * 1024,
            disk_limit: 64 * 1024,
            max_size: 256 * 1024,
            default_ttl_ms: 0,
            cleanup_interval_ms: 50,
            stats_flush_every: 0,
        }
    }

    #[tokio::test]
    async fn test_engine_round_trip_and_shutdown() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();

        engine.set("k", json!({"v": 1}), SetOptions::default()).await.unwrap();
        assert_eq!(
            engine.get("k", GetOptions::default()).await,
            Some(json!({"v": 1}))
        );
        assert!(engine.has("k", false).await);
        assert_eq!(engine.entry_count().await, 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_engine_clones_share_state() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();
        let other = engine.clone();

        engine.set("shared", json!(true), SetOptions::default()).await.unwrap();
        assert!(other.has("shared", false).await);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_remove() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();
        engine.set("a", json!(1), SetOptions::default()).await.unwrap();
        engine.set("b", json!(2), SetOptions::default()).await.unwrap();

        engine
            .batch_remove(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(engine.entry_count().await, 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_cleanup_with_target_bytes() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();
        engine.set(
            "a",
            json!("x".repeat(98)),
            SetOptions { priority: Some(Priority::Low), ..Default::default() },
        ).await.unwrap();
        engine.set("b", json!("y".repeat(98)), SetOptions::default()).await.unwrap();

        engine.cleanup(CleanupOptions {
            target_bytes: Some(50),
            priority_ceiling: Some(Priority::Low),
        }).await;

        // Only the low-priority entry was eligible
        assert!(!engine.has("a", true).await);
        assert!(engine.has("b", true).await);
        assert_eq!(engine.statistics().await.evictions, 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_janitor_restart_on_interval_change() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();

        engine.update_config(ConfigUpdate {
            cleanup_interval_ms: Some(20),
            ..Default::default()
        }).await;

        engine.set(
            "ephemeral",
            json!(1),
            SetOptions { ttl_ms: Some(30), ..Default::default() },
        ).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        // The restarted janitor swept the entry without any read traffic
        assert_eq!(engine.entry_count().await, 0);
        assert_eq!(engine.statistics().await.expirations, 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();
        let mut rx = engine.subscribe();

        engine.set("a", json!(1), SetOptions::default()).await.unwrap();
        engine.remove("a").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), CacheEvent::new("a", ChangeKind::Added));
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::new("a", ChangeKind::Removed));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_search_via_engine() {
        let engine = CacheEngine::new(test_config(), None).await.unwrap();
        for (key, priority) in [
            ("a", Priority::Low),
            ("b", Priority::High),
            ("c", Priority::Critical),
        ] {
            engine.set(
                key,
                json!(1),
                SetOptions { priority: Some(priority), ..Default::default() },
            ).await.unwrap();
        }

        let results = engine.search(&SearchQuery {
            min_priority: Some(Priority::High),
            sort_by: Some(SortBy::Key),
            ..Default::default()
        }).await;
        let keys: Vec<&str> = results.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_disk_backed_engine_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        {
            let engine = CacheEngine::new(test_config(), Some(root.clone())).await.unwrap();
            engine.set(
                "durable",
                json!({"n": 7}),
                SetOptions { tier: Some(Tier::Disk), ..Default::default() },
            ).await.unwrap();
            engine.get("durable", GetOptions::default()).await.unwrap();
            engine.shutdown().await;
        }

        let engine = CacheEngine::new(test_config(), Some(root)).await.unwrap();
        assert_eq!(
            engine.get("durable", GetOptions::default()).await,
            Some(json!({"n": 7}))
        );
        // Persisted statistics counters survived too
        let stats = engine.statistics().await;
        assert_eq!(stats.hits, 2);

        engine.shutdown().await;
    }
}
