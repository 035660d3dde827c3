//! Expiry Janitor Task
//!
//! Background task that periodically sweeps expired entries from both tiers
//! and persists the statistics artifact on a cadence, so statistics I/O is
//! bounded regardless of mutation rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheState;

/// Spawns the janitor: an infinite loop that sleeps for the configured
/// interval, then takes the engine write guard to sweep expired entries.
/// Every `stats_flush_every` sweeps, the statistics artifact is persisted.
///
/// # Arguments
/// * `state` - Shared engine state
/// * `interval_ms` - Milliseconds between sweeps
/// * `stats_flush_every` - Sweeps between statistics flushes (0 disables)
///
/// # Returns
/// A JoinHandle used to abort the task on shutdown or when the interval
/// changes via `update_config`.
pub fn spawn_janitor_task(
    state: Arc<RwLock<CacheState>>,
    interval_ms: u64,
    stats_flush_every: u32,
) -> JoinHandle<()> {
    let interval = Duration::from_millis(interval_ms.max(1));

    tokio::spawn(async move {
        info!(interval_ms, "starting expiry janitor");
        let mut sweeps: u32 = 0;

        loop {
            tokio::time::sleep(interval).await;

            let mut guard = state.write().await;
            let removed = guard.sweep_expired().await;

            sweeps = sweeps.wrapping_add(1);
            if stats_flush_every > 0 && sweeps % stats_flush_every == 0 {
                if let Err(e) = guard.flush_stats().await {
                    warn!(error = %e, "janitor: statistics flush failed");
                }
            }
            drop(guard);

            if removed > 0 {
                info!(removed, "janitor: removed expired entries");
            } else {
                debug!("janitor: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskTier, GetOptions, SetOptions};
    use crate::config::CacheConfig;
    use serde_json::json;
    use tokio::sync::broadcast;

    async fn shared_state() -> Arc<RwLock<CacheState>> {
        let config = CacheConfig {
            default_ttl_ms: 0,
            ..Default::default()
        };
        let (events, _) = broadcast::channel(64);
        let disk = DiskTier::new(None).await.unwrap();
        Arc::new(RwLock::new(CacheState::new(config, disk, events)))
    }

    #[tokio::test]
    async fn test_janitor_removes_expired_entries() {
        let state = shared_state().await;

        {
            let mut guard = state.write().await;
            guard
                .set(
                    "expire_soon".to_string(),
                    json!("value"),
                    SetOptions { ttl_ms: Some(30), ..Default::default() },
                )
                .await
                .unwrap();
        }

        let handle = spawn_janitor_task(state.clone(), 20, 0);
        tokio::time::sleep(Duration::from_millis(120)).await;

        {
            let mut guard = state.write().await;
            assert!(
                guard.get("expire_soon", GetOptions::default()).await.is_none(),
                "expired entry should have been swept"
            );
            assert_eq!(guard.statistics().expirations, 1);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_janitor_preserves_valid_entries() {
        let state = shared_state().await;

        {
            let mut guard = state.write().await;
            guard
                .set(
                    "long_lived".to_string(),
                    json!("value"),
                    SetOptions { ttl_ms: Some(60_000), ..Default::default() },
                )
                .await
                .unwrap();
        }

        let handle = spawn_janitor_task(state.clone(), 20, 0);
        tokio::time::sleep(Duration::from_millis(100)).await;

        {
            let mut guard = state.write().await;
            let got = guard.get("long_lived", GetOptions::default()).await;
            assert_eq!(got, Some(json!("value")), "valid entry should survive sweeps");
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_janitor_can_be_aborted() {
        let state = shared_state().await;

        let handle = spawn_janitor_task(state, 20, 0);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}
