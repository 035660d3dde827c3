//! Configuration Module
//!
//! Handles loading and managing engine configuration, either constructed
//! explicitly by the embedding application or loaded from environment
//! variables.

use std::env;

/// Cache engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum bytes the memory tier can hold
    pub memory_limit: u64,
    /// Maximum bytes the disk tier can hold
    pub disk_limit: u64,
    /// Maximum bytes across both tiers combined
    pub max_size: u64,
    /// Default TTL in milliseconds for entries without explicit TTL (0 = never expire)
    pub default_ttl_ms: u64,
    /// Background janitor sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// Persist the statistics artifact every N janitor sweeps
    pub stats_flush_every: u32,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MEMORY_LIMIT` - Memory tier budget in bytes (default: 10 MiB)
    /// - `CACHE_DISK_LIMIT` - Disk tier budget in bytes (default: 100 MiB)
    /// - `CACHE_MAX_SIZE` - Combined budget in bytes (default: 110 MiB)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Janitor sweep interval (default: 1000)
    /// - `CACHE_STATS_FLUSH_EVERY` - Sweeps between statistics flushes (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memory_limit: env_parse("CACHE_MEMORY_LIMIT", defaults.memory_limit),
            disk_limit: env_parse("CACHE_DISK_LIMIT", defaults.disk_limit),
            max_size: env_parse("CACHE_MAX_SIZE", defaults.max_size),
            default_ttl_ms: env_parse("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            cleanup_interval_ms: env_parse("CACHE_CLEANUP_INTERVAL_MS", defaults.cleanup_interval_ms),
            stats_flush_every: env_parse("CACHE_STATS_FLUSH_EVERY", defaults.stats_flush_every),
        }
    }

    /// Applies a partial update, returning whether the janitor interval changed.
    pub fn apply(&mut self, update: ConfigUpdate) -> bool {
        if let Some(v) = update.memory_limit {
            self.memory_limit = v;
        }
        if let Some(v) = update.disk_limit {
            self.disk_limit = v;
        }
        if let Some(v) = update.max_size {
            self.max_size = v;
        }
        if let Some(v) = update.default_ttl_ms {
            self.default_ttl_ms = v;
        }
        if let Some(v) = update.stats_flush_every {
            self.stats_flush_every = v;
        }
        match update.cleanup_interval_ms {
            Some(v) if v != self.cleanup_interval_ms => {
                self.cleanup_interval_ms = v;
                true
            }
            _ => false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit: 10 * 1024 * 1024,
            disk_limit: 100 * 1024 * 1024,
            max_size: 110 * 1024 * 1024,
            default_ttl_ms: 300_000,
            cleanup_interval_ms: 1000,
            stats_flush_every: 10,
        }
    }
}

/// Partial configuration update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub memory_limit: Option<u64>,
    pub disk_limit: Option<u64>,
    pub max_size: Option<u64>,
    pub default_ttl_ms: Option<u64>,
    pub cleanup_interval_ms: Option<u64>,
    pub stats_flush_every: Option<u32>,
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
