//! Tiercache - a tiered key-value cache engine
//!
//! Stores opaque, serializable values under string keys across two storage
//! tiers (in-process memory and a persisted disk root), with TTL expiry,
//! priority-aware eviction under size pressure, metadata search, batched
//! change notifications and usage statistics.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod tasks;

pub use cache::{
    CacheEvent, CacheStats, ChangeKind, CleanupOptions, ClearOptions, EntryMetadata, GetOptions,
    Priority, SearchQuery, SetOptions, SortBy, SortOrder, Tier, TierStats,
};
pub use config::{CacheConfig, ConfigUpdate};
pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use tasks::spawn_janitor_task;
