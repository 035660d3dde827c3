//! Cache Module
//!
//! The tiered cache engine core: entry model, size accounting, memory and
//! disk tiers, eviction policy, search, batching and the tiered store that
//! ties them together.

mod accountant;
mod batch;
mod disk;
mod entry;
mod eviction;
mod memory;
mod search;
mod stats;
mod store;


// Re-export public types
pub use accountant::{BudgetDeficit, SizeAccountant};
pub use batch::{BatchCoordinator, CacheEvent, ChangeKind};
pub use disk::{safe_key, DiskTier};
pub use entry::{current_timestamp_ms, EntryMetadata, Priority, Tier};
pub use eviction::{plan_eviction, EvictionPlan};
pub use memory::MemoryTier;
pub use search::{SearchQuery, SortBy, SortOrder};
pub use stats::{CacheStats, TierStats};
pub use store::{CacheState, CleanupOptions, ClearOptions, GetOptions, SetOptions};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
