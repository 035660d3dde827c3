//! Size Accountant Module
//!
//! Tracks bytes used per tier and in total, and answers whether an addition
//! would exceed a budget. Every physical tier mutation must be mirrored here
//! in the same atomic section, so the counts never drift from the tiers.

use crate::cache::Tier;
use crate::config::CacheConfig;

// == Budget Deficit ==
/// Per-budget deficits for a prospective addition. Eviction uses this to
/// pick victims that demonstrably relieve a budget still under pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetDeficit {
    /// Bytes over the memory-tier budget
    pub memory: u64,
    /// Bytes over the disk-tier budget
    pub disk: u64,
    /// Bytes over the combined budget
    pub global: u64,
}

impl BudgetDeficit {
    /// Whether the addition fits every budget as-is.
    pub fn is_zero(&self) -> bool {
        self.memory == 0 && self.disk == 0 && self.global == 0
    }

    /// The largest single deficit; what an eviction pass is asked to free.
    pub fn largest(&self) -> u64 {
        self.memory.max(self.disk).max(self.global)
    }

    /// Whether evicting an entry with this placement reduces some budget
    /// still in deficit. Any entry reduces the combined budget; tier
    /// budgets are only relieved by entries resident in that tier.
    pub fn relieved_by(&self, tier: Tier) -> bool {
        (self.memory > 0 && tier.uses_memory())
            || (self.disk > 0 && tier.uses_disk())
            || self.global > 0
    }
}

// == Size Accountant ==
/// Byte bookkeeping for both tiers against the configured budgets.
#[derive(Debug, Clone, Default)]
pub struct SizeAccountant {
    memory_used: u64,
    disk_used: u64,
    memory_limit: u64,
    disk_limit: u64,
    max_size: u64,
}

impl SizeAccountant {
    // == Constructor ==
    /// Creates an accountant with budgets taken from the configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            memory_used: 0,
            disk_used: 0,
            memory_limit: config.memory_limit,
            disk_limit: config.disk_limit,
            max_size: config.max_size,
        }
    }

    /// Updates budgets after a configuration change. Usage counts are kept;
    /// entries above a lowered budget are dealt with by the next eviction or
    /// cleanup pass, not here.
    pub fn set_limits(&mut self, config: &CacheConfig) {
        self.memory_limit = config.memory_limit;
        self.disk_limit = config.disk_limit;
        self.max_size = config.max_size;
    }

    // == Deficits ==
    /// Per-budget deficits for landing `size` more bytes on `tier`.
    ///
    /// Checks the tier budget(s) the placement touches and the global
    /// budget. All-zero means the addition fits as-is.
    pub fn deficits(&self, tier: Tier, size: u64) -> BudgetDeficit {
        let mut deficit = BudgetDeficit::default();

        if tier.uses_memory() {
            let projected = self.memory_used + size;
            if projected > self.memory_limit {
                deficit.memory = projected - self.memory_limit;
            }
        }
        if tier.uses_disk() {
            let projected = self.disk_used + size;
            if projected > self.disk_limit {
                deficit.disk = projected - self.disk_limit;
            }
        }

        // Dual-tier entries count once per tier toward the global budget
        let global_add = size * tier_count(tier);
        let projected_total = self.memory_used + self.disk_used + global_add;
        if projected_total > self.max_size {
            deficit.global = projected_total - self.max_size;
        }

        deficit
    }

    // == Shortfall ==
    /// Bytes that must be freed before `size` more bytes can land on `tier`:
    /// the largest single budget deficit. Zero means the addition fits.
    pub fn shortfall(&self, tier: Tier, size: u64) -> u64 {
        self.deficits(tier, size).largest()
    }

    // == Add / Remove ==
    /// Records an entry of `size` bytes landing on `tier`.
    pub fn add(&mut self, tier: Tier, size: u64) {
        if tier.uses_memory() {
            self.memory_used += size;
        }
        if tier.uses_disk() {
            self.disk_used += size;
        }
    }

    /// Records an entry of `size` bytes leaving `tier`.
    ///
    /// Saturates at zero so a stray double-remove can never underflow into
    /// a huge phantom usage.
    pub fn remove(&mut self, tier: Tier, size: u64) {
        if tier.uses_memory() {
            self.memory_used = self.memory_used.saturating_sub(size);
        }
        if tier.uses_disk() {
            self.disk_used = self.disk_used.saturating_sub(size);
        }
    }

    // == Readings ==
    /// Bytes currently held in the memory tier.
    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    /// Bytes currently held in the disk tier.
    pub fn disk_used(&self) -> u64 {
        self.disk_used
    }

    /// Bytes currently held across both tiers.
    pub fn total_used(&self) -> u64 {
        self.memory_used + self.disk_used
    }
}

fn tier_count(tier: Tier) -> u64 {
    match tier {
        Tier::Memory | Tier::Disk => 1,
        Tier::MemoryAndDisk => 2,
    }
}
