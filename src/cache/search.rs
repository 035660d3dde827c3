//! Search/Query Module
//!
//! Predicate-based enumeration of entry metadata across both tiers. All
//! supplied predicates combine with AND semantics; results can be sorted by
//! a metadata field and truncated. Values are never returned - callers must
//! `get` explicitly.

use serde::{Deserialize, Serialize};

use crate::cache::{EntryMetadata, Priority, Tier};

// == Sort Field ==
/// Metadata field to sort results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Key,
    CreatedAt,
    UpdatedAt,
    LastAccessedAt,
    Size,
    Priority,
}

// == Sort Order ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

// == Search Query ==
/// Conjunctive metadata filters plus optional sort and limit.
///
/// `tier` matches by occupancy: querying `Memory` matches every entry
/// resident in the memory tier, including dual-tiered ones.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Substring the key must contain
    pub key_pattern: Option<String>,
    /// Tier the entry must occupy
    pub tier: Option<Tier>,
    /// Minimum priority (inclusive)
    pub min_priority: Option<Priority>,
    /// `created_at` lower bound (exclusive)
    pub created_after: Option<u64>,
    /// `created_at` upper bound (exclusive)
    pub created_before: Option<u64>,
    /// `last_accessed_at` lower bound (exclusive)
    pub accessed_after: Option<u64>,
    /// `last_accessed_at` upper bound (exclusive)
    pub accessed_before: Option<u64>,
    /// Tags the entry must all carry
    pub tags: Vec<String>,
    /// Only entries whose TTL has already elapsed
    pub only_expired: bool,
    /// Sort field; unsorted (index order) when absent
    pub sort_by: Option<SortBy>,
    /// Sort direction
    pub sort_order: SortOrder,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Whether a metadata record satisfies every supplied predicate as of `now`.
    pub fn matches(&self, m: &EntryMetadata, now: u64) -> bool {
        if let Some(pattern) = &self.key_pattern {
            if !m.key.contains(pattern.as_str()) {
                return false;
            }
        }
        if let Some(tier) = self.tier {
            let occupies = match tier {
                Tier::Memory => m.tier.uses_memory(),
                Tier::Disk => m.tier.uses_disk(),
                Tier::MemoryAndDisk => m.tier == Tier::MemoryAndDisk,
            };
            if !occupies {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if m.priority < min {
                return false;
            }
        }
        if let Some(t) = self.created_after {
            if m.created_at <= t {
                return false;
            }
        }
        if let Some(t) = self.created_before {
            if m.created_at >= t {
                return false;
            }
        }
        if let Some(t) = self.accessed_after {
            if m.last_accessed_at <= t {
                return false;
            }
        }
        if let Some(t) = self.accessed_before {
            if m.last_accessed_at >= t {
                return false;
            }
        }
        if !self.tags.iter().all(|tag| m.tags.contains(tag)) {
            return false;
        }
        if self.only_expired && !m.is_expired_at(now) {
            return false;
        }
        true
    }
}

// == Run Query ==
/// Filters, sorts and truncates metadata records for one query.
pub fn run_query<'a>(
    entries: impl Iterator<Item = &'a EntryMetadata>,
    query: &SearchQuery,
    now: u64,
) -> Vec<EntryMetadata> {
    let mut results: Vec<EntryMetadata> = entries
        .filter(|m| query.matches(m, now))
        .cloned()
        .collect();

    if let Some(field) = query.sort_by {
        results.sort_by(|a, b| {
            let ordering = match field {
                SortBy::Key => a.key.cmp(&b.key),
                SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortBy::LastAccessedAt => a.last_accessed_at.cmp(&b.last_accessed_at),
                SortBy::Size => a.size.cmp(&b.size),
                SortBy::Priority => a.priority.cmp(&b.priority),
            };
            match query.sort_order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }
    results
}
