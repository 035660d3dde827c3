//! Eviction Policy Engine
//!
//! Selects victims under size pressure. Ordering: priority ascending (lowest
//! priority goes first), then `last_accessed_at` ascending (LRU among equal
//! priority). An optional priority ceiling restricts eligibility so a write
//! can never evict data more important than itself.
//!
//! Selection is pure: callers supply the eligible candidates (the write path
//! scopes them to the budgets in deficit, explicit cleanup passes every
//! entry) and apply the returned plan against the tiers, accountant and
//! statistics in one atomic section.

use crate::cache::{EntryMetadata, Priority};

// == Eviction Plan ==
/// The ordered victim set for one eviction pass.
#[derive(Debug, Default)]
pub struct EvictionPlan {
    /// Keys to evict, in eviction order
    pub victims: Vec<String>,
    /// Bytes the victims will free (may be less than requested)
    pub bytes_freed: u64,
}

// == Plan Eviction ==
/// Selects victims from `candidates` until `target_bytes` is covered or no
/// eligible candidate remains.
///
/// # Arguments
/// * `candidates` - Metadata of every entry eligible for this pass
/// * `target_bytes` - Bytes that must be freed
/// * `priority_ceiling` - When given, only entries at or below this priority
///   are considered
pub fn plan_eviction(
    mut candidates: Vec<&EntryMetadata>,
    target_bytes: u64,
    priority_ceiling: Option<Priority>,
) -> EvictionPlan {
    if let Some(ceiling) = priority_ceiling {
        candidates.retain(|m| m.priority <= ceiling);
    }

    // Lowest priority first, LRU within equal priority; key as a final
    // tie-break so the plan is deterministic
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.last_accessed_at.cmp(&b.last_accessed_at))
            .then(a.key.cmp(&b.key))
    });

    let mut plan = EvictionPlan::default();
    for metadata in candidates {
        if plan.bytes_freed >= target_bytes {
            break;
        }
        plan.victims.push(metadata.key.clone());
        plan.bytes_freed += metadata.size;
    }
    plan
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Tier;
    use std::collections::BTreeSet;

    fn meta(key: &str, priority: Priority, last_accessed_at: u64, size: u64) -> EntryMetadata {
        let mut m = EntryMetadata::new(
            key.to_string(),
            Tier::Memory,
            priority,
            0,
            size,
            BTreeSet::new(),
        );
        m.last_accessed_at = last_accessed_at;
        m
    }

    #[test]
    fn test_empty_candidates() {
        let plan = plan_eviction(vec![], 100, None);
        assert!(plan.victims.is_empty());
        assert_eq!(plan.bytes_freed, 0);
    }

    #[test]
    fn test_low_priority_evicted_before_normal() {
        let low = meta("low", Priority::Low, 900, 10);
        let normal = meta("normal", Priority::Normal, 100, 10);
        let high = meta("high", Priority::High, 1, 10);

        let plan = plan_eviction(vec![&normal, &high, &low], 20, None);
        assert_eq!(plan.victims, vec!["low", "normal"]);
        assert_eq!(plan.bytes_freed, 20);
    }

    #[test]
    fn test_lru_within_equal_priority() {
        let older = meta("older", Priority::Normal, 100, 10);
        let newer = meta("newer", Priority::Normal, 200, 10);

        let plan = plan_eviction(vec![&newer, &older], 10, None);
        assert_eq!(plan.victims, vec!["older"]);
    }

    #[test]
    fn test_priority_ceiling_excludes_higher() {
        let low = meta("low", Priority::Low, 100, 10);
        let high = meta("high", Priority::High, 1, 100);

        let plan = plan_eviction(vec![&low, &high], 50, Some(Priority::Normal));
        // Only "low" is eligible, even though it cannot cover the target
        assert_eq!(plan.victims, vec!["low"]);
        assert_eq!(plan.bytes_freed, 10);
    }

    #[test]
    fn test_stops_once_target_met() {
        let a = meta("a", Priority::Low, 1, 30);
        let b = meta("b", Priority::Low, 2, 30);
        let c = meta("c", Priority::Low, 3, 30);

        let plan = plan_eviction(vec![&a, &b, &c], 50, None);
        assert_eq!(plan.victims, vec!["a", "b"]);
        assert_eq!(plan.bytes_freed, 60);
    }

    #[test]
    fn test_ceiling_at_critical_allows_all() {
        let critical = meta("critical", Priority::Critical, 1, 10);
        let plan = plan_eviction(vec![&critical], 10, Some(Priority::Critical));
        assert_eq!(plan.victims, vec!["critical"]);
    }
}
