//! Memory Tier Module
//!
//! The process-local fast tier: a plain key-to-value table. Metadata for all
//! entries, memory-resident or not, lives in the store's metadata index so
//! there is a single record per key rather than parallel copies per tier.

use std::collections::HashMap;

use serde_json::Value;

// == Memory Tier ==
/// Fast in-process value storage.
#[derive(Debug, Default)]
pub struct MemoryTier {
    values: HashMap<String, Value>,
}

impl MemoryTier {
    /// Creates an empty memory tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous value under the key.
    pub fn insert(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }

    /// Returns the value for a key, if resident.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Removes a key, returning whether it was resident.
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Whether the key is resident in this tier.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the tier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
