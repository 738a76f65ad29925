//! DashMap Result Cache
//!
//! Implements ResultCache using DashMap for lock-free concurrent access.

use crate::domain::entities::Resolution;
use crate::domain::ports::ResultCache;
use crate::domain::value_objects::QueryKey;
use dashmap::DashMap;

/// DashMap-backed result cache.
///
/// Unbounded: entries live as long as the owning resolver.
pub struct DashMapResultCache {
    entries: DashMap<QueryKey, Resolution>,
}

impl DashMapResultCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for DashMapResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache for DashMapResultCache {
    fn get(&self, key: &QueryKey) -> Option<Resolution> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn insert(&self, key: QueryKey, outcome: Resolution) {
        self.entries.insert(key, outcome);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
