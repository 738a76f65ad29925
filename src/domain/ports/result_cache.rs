//! Result Cache Port
//!
//! Defines the interface for memoizing resolution outcomes.

use crate::domain::entities::Resolution;
use crate::domain::value_objects::QueryKey;

/// Per-resolver memo of query key to outcome.
///
/// Caches both found records and `NotFound`. There is no eviction: the
/// cache grows for the lifetime of its resolver and is dropped with it.
pub trait ResultCache: Send + Sync {
    /// Get the cached outcome for a key, if one exists.
    fn get(&self, key: &QueryKey) -> Option<Resolution>;

    /// Store an outcome. A concurrent insert for the same key overwrites
    /// with an equal value.
    fn insert(&self, key: QueryKey, outcome: Resolution);

    /// Number of cached keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
