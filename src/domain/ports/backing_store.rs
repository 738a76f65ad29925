//! Backing Store Port
//!
//! Defines the interface for querying one reference dataset.
//! Implementations differ in match strategy: exact equality, full-text
//! tokens, or sorted-range binary search.

use crate::domain::entities::ReferenceRecord;
use crate::domain::value_objects::{Criteria, Schema};
use crate::error::Result;

/// Read-only query interface over a built reference dataset.
///
/// This is an outbound port. A store is immutable once built; lookups never
/// mutate it, so implementations must be safe to share between threads.
pub trait BackingStore: Send + Sync {
    /// Schema of the rows this store returns.
    fn schema(&self) -> &Schema;

    /// Return every row matching `criteria`, in storage order.
    ///
    /// No match is an empty vector, not an error. Criteria the store cannot
    /// express return `GeoError::InvalidQueryShape`.
    fn lookup(&self, criteria: &Criteria) -> Result<Vec<ReferenceRecord>>;
}
