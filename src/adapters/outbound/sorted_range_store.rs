//! Sorted-Range Store
//!
//! Implements BackingStore for IP-to-location data. Point lookups binary
//! search an in-memory array of range upper bounds; every other query falls
//! back to exact matching on the same table.

use crate::adapters::outbound::SqliteExactStore;
use crate::domain::entities::ReferenceRecord;
use crate::domain::ports::BackingStore;
use crate::domain::value_objects::{Criteria, QueryValue, Schema, IP_COLUMN};
use crate::error::Result;
use std::net::Ipv4Addr;

/// Range-lookup backing store.
///
/// `bounds[i]` is the range upper bound of the row at storage position `i`,
/// sorted ascending.
pub struct SortedRangeStore {
    table: SqliteExactStore,
    bounds: Vec<u32>,
}

impl SortedRangeStore {
    /// Combine an exact store with its aligned, sorted bounds.
    pub(crate) fn new(table: SqliteExactStore, bounds: Vec<u32>) -> Self {
        Self { table, bounds }
    }

    /// Storage position of the range containing `value`.
    ///
    /// This is the leftmost upper bound strictly greater than `value`; a
    /// value past every bound has no range.
    pub fn position_of(&self, value: u32) -> Option<usize> {
        let idx = self.bounds.partition_point(|&bound| bound <= value);
        (idx < self.bounds.len()).then_some(idx)
    }

    /// Find the record whose range contains `value`.
    pub fn lookup_by_point(&self, value: u32) -> Result<Option<ReferenceRecord>> {
        match self.position_of(value) {
            Some(position) => self.table.fetch_at(position),
            None => Ok(None),
        }
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self) -> &[u32] {
        &self.bounds
    }
}

/// Canonical 32-bit integer form of a query value.
///
/// Accepts dotted IPv4 text or an integer already in range.
pub fn ip_to_int(value: &QueryValue) -> Option<u32> {
    match value {
        QueryValue::Text(s) => s.trim().parse::<Ipv4Addr>().ok().map(u32::from),
        QueryValue::Integer(i) => u32::try_from(*i).ok(),
        QueryValue::Real(_) => None,
    }
}

impl BackingStore for SortedRangeStore {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn lookup(&self, criteria: &Criteria) -> Result<Vec<ReferenceRecord>> {
        let point = criteria
            .single()
            .filter(|p| p.column.as_deref() == Some(IP_COLUMN));

        let Some(predicate) = point else {
            return self.table.lookup(criteria);
        };

        match ip_to_int(&predicate.value) {
            Some(value) => Ok(self.lookup_by_point(value)?.into_iter().collect()),
            None => {
                tracing::warn!("cannot convert {:?} to an IPv4 integer", predicate.value);
                Ok(Vec::new())
            }
        }
    }
}
