//! Geo Resolver Port
//!
//! Defines the interface for resolving partial geographic identifiers to
//! normalized geolocation records.

use crate::domain::entities::Resolution;
use crate::domain::value_objects::Criteria;

/// Resolver for country codes, place names, postal codes or IP addresses.
///
/// This is the public-facing port. Implementations own a backing store and a
/// result cache; repeated queries are answered from the cache.
pub trait GeoResolver: Send + Sync {
    /// Resolve criteria to a record, or `NotFound` when nothing matches or
    /// the criteria are malformed.
    fn resolve(&self, criteria: &Criteria) -> Resolution;
}
