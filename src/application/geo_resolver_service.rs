//! Geo Resolver Service - Main application use case
//!
//! Orchestrates one resolution: normalize the criteria into a cache key,
//! answer from the result cache when possible, otherwise query the backing
//! store and shape the matched rows into a result record.

use crate::adapters::outbound::{
    DashMapResultCache, SortedRangeStore, SqliteExactStore, SqliteFullTextStore,
};
use crate::domain::entities::Resolution;
use crate::domain::ports::{BackingStore, GeoResolver, ResultCache};
use crate::domain::services::record_shaper;
use crate::domain::value_objects::{Combinator, Criteria, QueryValue};
use crate::error::{GeoError, Result};
use crate::infrastructure::loader::{self, DatasetSpec};
use std::sync::Arc;

/// Geo resolver over one backing store.
///
/// Owns a result cache that grows for the lifetime of the resolver. The
/// store is never mutated by a lookup; cache insertion is the only side
/// effect of `resolve`.
pub struct GeoResolverService<S: ?Sized> {
    store: Arc<S>,
    cache: Arc<dyn ResultCache>,
}

/// Country resolver: exact match on code or name.
pub type CountryResolver = GeoResolverService<SqliteExactStore>;

/// Postal-code resolver: full-text match on place and admin names.
pub type ZipResolver = GeoResolverService<SqliteFullTextStore>;

/// IP resolver: sorted-range lookup on IPv4 addresses.
pub type IpResolver = GeoResolverService<SortedRangeStore>;

impl<S: BackingStore + ?Sized> GeoResolverService<S> {
    /// Create a resolver from a store and a cache.
    pub fn new(store: Arc<S>, cache: Arc<dyn ResultCache>) -> Self {
        Self { store, cache }
    }

    /// Create a resolver with a fresh in-memory cache.
    pub fn with_store(store: Arc<S>) -> Self {
        Self::new(store, Arc::new(DashMapResultCache::new()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of cached query keys.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a single `column = value` predicate.
    pub fn resolve_field(
        &self,
        column: impl Into<String>,
        value: impl Into<QueryValue>,
    ) -> Resolution {
        self.resolve(&Criteria::field(column, value))
    }

    /// Resolve parallel column and value lists joined by `combinator`.
    ///
    /// Mismatched or empty lists resolve to `NotFound`.
    pub fn resolve_fields<C, V>(
        &self,
        columns: impl IntoIterator<Item = C>,
        values: impl IntoIterator<Item = V>,
        combinator: Combinator,
    ) -> Resolution
    where
        C: Into<String>,
        V: Into<QueryValue>,
    {
        match Criteria::fields(columns, values) {
            Ok(criteria) => self.resolve(&criteria.with_combinator(combinator)),
            Err(e) => {
                tracing::warn!("{}", e);
                Resolution::NotFound
            }
        }
    }
}

impl<S: BackingStore + ?Sized> GeoResolver for GeoResolverService<S> {
    fn resolve(&self, criteria: &Criteria) -> Resolution {
        let key = criteria.key();

        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("cache hit for {}", key);
            return hit;
        }

        let outcome = match self.store.lookup(criteria) {
            Ok(rows) => record_shaper::shape(rows, self.store.schema()),
            Err(GeoError::InvalidQueryShape(reason)) => {
                tracing::warn!("cannot resolve {}: {}", key, reason);
                Resolution::NotFound
            }
            Err(e) => {
                // Not cached: a later call may succeed.
                tracing::warn!("lookup for {} failed: {}", key, e);
                return Resolution::NotFound;
            }
        };

        if !outcome.is_found() {
            tracing::debug!("no match for {}", key);
        }
        self.cache.insert(key, outcome.clone());
        outcome
    }
}

impl GeoResolverService<dyn BackingStore> {
    /// Open or build the dataset and pick the store variant from its strategy.
    pub fn open(spec: &DatasetSpec) -> Result<Self> {
        let store: Arc<dyn BackingStore> = Arc::from(loader::open_or_build(spec)?);
        Ok(Self::with_store(store))
    }
}

impl CountryResolver {
    pub fn open(spec: &DatasetSpec) -> Result<Self> {
        Ok(Self::with_store(Arc::new(loader::open_exact(spec)?)))
    }
}

impl ZipResolver {
    pub fn open(spec: &DatasetSpec) -> Result<Self> {
        Ok(Self::with_store(Arc::new(loader::open_full_text(spec)?)))
    }
}

impl IpResolver {
    pub fn open(spec: &DatasetSpec) -> Result<Self> {
        Ok(Self::with_store(Arc::new(loader::open_sorted_range(spec)?)))
    }

    /// Resolve a dotted IPv4 address.
    pub fn resolve_ip(&self, address: &str) -> Resolution {
        self.resolve(&Criteria::ip(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{FieldValue, GeoPoint, ReferenceRecord};
    use crate::domain::value_objects::{Schema, LATITUDE, LONGITUDE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ===== Mock Implementations =====

    struct MockStore {
        schema: Schema,
        rows: Vec<ReferenceRecord>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl MockStore {
        fn new(rows: Vec<ReferenceRecord>) -> Self {
            Self {
                schema: Schema::country(),
                rows,
                lookups: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl BackingStore for MockStore {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn lookup(&self, criteria: &Criteria) -> Result<Vec<ReferenceRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeoError::Storage(rusqlite::Error::QueryReturnedNoRows));
            }
            let predicate = criteria
                .single()
                .ok_or_else(|| GeoError::InvalidQueryShape("mock takes one predicate".into()))?;
            let column = predicate.column.as_deref().unwrap_or("country_code");
            if !self.schema.has_column(column) {
                return Err(GeoError::InvalidQueryShape(format!("unknown column {}", column)));
            }
            let wanted = predicate.value.as_text();
            Ok(self
                .rows
                .iter()
                .filter(|r| r.get(column).and_then(FieldValue::as_str) == Some(wanted.as_str()))
                .cloned()
                .collect())
        }
    }

    // ===== Test Helpers =====

    fn country(code: &str, name: &str, lat: f64, lon: f64) -> ReferenceRecord {
        [
            (LATITUDE, FieldValue::Real(lat)),
            (LONGITUDE, FieldValue::Real(lon)),
            ("country_code", FieldValue::from(code)),
            ("country_name", FieldValue::from(name)),
        ]
        .into_iter()
        .collect()
    }

    fn service(store: Arc<MockStore>) -> GeoResolverService<MockStore> {
        GeoResolverService::with_store(store)
    }

    // ===== resolve Tests =====

    #[test]
    fn test_resolve_single_row() {
        let store = Arc::new(MockStore::new(vec![country("MX", "MEXICO", 23.634501, -102.552784)]));
        let service = service(store);

        let resolution = service.resolve_field("country_code", "MX");
        let record = resolution.record().unwrap();

        assert_eq!(record.get("country_name"), Some(&FieldValue::from("MEXICO")));
        assert_eq!(record.get(LATITUDE), None);
        assert_eq!(record.location, Some(GeoPoint::new(23.634501, -102.552784)));
        assert_eq!(record.location, record.representative_point);
    }

    #[test]
    fn test_resolve_multiple_rows_uses_first_for_location() {
        let store = Arc::new(MockStore::new(vec![
            country("XX", "A", 10.0, 10.0),
            country("XX", "B", 0.0, 0.0),
            country("XX", "C", -10.0, -10.0),
        ]));
        let service = service(store);

        let record = service.resolve_field("country_code", "XX").into_option().unwrap();

        assert_eq!(record.get("country_name"), Some(&FieldValue::from("A")));
        assert_eq!(record.location, Some(GeoPoint::new(10.0, 10.0)));
        assert_eq!(record.representative_point, Some(GeoPoint::new(0.0, 0.0)));
    }

    #[test]
    fn test_resolve_no_match() {
        let service = service(Arc::new(MockStore::new(vec![])));
        assert_eq!(service.resolve_field("country_code", "ZZ"), Resolution::NotFound);
    }

    // ===== Cache Tests =====

    #[test]
    fn test_repeated_query_served_from_cache() {
        let store = Arc::new(MockStore::new(vec![country("MX", "MEXICO", 23.6, -102.5)]));
        let service = service(store.clone());

        let first = service.resolve_field("country_code", "MX");
        let second = service.resolve_field("country_code", "MX");

        assert_eq!(first, second);
        assert_eq!(store.lookups(), 1);
        assert_eq!(service.cached(), 1);
    }

    #[test]
    fn test_not_found_is_cached() {
        let store = Arc::new(MockStore::new(vec![]));
        let service = service(store.clone());

        service.resolve_field("country_code", "ZZ");
        service.resolve_field("country_code", "ZZ");

        assert_eq!(store.lookups(), 1);
    }

    #[test]
    fn test_single_and_list_forms_share_cache_slot() {
        let store = Arc::new(MockStore::new(vec![country("MX", "MEXICO", 23.6, -102.5)]));
        let service = service(store.clone());

        service.resolve_field("country_code", "MX");
        service.resolve_fields(vec!["country_code"], vec!["MX"], Combinator::Or);

        assert_eq!(store.lookups(), 1);
    }

    #[test]
    fn test_storage_error_not_cached() {
        let store = Arc::new(MockStore::failing());
        let service = service(store.clone());

        assert_eq!(service.resolve_field("country_code", "MX"), Resolution::NotFound);
        assert_eq!(service.resolve_field("country_code", "MX"), Resolution::NotFound);

        assert_eq!(store.lookups(), 2);
        assert_eq!(service.cached(), 0);
    }

    #[test]
    fn test_unknown_column_resolves_not_found() {
        let service = service(Arc::new(MockStore::new(vec![country("MX", "MEXICO", 1.0, 1.0)])));
        assert_eq!(service.resolve_field("continent", "MX"), Resolution::NotFound);
    }

    #[test]
    fn test_mismatched_lists_not_found() {
        let store = Arc::new(MockStore::new(vec![]));
        let service = service(store.clone());

        let resolution =
            service.resolve_fields(vec!["country_code", "country_name"], vec!["MX"], Combinator::And);

        assert_eq!(resolution, Resolution::NotFound);
        assert_eq!(store.lookups(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let store = Arc::new(MockStore::new(vec![country("MX", "MEXICO", 23.6, -102.5)]));
        let service = Arc::new(service(store));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                std::thread::spawn(move || service.resolve_field("country_code", "MX").is_found())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(service.cached(), 1);
    }

    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CountryResolver>();
        assert_send_sync::<IpResolver>();
        assert_send_sync::<GeoResolverService<dyn BackingStore>>();
    }
}
