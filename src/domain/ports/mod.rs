mod backing_store;
mod geo_resolver;
mod result_cache;

pub use backing_store::BackingStore;
pub use geo_resolver::GeoResolver;
pub use result_cache::ResultCache;
