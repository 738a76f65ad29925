//! Application Layer
//!
//! Use cases that orchestrate the domain ports.

mod geo_resolver_service;

pub use geo_resolver_service::{CountryResolver, GeoResolverService, IpResolver, ZipResolver};
