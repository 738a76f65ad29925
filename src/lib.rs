//! geolookup Library
//!
//! Resolves partial geographic identifiers (country codes and names, postal
//! codes, place names, IPv4 addresses) to normalized location records.
//! Exposes the components for use in integration tests and as a library.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CountryResolver, GeoResolverService, IpResolver, ZipResolver};
pub use config::{load_config, Config, DatasetKind};
pub use domain::entities::{FieldValue, GeoPoint, ReferenceRecord, Resolution, ResultRecord};
pub use domain::ports::{BackingStore, GeoResolver, ResultCache};
pub use domain::services::RepresentativePoint;
pub use domain::value_objects::{Combinator, Criteria, QueryKey, QueryValue, Schema};
pub use error::{GeoError, Result};
pub use infrastructure::{open_or_build, DatasetSpec, MatchStrategy};
