//! Error taxonomy for dataset loading and resolution.
//!
//! Construction-time failures (`LoadFailure`, `CapabilityUnavailable`,
//! `InvalidSchema`) are fatal and surface to the caller. Everything that
//! happens per row or per query is absorbed: malformed fields are logged
//! and nulled, bad queries resolve to `NotFound`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by stores, the loader and the resolver.
#[derive(Error, Debug)]
pub enum GeoError {
    /// Snapshot unreadable, store corrupt or range index invariant broken.
    #[error("failed to load dataset from {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// A storage engine feature required by the variant is missing.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A snapshot field could not be coerced to its declared type.
    ///
    /// Only ever logged; the row is kept with the field set absent.
    #[error("malformed value {value:?} for column {column} in row {row}")]
    MalformedField {
        row: usize,
        column: String,
        value: String,
    },

    /// Mismatched column/value lists, unknown columns, empty criteria.
    #[error("invalid query shape: {0}")]
    InvalidQueryShape(String),

    /// Dataset schema rejected at construction.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Sorted range side file could not be read or written.
    #[error("range index error: {0}")]
    RangeIndex(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoError {
    pub fn load_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LoadFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that must halt resolver construction.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LoadFailure { .. }
                | Self::CapabilityUnavailable(_)
                | Self::InvalidSchema(_)
                | Self::Io(_)
        )
    }
}

/// Result type for geolookup operations.
pub type Result<T> = std::result::Result<T, GeoError>;
