//! Infrastructure Layer
//!
//! Dataset lifecycle: building stores from snapshots and reopening them.

pub mod loader;

pub use loader::{
    fts5_available, open_exact, open_full_text, open_or_build, open_sorted_range, DatasetSpec,
    MatchStrategy,
};
