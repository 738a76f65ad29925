mod dashmap_result_cache;
pub mod range_index_file;
pub mod snapshot_reader;
mod sorted_range_store;
mod sqlite_exact_store;
mod sqlite_fts_store;
mod sqlite_rows;

pub use dashmap_result_cache::DashMapResultCache;
pub use snapshot_reader::{Compression, SnapshotFormat};
pub use sorted_range_store::{ip_to_int, SortedRangeStore};
pub use sqlite_exact_store::SqliteExactStore;
pub use sqlite_fts_store::SqliteFullTextStore;
