//! Adapters Layer
//!
//! Implementations of the domain ports against SQLite, snapshot files and
//! in-memory maps.

pub mod outbound;
