//! # Formats
//!
//! Pure byte-level encodings for graph snapshots. File and database I/O
//! live in the storage layer and the app; everything here is a
//! transformation between in-memory graphs and byte vectors.

pub mod persistence;

pub use persistence::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
