//! # Storage
//!
//! Durable backends for the universe graph. The engine always works on
//! an in-memory [`crate::graph::UniverseGraph`]; this module keeps that
//! graph on disk.

pub mod redb_store;

pub use redb_store::RedbStore;
