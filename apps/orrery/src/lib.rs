//! # Orrery - Universe Graph Server
//!
//! Library surface of the orrery binary. The modules are exported here
//! so integration tests can build routers and configs directly; the
//! binary entry point lives in `main.rs`.

pub mod api;
pub mod cli;
pub mod config;
