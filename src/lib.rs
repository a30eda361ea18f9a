//! recap library crate: capture, index, and replay of edit histories.
//!
//! The primary interface is the `recap` binary. This lib.rs exposes the
//! modules so that integration tests and embedders can record operations,
//! rebuild the repository index, and replay files directly.
//!
//! | Module | Role |
//! |--------|------|
//! | [`capture`] | live operation log, flushes durable log files |
//! | [`repository`] | rebuilds the workspace → project → package → file index |
//! | [`replay`] | focal search and text reconstruction |
//! | [`config`] | `.recap/config.toml` |
//! | [`telemetry`] | tracing subscriber setup |
//!
//! The operation model and log codec live in the `recap-oplog` crate,
//! re-exported here as [`oplog`].

pub mod capture;
pub mod config;
pub mod replay;
pub mod repository;
pub mod telemetry;

pub use recap_oplog as oplog;
