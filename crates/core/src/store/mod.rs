//! SQLite-backed durable store for precached responses.
//!
//! The store is a named, persistent key-value container addressed by request
//! identity, with async access via tokio-rusqlite. It supports:
//!
//! - Identity keys derived from method + URL (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A single-transaction batch write for the precache pass

pub mod connection;
pub mod install_runs;
pub mod key;
pub mod migrations;
pub mod responses;

pub use crate::Error;

pub use connection::StoreDb;
pub use install_runs::InstallRun;
pub use responses::StoredResponse;
