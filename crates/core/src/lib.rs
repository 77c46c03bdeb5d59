//! Core types and shared functionality for squall.
//!
//! This crate provides:
//! - The durable store that holds precached responses (SQLite backend)
//! - The interception policy: precache initialization and cache-first lookup
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod intercept;
pub mod store;

pub use config::AppConfig;
pub use error::{Error, InitError};
pub use intercept::{Fetch, FetchedResource, Interceptor, Manifest, ResourceRequest, ServeSource, Served};
pub use store::{StoreDb, StoredResponse};
