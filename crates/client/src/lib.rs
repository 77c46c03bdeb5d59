//! Client code for squall.
//!
//! This crate provides the HTTP fetch mechanism the interception layer falls
//! back to, plus URL canonicalization for origins and manifest entries.

pub mod fetch;

pub use fetch::url::{UrlError, canonicalize, resolve};
pub use fetch::{FetchClient, FetchConfig, FetchResponse};
