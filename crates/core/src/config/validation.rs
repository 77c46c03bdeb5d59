//! Configuration validation rules.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `listen_addr` is not a socket address
    /// - `origin` is not an http(s) URL
    /// - `precache` is empty or contains an empty entry
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "listen_addr".into(),
                reason: format!("'{}' is not a host:port address", self.listen_addr),
            });
        }

        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: "must be an absolute http(s) URL".into(),
            });
        }

        if self.precache.is_empty() {
            return Err(ConfigError::Invalid {
                field: "precache".into(),
                reason: "must list at least one path".into(),
            });
        }
        if self.precache.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "precache".into(),
                reason: "entries must not be empty".into(),
            });
        }

        let unique: HashSet<&String> = self.precache.iter().collect();
        if unique.len() != self.precache.len() {
            tracing::warn!(
                entries = self.precache.len(),
                unique = unique.len(),
                "precache manifest contains duplicate entries; duplicates are fetched once"
            );
        }

        Ok(())
    }
}
