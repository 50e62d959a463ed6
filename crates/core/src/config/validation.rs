//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, parse_base_origin};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `version_tag` is empty, and
    /// `ConfigError::Invalid` if:
    /// - `version_tag` contains whitespace
    /// - `base_origin` is not an http(s) URL with a host
    /// - `offline_path` does not start with `/`
    /// - a `precache` entry or `deny_prefixes` entry is empty
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version_tag.is_empty() {
            return Err(ConfigError::Missing {
                field: "version_tag".into(),
                hint: "Set SWCACHE_VERSION_TAG to the deployment identifier".into(),
            });
        }
        if self.version_tag.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "version_tag".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        parse_base_origin(&self.base_origin)?;

        if !self.offline_path.starts_with('/') {
            return Err(ConfigError::Invalid { field: "offline_path".into(), reason: "must start with '/'".into() });
        }

        if self.precache.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "precache".into(), reason: "entries must not be empty".into() });
        }

        if self.deny_prefixes.iter().any(|prefix| prefix.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "deny_prefixes".into(),
                reason: "an empty prefix would deny every request".into(),
            });
        }

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

        if !self.precache.iter().any(|entry| entry.trim() == self.offline_path) {
            tracing::warn!(
                offline_path = %self.offline_path,
                "offline_path is not in the precache manifest; \
                 navigations with nothing cached will get the synthesized offline response"
            );
        }

        Ok(())
    }
}
