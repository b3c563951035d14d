//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

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

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn require_absolute_path(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') { Ok(()) } else { Err(invalid(field, format!("path must start with '/': {path:?}"))) }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin_url` is not an http(s) URL or `listen_addr` is not a socket address
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - retry settings are zero or `retry_base_ms` exceeds `retry_max_ms`
    /// - `max_queue_len` or `max_body_bytes` is 0
    /// - a configured path does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin()?;

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid("listen_addr", format!("not a socket address: {:?}", self.listen_addr)));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.probe_interval_ms < 100 {
            return Err(invalid("probe_interval_ms", "must be at least 100ms"));
        }

        if self.retry_base_ms == 0 {
            return Err(invalid("retry_base_ms", "must be greater than 0"));
        }
        if self.retry_base_ms > self.retry_max_ms {
            return Err(invalid("retry_base_ms", "must not exceed retry_max_ms"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than 0"));
        }

        if self.max_queue_len == 0 {
            return Err(invalid("max_queue_len", "must be greater than 0"));
        }
        if self.max_body_bytes == 0 {
            return Err(invalid("max_body_bytes", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        for path in &self.precache {
            require_absolute_path("precache", path)?;
        }
        require_absolute_path("app_shell_path", &self.app_shell_path)?;
        require_absolute_path("offline_page_path", &self.offline_page_path)?;
        require_absolute_path("health_path", &self.health_path)?;
        require_absolute_path("explore_path", &self.explore_path)?;

        if self.offline_listings.iter().any(|e| e.is_empty() || e.contains('/')) {
            return Err(invalid("offline_listings", "entries must be single path segments"));
        }

        if self.precache.is_empty() {
            tracing::warn!("precache is empty; failed navigations will have no app shell to fall back to");
        }

        Ok(())
    }
}
