//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HARBOR_*)
/// 2. TOML config file (if HARBOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the origin application.
    ///
    /// Set via HARBOR_ORIGIN_URL environment variable.
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// Local address the proxy listens on.
    ///
    /// Set via HARBOR_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via HARBOR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for origin requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bound on every network attempt, in milliseconds. A timeout counts as a
    /// transport failure.
    ///
    /// Set via HARBOR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest request body the proxy accepts (uploads included).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Assets fetched into `static-assets` on install.
    ///
    /// Set via HARBOR_PRECACHE environment variable as an array, e.g. `[/,/app.js]`.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Root document served for failed navigations.
    #[serde(default = "default_app_shell_path")]
    pub app_shell_path: String,

    /// Dedicated offline document, second navigation fallback.
    #[serde(default = "default_offline_page_path")]
    pub offline_page_path: String,

    /// Entities whose `GET /api/<entity>` listing degrades to an empty payload.
    #[serde(default = "default_offline_listings")]
    pub offline_listings: Vec<String>,

    /// Origin path probed to detect connectivity.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Interval between connectivity probes, in milliseconds.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// First replay backoff, in milliseconds. Doubles per failed attempt.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Ceiling for the replay backoff, in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Failed replays before an upload moves to the dead-letter list.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Bound on pending uploads.
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,

    /// Title shown for push notifications.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    /// Body used when a push carries no text.
    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    /// Path opened by the `explore` notification action.
    #[serde(default = "default_explore_path")]
    pub explore_path: String,
}

fn default_origin_url() -> String {
    "http://127.0.0.1:3001".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./harbor-cache.sqlite")
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024 // 100MB
}

fn default_precache() -> Vec<String> {
    ["/", "/static/js/bundle.js", "/static/css/main.css", "/manifest.json", "/favicon.ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_app_shell_path() -> String {
    "/".into()
}

fn default_offline_page_path() -> String {
    "/offline.html".into()
}

fn default_offline_listings() -> Vec<String> {
    vec!["projects".into()]
}

fn default_health_path() -> String {
    "/api/health".into()
}

fn default_probe_interval_ms() -> u64 {
    15_000
}

fn default_retry_base_ms() -> u64 {
    30_000
}

fn default_retry_max_ms() -> u64 {
    300_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_queue_len() -> usize {
    1_000
}

fn default_notification_title() -> String {
    "AI Project Manager".into()
}

fn default_notification_body() -> String {
    "New activity in your projects".into()
}

fn default_explore_path() -> String {
    "/projects".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin_url: default_origin_url(),
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            precache: default_precache(),
            app_shell_path: default_app_shell_path(),
            offline_page_path: default_offline_page_path(),
            offline_listings: default_offline_listings(),
            health_path: default_health_path(),
            probe_interval_ms: default_probe_interval_ms(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            max_attempts: default_max_attempts(),
            max_queue_len: default_max_queue_len(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            explore_path: default_explore_path(),
        }
    }
}

impl AppConfig {
    /// Network attempt timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Parsed origin base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin_url` is not an http(s) URL.
    pub fn origin(&self) -> Result<url::Url, ConfigError> {
        let url = url::Url::parse(&self.origin_url)
            .map_err(|e| ConfigError::Invalid { field: "origin_url".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid {
                field: "origin_url".into(),
                reason: format!("unsupported scheme: {other}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HARBOR_`
    /// 2. TOML file from `HARBOR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HARBOR_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
