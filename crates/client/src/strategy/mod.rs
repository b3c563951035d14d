//! Per-category caching strategies.
//!
//! [`StrategyExecutor::handle`] classifies a request and runs exactly one
//! strategy for it. Transport failures are absorbed wherever the category
//! defines a fallback; everything else propagates to the caller.
//!
//! | category   | order                          | offline fallback                      |
//! |------------|--------------------------------|---------------------------------------|
//! | api        | network, then cache            | cached copy, then degraded listing    |
//! | upload     | network                        | queue for replay, acknowledge         |
//! | static     | cache, then network            | empty placeholder for images          |
//! | navigation | network                        | app shell, then offline page          |
//! | default    | network                        | any current generation                |

mod api;
mod assets;
mod upload;

use std::sync::Arc;

use url::Url;

use harbor_core::{AppConfig, CacheDb, CachedResponse, Error, InterceptedRequest, RequestCategory, UploadQueue, classify};

use crate::fetch::Origin;

pub use api::{SERVED_FROM_HEADER, degraded_listing};

/// Where a response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
    /// Synthesized empty listing for a known entity.
    Degraded,
    /// Upload accepted into the replay queue under this id.
    Queued(String),
    /// Empty image placeholder.
    Placeholder,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Network => "network",
            ServedFrom::Cache => "cache",
            ServedFrom::Degraded => "degraded",
            ServedFrom::Queued(_) => "queued",
            ServedFrom::Placeholder => "placeholder",
        }
    }
}

/// Outcome of one intercepted request.
#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub category: RequestCategory,
    pub response: CachedResponse,
    pub source: ServedFrom,
}

impl StrategyResult {
    pub fn new(category: RequestCategory, response: CachedResponse, source: ServedFrom) -> Self {
        Self { category, response, source }
    }

    /// A live origin response.
    pub fn network(category: RequestCategory, response: CachedResponse) -> Self {
        Self::new(category, response, ServedFrom::Network)
    }
}

/// Paths and entities the fallbacks need.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub app_shell_path: String,
    pub offline_page_path: String,
    pub offline_listings: Vec<String>,
}

impl From<&AppConfig> for StrategyConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            app_shell_path: config.app_shell_path.clone(),
            offline_page_path: config.offline_page_path.clone(),
            offline_listings: config.offline_listings.clone(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Routes intercepted requests through the strategy for their category.
pub struct StrategyExecutor {
    origin: Arc<dyn Origin>,
    db: CacheDb,
    queue: UploadQueue,
    base: Url,
    config: StrategyConfig,
}

impl StrategyExecutor {
    pub fn new(origin: Arc<dyn Origin>, db: CacheDb, queue: UploadQueue, base: Url, config: StrategyConfig) -> Self {
        Self { origin, db, queue, base, config }
    }

    /// Classify and answer a request.
    ///
    /// # Errors
    ///
    /// - `TransportFailure` when the origin is unreachable and the category has
    ///   no usable fallback
    /// - `UnrecognizedEndpoint` for an api request with no cached copy and no
    ///   degraded listing
    /// - `QueueFull`/`QueuePersistence` when an offline upload cannot be queued
    pub async fn handle(&self, req: InterceptedRequest) -> Result<StrategyResult, Error> {
        let category = classify(&req);
        tracing::debug!(method = %req.method, url = %req.url, category = %category, "intercepted");

        let result = match category {
            RequestCategory::Api => self.api(&req).await,
            RequestCategory::Upload => self.upload(&req).await,
            RequestCategory::Static => self.static_asset(&req).await,
            RequestCategory::Navigation => self.navigation(&req).await,
            RequestCategory::Default => self.default_fetch(&req).await,
        }?;

        if result.source != ServedFrom::Network {
            tracing::info!(
                method = %req.method,
                url = %req.url,
                category = %category,
                served_from = result.source.as_str(),
                "served offline"
            );
        }

        Ok(result)
    }
}
