//! Origin transport.
//!
//! Every strategy reaches the origin through the [`Origin`] trait, so a
//! strategy never knows whether it talks to a live server or a scripted fake.
//!
//! ### Failure model
//! - Connection refused/reset, DNS failure and timeouts are
//!   `Error::TransportFailure`, the one signal that triggers offline fallbacks.
//! - Any HTTP status, including 4xx/5xx, is a successful transport and is
//!   returned to the caller as-is.
//! - Redirects are not followed; the client sees them unchanged.

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};

use harbor_core::{AppConfig, CachedResponse, Error, InterceptedRequest};

pub use self::url::{UrlError, canonicalize, identity_key, resolve};

/// Headers that describe one hop rather than the message, plus the ones the
/// HTTP stack recomputes itself.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// Whether a header must not be forwarded between client and origin.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Something that can answer an intercepted request over the network.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Send the request and return the complete response.
    ///
    /// Returns `Error::TransportFailure` when the origin cannot be reached.
    async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Bound on a single attempt, connect through last body byte (default: 20s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "harbor/0.1".to_string(), timeout: Duration::from_millis(20_000) }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// reqwest-backed [`Origin`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn transport_error(&self, req: &InterceptedRequest, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::TransportFailure(format!(
                "{} {} timed out after {}ms",
                req.method,
                req.url,
                self.config.timeout.as_millis()
            ))
        } else {
            Error::TransportFailure(format!("{} {}: {err}", req.method, req.url))
        }
    }
}

#[async_trait]
impl Origin for FetchClient {
    async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("method {:?}: {e}", req.method)))?;

        let mut request = self.http.request(method, req.url.clone());
        for (name, value) in req.headers.iter().filter(|(name, _)| !is_hop_by_hop(name)) {
            request = request.header(name.as_str(), value.as_str());
        }
        if !req.body.is_empty() {
            request = request.body(req.body.clone());
        }

        let response = request.send().await.map_err(|e| self.transport_error(req, &e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await.map_err(|e| self.transport_error(req, &e))?;

        tracing::debug!(
            method = %req.method,
            url = %req.url,
            status,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "origin responded"
        );

        Ok(CachedResponse { status, headers, body })
    }
}
