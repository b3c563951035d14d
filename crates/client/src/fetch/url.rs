//! URL canonicalization and request identity.

use harbor_core::cache::hash::compute_cache_key;
use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for harbor_core::Error {
    fn from(err: UrlError) -> Self {
        harbor_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute http(s) URL so equivalent spellings share one identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

fn normalize(mut url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        url.set_host(Some(&lowered)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    url.set_fragment(None);
    Ok(url)
}

/// Resolve an origin-relative path (`/static/app.js`) against the origin base.
pub fn resolve(base: &Url, path: &str) -> Result<Url, UrlError> {
    if path.trim().is_empty() {
        return Err(UrlError::Empty);
    }
    let joined = base.join(path).map_err(|e| UrlError::InvalidUrl(format!("{path}: {e}")))?;
    normalize(joined)
}

/// Cache key for a request identity: method plus canonical URL.
///
/// Fragments never reach the key, so `/a#x` and `/a` share an entry.
pub fn identity_key(method: &str, url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    compute_cache_key(method, canonical.as_str())
}
