//! Response snapshot value type.

use bytes::Bytes;
use serde_json::Value;

use crate::Error;

/// A complete response held in memory.
///
/// The body is a `Bytes` handle, so storing a response in the cache and
/// returning it to the caller share one buffer instead of consuming it twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    /// Header pairs in arrival order; names compare case-insensitively.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// A 200 response with a JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string()).with_header("Content-Type", "application/json")
    }

    /// An empty 200 response, used as an image placeholder.
    pub fn empty() -> Self {
        Self::new(200, Bytes::new())
    }

    /// Append a header, keeping any existing value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON when it parses, otherwise as lossy UTF-8 text.
    pub fn body_value(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into()))
    }

    pub(crate) fn headers_json(&self) -> Result<String, Error> {
        serde_json::to_string(&self.headers).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub(crate) fn from_stored(status: u16, headers_json: &str, body: Vec<u8>) -> Result<Self, Error> {
        let headers = serde_json::from_str(headers_json).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(Self { status, headers, body: Bytes::from(body) })
    }
}
