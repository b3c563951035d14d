//! Intercepted request and its declared resource kind.

use bytes::Bytes;
use url::Url;

/// Methods that mutate origin state.
const WRITE_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

/// Declared resource kind of a request, as sent in `Sec-Fetch-Dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value. Missing or blank means `Empty`.
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        }
    }
}

/// A request captured by the proxy before any strategy runs.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    /// Upper-case method name.
    pub method: String,
    /// Absolute URL on the origin.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub destination: Destination,
    /// Top-level page load (`Sec-Fetch-Mode: navigate`).
    pub navigate: bool,
}

impl InterceptedRequest {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            destination: Destination::Empty,
            navigate: false,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A top-level page load.
    pub fn navigation(url: Url) -> Self {
        Self { navigate: true, ..Self::get(url) }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_write(&self) -> bool {
        WRITE_METHODS.contains(&self.method.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://origin.test").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_method_is_uppercased() {
        let req = InterceptedRequest::new("post", url("/x"));
        assert_eq!(req.method, "POST");
        assert!(req.is_write());
    }

    #[test]
    fn test_read_methods_are_not_writes() {
        assert!(!InterceptedRequest::get(url("/x")).is_write());
        assert!(!InterceptedRequest::new("DELETE", url("/x")).is_write());
    }

    #[test]
    fn test_destination_parsing() {
        assert_eq!(Destination::from_fetch_dest("image"), Destination::Image);
        assert_eq!(Destination::from_fetch_dest(" Script "), Destination::Script);
        assert_eq!(Destination::from_fetch_dest(""), Destination::Empty);
        assert_eq!(Destination::from_fetch_dest("iframe"), Destination::Other);
    }

    #[test]
    fn test_navigation_constructor() {
        let req = InterceptedRequest::navigation(url("/projects"));
        assert!(req.navigate);
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/projects");
    }
}
