//! Request classification.
//!
//! Rules are evaluated in order and the first match wins:
//! 1. path starts with `/api/` → `Api`
//! 2. write method and path contains `/upload` → `Upload`
//! 3. destination is document, script, style or image → `Static`
//! 4. navigation flag → `Navigation`
//! 5. anything else → `Default`

use std::fmt;

use crate::model::{Destination, InterceptedRequest};

/// Caching strategy a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    Api,
    Upload,
    Static,
    Navigation,
    Default,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Api => "api",
            RequestCategory::Upload => "upload",
            RequestCategory::Static => "static",
            RequestCategory::Navigation => "navigation",
            RequestCategory::Default => "default",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assign a request to exactly one category.
pub fn classify(req: &InterceptedRequest) -> RequestCategory {
    let path = req.path();

    if path.starts_with("/api/") {
        return RequestCategory::Api;
    }

    if req.is_write() && path.contains("/upload") {
        return RequestCategory::Upload;
    }

    if matches!(
        req.destination,
        Destination::Document | Destination::Script | Destination::Style | Destination::Image
    ) {
        return RequestCategory::Static;
    }

    if req.navigate {
        return RequestCategory::Navigation;
    }

    RequestCategory::Default
}
