//! Network-first with cache fallback for `/api/` requests.

use serde_json::json;

use harbor_core::cache::API_RESPONSES;
use harbor_core::{CachedResponse, Error, InterceptedRequest, RequestCategory};

use super::{ServedFrom, StrategyExecutor, StrategyResult};
use crate::fetch::identity_key;

/// Marks an api response served from the cache.
pub const SERVED_FROM_HEADER: &str = "X-Served-From";

/// Empty listing returned for a known entity while offline.
///
/// `degraded_listing("projects")` is
/// `{"projects":[],"offline":true,"message":"Projects will sync when online"}`.
pub fn degraded_listing(entity: &str) -> CachedResponse {
    let mut label = entity.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    let mut body = serde_json::Map::new();
    body.insert(entity.to_string(), json!([]));
    body.insert("offline".into(), json!(true));
    body.insert("message".into(), json!(format!("{label} will sync when online")));
    CachedResponse::json(&serde_json::Value::Object(body))
}

impl StrategyExecutor {
    pub(super) async fn api(&self, req: &InterceptedRequest) -> Result<StrategyResult, Error> {
        let key = identity_key(&req.method, &req.url);

        let err = match self.origin.send(req).await {
            Ok(response) => {
                if req.method == "GET" && response.is_success() {
                    self.remember(&key, &response).await;
                }
                return Ok(StrategyResult::network(RequestCategory::Api, response));
            }
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };

        let generation = self.db.open_generation(API_RESPONSES).await?;
        if let Some(cached) = self.db.get(&generation, &key).await? {
            let response = cached.with_header(SERVED_FROM_HEADER, "cache");
            return Ok(StrategyResult::new(RequestCategory::Api, response, ServedFrom::Cache));
        }

        if let Some(entity) = self.listing_entity(req) {
            return Ok(StrategyResult::new(RequestCategory::Api, degraded_listing(entity), ServedFrom::Degraded));
        }

        Err(Error::UnrecognizedEndpoint(format!("{} {} ({err})", req.method, req.path())))
    }

    /// Store a fresh api response. A failed write only costs the next offline hit.
    async fn remember(&self, key: &str, response: &CachedResponse) {
        let stored = match self.db.open_generation(API_RESPONSES).await {
            Ok(generation) => self.db.put(&generation, key, response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            tracing::warn!(error = %e, "failed to cache api response");
        }
    }

    /// The configured entity named by a `GET /api/<entity>` listing, if any.
    fn listing_entity(&self, req: &InterceptedRequest) -> Option<&str> {
        if req.method != "GET" {
            return None;
        }
        let segment = req.path().strip_prefix("/api/")?.trim_end_matches('/');
        self.config
            .offline_listings
            .iter()
            .find(|entity| entity.as_str() == segment)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::strategy::tests::executor;
    use crate::testing::{ScriptedOrigin, url};

    #[test]
    fn test_degraded_listing_payload() {
        let resp = degraded_listing("projects");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(
            resp.body_value(),
            json!({"projects": [], "offline": true, "message": "Projects will sync when online"})
        );
    }

    #[tokio::test]
    async fn test_online_get_updates_cache() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/api/projects", CachedResponse::json(&json!([{"id": 1}]))));
        let (exec, db, _) = executor(origin.clone()).await;

        let result = exec.handle(InterceptedRequest::get(url("/api/projects"))).await.unwrap();
        assert_eq!(result.source, ServedFrom::Network);
        assert_eq!(result.response.header(SERVED_FROM_HEADER), None);

        let generation = db.open_generation(API_RESPONSES).await.unwrap();
        let cached = db.get(&generation, &identity_key("GET", &url("/api/projects"))).await.unwrap().unwrap();
        assert_eq!(cached, result.response);
    }

    #[tokio::test]
    async fn test_offline_serves_cached_copy_with_marker() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/api/projects", CachedResponse::json(&json!([{"id": 1}]))));
        let (exec, _, _) = executor(origin.clone()).await;
        exec.handle(InterceptedRequest::get(url("/api/projects"))).await.unwrap();

        origin.set_offline(true);
        let result = exec.handle(InterceptedRequest::get(url("/api/projects"))).await.unwrap();
        assert_eq!(result.source, ServedFrom::Cache);
        assert_eq!(result.response.header(SERVED_FROM_HEADER), Some("cache"));
        assert_eq!(result.response.body_value(), json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_and_not_cached() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/api/tasks", CachedResponse::new(500, "boom")));
        let (exec, db, _) = executor(origin).await;

        let result = exec.handle(InterceptedRequest::get(url("/api/tasks"))).await.unwrap();
        assert_eq!(result.response.status, 500);

        let generation = db.open_generation(API_RESPONSES).await.unwrap();
        assert!(db.entry_keys(&generation).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_projects_listing_degrades() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (exec, _, _) = executor(origin).await;

        let result = exec.handle(InterceptedRequest::get(url("/api/projects"))).await.unwrap();
        assert_eq!(result.source, ServedFrom::Degraded);
        let body: Value = result.response.body_value();
        assert_eq!(body["projects"], json!([]));
        assert_eq!(body["offline"], json!(true));
        assert_eq!(body["message"], json!("Projects will sync when online"));
    }

    #[tokio::test]
    async fn test_offline_unknown_endpoint_fails() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (exec, _, _) = executor(origin).await;

        let err = exec.handle(InterceptedRequest::get(url("/api/tasks"))).await.unwrap_err();
        assert!(matches!(err, Error::UnrecognizedEndpoint(_)), "got {err}");

        let nested = exec.handle(InterceptedRequest::get(url("/api/projects/7"))).await.unwrap_err();
        assert!(matches!(nested, Error::UnrecognizedEndpoint(_)));
    }

    #[tokio::test]
    async fn test_offline_write_to_api_is_not_degraded() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let (exec, _, queue) = executor(origin).await;

        let req = InterceptedRequest::new("POST", url("/api/projects")).with_body("{}");
        let err = exec.handle(req).await.unwrap_err();
        assert!(matches!(err, Error::UnrecognizedEndpoint(_)));
        assert!(queue.is_empty().await.unwrap());
    }
}
