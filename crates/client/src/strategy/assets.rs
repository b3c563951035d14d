//! Static assets, page navigations and everything else.

use harbor_core::cache::{CURRENT_GENERATIONS, STATIC_ASSETS};
use harbor_core::{CachedResponse, Destination, Error, InterceptedRequest, RequestCategory};

use super::{ServedFrom, StrategyExecutor, StrategyResult};
use crate::fetch::{identity_key, resolve};

impl StrategyExecutor {
    /// Cache-first. A hit never touches the network.
    ///
    /// Only `GET` is cached; a document-destined form post goes straight out.
    pub(super) async fn static_asset(&self, req: &InterceptedRequest) -> Result<StrategyResult, Error> {
        if req.method != "GET" {
            return self.origin.send(req).await.map(|r| StrategyResult::network(RequestCategory::Static, r));
        }

        let key = identity_key(&req.method, &req.url);
        let generation = self.db.open_generation(STATIC_ASSETS).await?;

        if let Some(hit) = self.db.get(&generation, &key).await? {
            return Ok(StrategyResult::new(RequestCategory::Static, hit, ServedFrom::Cache));
        }

        match self.origin.send(req).await {
            Ok(response) => {
                if response.is_success()
                    && let Err(e) = self.db.put(&generation, &key, &response).await
                {
                    tracing::warn!(url = %req.url, error = %e, "failed to cache static asset");
                }
                Ok(StrategyResult::network(RequestCategory::Static, response))
            }
            Err(e) if e.is_transport() && req.destination == Destination::Image => Ok(StrategyResult::new(
                RequestCategory::Static,
                CachedResponse::empty(),
                ServedFrom::Placeholder,
            )),
            Err(e) => Err(e),
        }
    }

    /// Network-first; offline, serve the app shell or else the offline page.
    pub(super) async fn navigation(&self, req: &InterceptedRequest) -> Result<StrategyResult, Error> {
        let err = match self.origin.send(req).await {
            Ok(response) => return Ok(StrategyResult::network(RequestCategory::Navigation, response)),
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };

        let generation = self.db.open_generation(STATIC_ASSETS).await?;
        for path in [&self.config.app_shell_path, &self.config.offline_page_path] {
            let url = resolve(&self.base, path)?;
            if let Some(page) = self.db.get(&generation, &identity_key("GET", &url)).await? {
                return Ok(StrategyResult::new(RequestCategory::Navigation, page, ServedFrom::Cache));
            }
        }

        Err(err)
    }

    /// Network-first; offline, any current generation holding the request.
    pub(super) async fn default_fetch(&self, req: &InterceptedRequest) -> Result<StrategyResult, Error> {
        let err = match self.origin.send(req).await {
            Ok(response) => return Ok(StrategyResult::network(RequestCategory::Default, response)),
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };
        if req.method != "GET" {
            return Err(err);
        }

        match self.db.match_any(CURRENT_GENERATIONS, &identity_key(&req.method, &req.url)).await? {
            Some(hit) => Ok(StrategyResult::new(RequestCategory::Default, hit, ServedFrom::Cache)),
            None => Err(err),
        }
    }
}
