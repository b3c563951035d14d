//! Network-only uploads, queued for replay when the origin is unreachable.

use chrono::Utc;
use serde_json::json;

use harbor_core::{CachedResponse, Error, InterceptedRequest, RequestCategory, UploadQueueItem};

use super::{ServedFrom, StrategyExecutor, StrategyResult};

/// Acknowledgement returned in place of the origin's response.
pub(crate) fn queued_ack(id: &str) -> CachedResponse {
    CachedResponse::json(&json!({
        "success": false,
        "offline": true,
        "message": "Upload queued for when online",
        "queueId": id,
    }))
}

impl StrategyExecutor {
    pub(super) async fn upload(&self, req: &InterceptedRequest) -> Result<StrategyResult, Error> {
        match self.origin.send(req).await {
            Ok(response) => Ok(StrategyResult::network(RequestCategory::Upload, response)),
            Err(e) if e.is_transport() => {
                let item = UploadQueueItem::from_request(req, Utc::now());
                let id = item.id.clone();
                let pending = self.queue.enqueue(item).await?;

                tracing::info!(queue_id = %id, pending, url = %req.url, reason = %e, "upload queued for replay");

                Ok(StrategyResult::new(RequestCategory::Upload, queued_ack(&id), ServedFrom::Queued(id)))
            }
            Err(e) => Err(e),
        }
    }
}
