//! Upload queue inspection.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use harbor_client::{LifecycleState, SyncState};
use harbor_core::UploadQueueItem;

use crate::error::ServerError;
use crate::handler::AppState;

/// A queued upload without its payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub method: String,
    pub url: String,
    pub bytes: usize,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&UploadQueueItem> for QueueEntry {
    fn from(item: &UploadQueueItem) -> Self {
        Self {
            id: item.id.clone(),
            method: item.method.clone(),
            url: item.url.clone(),
            bytes: item.payload.len(),
            enqueued_at: item.enqueued_at,
            attempts: item.attempts,
            next_attempt_at: item.next_attempt_at,
            last_error: item.last_error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    pub lifecycle: LifecycleState,
    pub sync: SyncState,
    pub max_len: usize,
    pub pending: Vec<QueueEntry>,
    pub dead_letters: Vec<QueueEntry>,
}

pub async fn queue(State(state): State<AppState>) -> Result<Json<QueueView>, ServerError> {
    let queue = state.worker.queue();
    let pending = queue.load().await?;
    let dead = queue.dead_letters().await?;

    Ok(Json(QueueView {
        lifecycle: state.worker.lifecycle.state().await,
        sync: state.worker.sync.state(),
        max_len: queue.max_len(),
        pending: pending.iter().map(QueueEntry::from).collect(),
        dead_letters: dead.iter().map(QueueEntry::from).collect(),
    }))
}
