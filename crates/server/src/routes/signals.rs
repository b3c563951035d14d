//! Manual signal triggers: sync, push and notification clicks.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use harbor_client::{DrainReport, Notification, SYNC_TAG};

use crate::dispatch::{Completion, Signal};
use crate::error::ServerError;
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    /// Defaults to `upload-queue`.
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncOutput {
    pub tag: String,
    /// `null` when the tag was ignored.
    pub report: Option<DrainReport>,
}

pub async fn sync(State(state): State<AppState>, Query(params): Query<SyncParams>) -> Result<Json<SyncOutput>, ServerError> {
    let tag = params.tag.unwrap_or_else(|| SYNC_TAG.to_string());
    let report = state.dispatcher.sync(&tag).await?;
    Ok(Json(SyncOutput { tag, report }))
}

/// The request body, if any, is the push payload text.
pub async fn push(State(state): State<AppState>, body: String) -> Result<Json<Notification>, ServerError> {
    let payload = (!body.is_empty()).then_some(body);
    match state.dispatcher.submit(Signal::Push { payload }).await? {
        Completion::Notified(notification) => Ok(Json(notification)),
        other => Err(ServerError::Internal(format!("push completed with {other:?}"))),
    }
}

#[derive(Debug, Serialize)]
pub struct ClickOutput {
    pub action: String,
    /// Path a window was opened on.
    pub navigate: Option<String>,
}

pub async fn notification_click(
    State(state): State<AppState>, Path(action): Path<String>,
) -> Result<Json<ClickOutput>, ServerError> {
    match state.dispatcher.submit(Signal::NotificationClick { action: action.clone() }).await? {
        Completion::Clicked(navigate) => Ok(Json(ClickOutput { action, navigate })),
        other => Err(ServerError::Internal(format!("notification click completed with {other:?}"))),
    }
}
