//! Messages pushed to every connected client.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use harbor_core::CachedResponse;

use crate::push::Notification;

/// Origin response to a replayed upload, as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayResponse {
    pub status: u16,
    pub body: Value,
}

impl From<&CachedResponse> for ReplayResponse {
    fn from(response: &CachedResponse) -> Self {
        Self { status: response.status, body: response.body_value() }
    }
}

/// Wire format of a client message: `{"type": "UPLOAD_SUCCESS", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    UploadSuccess { upload_id: String, response: ReplayResponse },
    Notification(Notification),
    OpenWindow { url: String },
    /// The proxy activated and now controls every client.
    ControllerChange,
}

/// Fan-out channel to connected clients.
///
/// Clients that connect later do not see earlier messages.
#[derive(Debug, Clone)]
pub struct ClientNotifier {
    tx: broadcast::Sender<ClientMessage>,
}

impl ClientNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send to every connected client, returning how many received it.
    pub fn notify_all(&self, message: ClientMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    pub fn upload_succeeded(&self, upload_id: &str, response: &CachedResponse) -> usize {
        let delivered = self.notify_all(ClientMessage::UploadSuccess {
            upload_id: upload_id.to_string(),
            response: ReplayResponse::from(response),
        });
        tracing::debug!(upload_id, delivered, "upload success broadcast");
        delivered
    }
}

impl Default for ClientNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
