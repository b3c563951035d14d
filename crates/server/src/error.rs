//! Structured errors for the harbor proxy.
//!
//! Failures a strategy could not absorb become HTTP responses here; the body
//! carries the same code prefix as the log line.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use harbor_core::Error;

/// Structured errors for the harbor proxy.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] Error),

    /// Malformed inbound request (e.g., unreadable body).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The dispatcher stopped accepting signals.
    #[error("WORKER_STOPPED: dispatcher is not running")]
    WorkerStopped,

    /// A signal completed with a reply of the wrong kind.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(err) => match err {
                Error::TransportFailure(_) => StatusCode::BAD_GATEWAY,
                Error::UnrecognizedEndpoint(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::QueueFull { .. } | Error::InstallFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                Error::QueuePersistence(_) | Error::Encoding(_) | Error::Database(_) | Error::MigrationFailed(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServerError::WorkerStopped => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
