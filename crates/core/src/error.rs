//! Unified error types for harbor.
//!
//! `Display` output carries a stable code prefix so the proxy and the logs
//! report failures the same way.

use tokio_rusqlite::rusqlite;

/// Unified error types for the interception layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g., an empty precache path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Origin unreachable, connection reset, or attempt timed out.
    #[error("TRANSPORT_FAILURE: {0}")]
    TransportFailure(String),

    /// `api` request with neither a cached entry nor a degraded template.
    #[error("UNRECOGNIZED_ENDPOINT: {0}")]
    UnrecognizedEndpoint(String),

    /// Upload queue could not be read, decoded, or written.
    #[error("QUEUE_PERSISTENCE: {0}")]
    QueuePersistence(String),

    /// Upload queue reached its configured bound.
    #[error("QUEUE_FULL: limit of {limit} pending uploads reached")]
    QueueFull { limit: usize },

    /// A precache asset could not be fetched during install.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Stored entry could not be encoded or decoded.
    #[error("CACHE_ERROR: encoding: {0}")]
    Encoding(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this failure should trigger a strategy's offline fallback.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::TransportFailure(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
