//! Server-sent event channel to connected clients.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::handler::AppState;

/// Stream every `ClientMessage` as a JSON `data:` line.
///
/// A client that falls behind skips the messages it missed.
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(clients = state.notifier.client_count() + 1, "client connected");

    let stream = BroadcastStream::new(state.notifier.subscribe()).filter_map(|message| async move {
        match message {
            Ok(message) => match Event::default().json_data(&message) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode client message");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "client fell behind");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
