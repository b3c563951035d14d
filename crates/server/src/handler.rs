//! HTTP surface of the proxy.
//!
//! Admin routes live under `/__harbor/`; every other request falls through to
//! the interception handler and reaches the origin through the dispatcher.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use url::Url;

use harbor_client::ClientNotifier;

use crate::dispatch::{Dispatcher, Worker};
use crate::routes::{events, proxy, queue, signals};

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub worker: Arc<Worker>,
    pub notifier: ClientNotifier,
    /// Origin base every intercepted path is resolved against.
    pub base: Url,
    pub max_body_bytes: usize,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/events", get(events::events))
        .route("/queue", get(queue::queue))
        .route("/sync", post(signals::sync))
        .route("/push", post(signals::push))
        .route("/notifications/{action}", post(signals::notification_click));

    Router::new()
        .nest("/__harbor", admin)
        .fallback(proxy::intercept)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .with_state(state)
}
