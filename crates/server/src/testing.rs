//! Test fixtures for the server crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use harbor_client::{ClientNotifier, Origin};
use harbor_core::{AppConfig, CacheDb, CachedResponse, Error, InterceptedRequest, UploadQueue};

use crate::dispatch::Worker;

/// Origin that answers 200 `ok` to everything while online.
pub(crate) struct FakeOrigin {
    online: AtomicBool,
    calls: AtomicUsize,
}

impl FakeOrigin {
    pub(crate) fn online() -> Self {
        Self { online: AtomicBool::new(true), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn offline() -> Self {
        Self { online: AtomicBool::new(false), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(CachedResponse::new(200, "ok").with_header("Content-Type", "text/plain"))
        } else {
            Err(Error::TransportFailure(format!("{} {}: connection refused", req.method, req.url)))
        }
    }
}

pub(crate) fn config() -> AppConfig {
    AppConfig { origin_url: "http://origin.test".into(), precache: vec!["/".into()], ..Default::default() }
}

pub(crate) async fn worker(origin: Arc<FakeOrigin>) -> (Arc<Worker>, ClientNotifier) {
    let config = config();
    let db = CacheDb::open_in_memory().await.unwrap();
    let queue = UploadQueue::new(db.clone(), config.max_queue_len);
    let notifier = ClientNotifier::new(16);
    let base = Url::parse(&config.origin_url).unwrap();
    let worker = Worker::new(&config, base, origin, db, queue, notifier.clone());
    (Arc::new(worker), notifier)
}
