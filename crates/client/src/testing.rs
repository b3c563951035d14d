//! Scripted origin shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use url::Url;

use harbor_core::{CacheDb, CachedResponse, Error, InterceptedRequest, UploadQueue};

use crate::fetch::Origin;

enum Reply {
    Respond(CachedResponse),
    Fail,
}

/// Answers by path; unknown paths get a 404. Records every call.
#[derive(Default)]
pub(crate) struct ScriptedOrigin {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, String)>>,
    offline: AtomicBool,
}

impl ScriptedOrigin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, path: &str, response: CachedResponse) -> Self {
        self.routes.lock().unwrap().insert(path.to_string(), Reply::Respond(response));
        self
    }

    pub(crate) fn fail(self, path: &str) -> Self {
        self.routes.lock().unwrap().insert(path.to_string(), Reply::Fail);
        self
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error> {
        self.calls.lock().unwrap().push((req.method.clone(), req.path().to_string()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::TransportFailure(format!("{} {}: connection refused", req.method, req.url)));
        }

        match self.routes.lock().unwrap().get(req.path()) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail) => Err(Error::TransportFailure(format!("{} {}: connection reset", req.method, req.url))),
            None => Ok(CachedResponse::new(404, "not found")),
        }
    }
}

pub(crate) fn base() -> Url {
    Url::parse("http://origin.test").unwrap()
}

pub(crate) fn url(path: &str) -> Url {
    base().join(path).unwrap()
}

pub(crate) async fn store() -> (CacheDb, UploadQueue) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let queue = UploadQueue::new(db.clone(), 1000);
    (db, queue)
}
