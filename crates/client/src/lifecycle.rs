//! Install and activate.
//!
//! Install precaches the configured manifest all-or-nothing. Activate drops
//! stale generations and claims clients, after which the proxy applies the
//! caching strategies instead of passing requests straight through.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use harbor_core::cache::{CURRENT_GENERATIONS, DURABLE_GENERATIONS, STATIC_ASSETS};
use harbor_core::{CacheDb, CachedResponse, Error, InterceptedRequest};

use crate::fetch::{Origin, identity_key, resolve};
use crate::notify::{ClientMessage, ClientNotifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Nothing installed yet; requests pass through.
    Parsed,
    Installed,
    /// Controlling clients.
    Activated,
}

pub struct LifecycleManager {
    origin: Arc<dyn Origin>,
    db: CacheDb,
    base: Url,
    precache: Vec<String>,
    notifier: ClientNotifier,
    state: RwLock<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(origin: Arc<dyn Origin>, db: CacheDb, base: Url, precache: Vec<String>, notifier: ClientNotifier) -> Self {
        Self { origin, db, base, precache, notifier, state: RwLock::new(LifecycleState::Parsed) }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn is_controlling(&self) -> bool {
        self.state().await == LifecycleState::Activated
    }

    /// Fetch every precache asset and store them in `static-assets` in one
    /// transaction, returning how many were stored.
    ///
    /// # Errors
    ///
    /// `InstallFailed` if any asset is unreachable or answers non-2xx. Nothing
    /// is written in that case.
    pub async fn install(&self) -> Result<usize, Error> {
        let mut entries: Vec<(String, CachedResponse)> = Vec::with_capacity(self.precache.len());

        for path in &self.precache {
            let url = resolve(&self.base, path)?;
            let response = self
                .origin
                .send(&InterceptedRequest::get(url.clone()))
                .await
                .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;

            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{path}: origin answered {}", response.status)));
            }
            entries.push((identity_key("GET", &url), response));
        }

        let generation = self.db.open_generation(STATIC_ASSETS).await?;
        self.db.put_many(&generation, &entries).await?;

        let mut state = self.state.write().await;
        if *state < LifecycleState::Installed {
            *state = LifecycleState::Installed;
        }

        tracing::info!(assets = entries.len(), "precache installed");
        Ok(entries.len())
    }

    /// Delete stale generations and claim clients. Returns the deleted names.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when nothing was ever installed, so there is no app
    /// shell to serve offline.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        if self.state().await < LifecycleState::Installed && !self.db.has_generation(STATIC_ASSETS).await? {
            return Err(Error::InvalidInput("cannot activate before a successful install".into()));
        }

        let mut removed = Vec::new();
        for name in self.db.list_generations().await? {
            if CURRENT_GENERATIONS.contains(&name.as_str()) || DURABLE_GENERATIONS.contains(&name.as_str()) {
                continue;
            }
            if self.db.delete_generation(&name).await? {
                tracing::info!(generation = %name, "deleted stale cache generation");
                removed.push(name);
            }
        }

        self.claim().await;
        Ok(removed)
    }

    async fn claim(&self) {
        let mut state = self.state.write().await;
        if *state != LifecycleState::Activated {
            *state = LifecycleState::Activated;
            drop(state);
            let delivered = self.notifier.notify_all(ClientMessage::ControllerChange);
            tracing::info!(delivered, "activated and controlling clients");
        }
    }
}
