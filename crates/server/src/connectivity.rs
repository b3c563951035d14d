//! Connectivity monitor.
//!
//! Probes the origin's health path on a fixed interval and turns the
//! offline→online edge into a sync signal.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use url::Url;

use harbor_client::SYNC_TAG;
use harbor_core::InterceptedRequest;

use crate::dispatch::{Dispatcher, Worker, bootstrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Restored,
    Lost,
}

/// Last observed reachability. Unknown until the first probe.
#[derive(Debug, Default)]
pub struct Connectivity {
    online: Option<bool>,
}

impl Connectivity {
    /// Record a probe result, returning the edge it crossed, if any.
    ///
    /// The first successful probe counts as a restore.
    pub fn observe(&mut self, online: bool) -> Option<Transition> {
        let previous = self.online.replace(online);
        match (previous, online) {
            (Some(true), true) | (Some(false), false) => None,
            (_, true) => Some(Transition::Restored),
            (Some(true), false) | (None, false) => Some(Transition::Lost),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online == Some(true)
    }
}

pub struct ConnectivityMonitor {
    worker: Arc<Worker>,
    dispatcher: Dispatcher,
    health_url: Url,
    interval: Duration,
    state: Connectivity,
}

impl ConnectivityMonitor {
    pub fn new(worker: Arc<Worker>, dispatcher: Dispatcher, health_url: Url, interval: Duration) -> Self {
        Self { worker, dispatcher, health_url, interval, state: Connectivity::default() }
    }

    /// Any HTTP answer means the origin is reachable.
    async fn probe(&self) -> bool {
        self.worker.origin().send(&InterceptedRequest::get(self.health_url.clone())).await.is_ok()
    }

    /// Probe once and react.
    pub async fn tick(&mut self) -> Option<Transition> {
        let online = self.probe().await;
        let transition = self.state.observe(online);

        match transition {
            Some(Transition::Restored) => {
                tracing::info!(health = %self.health_url, "origin reachable");
                if !self.worker.lifecycle.is_controlling().await {
                    bootstrap(&self.dispatcher).await;
                }
                self.sync().await;
            }
            Some(Transition::Lost) => tracing::warn!(health = %self.health_url, "origin unreachable"),
            None if online => match self.worker.sync.has_due(Utc::now()).await {
                Ok(true) => self.sync().await,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "failed to inspect upload queue"),
            },
            None => {}
        }

        transition
    }

    async fn sync(&self) {
        if let Err(e) = self.dispatcher.sync(SYNC_TAG).await {
            tracing::warn!(error = %e, "upload queue sync failed");
        }
    }

    /// Probe forever.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOrigin, worker};
    use harbor_client::ServedFrom;

    #[test]
    fn test_observe_edges() {
        let mut state = Connectivity::default();
        assert!(!state.is_online());
        assert_eq!(state.observe(true), Some(Transition::Restored));
        assert_eq!(state.observe(true), None);
        assert_eq!(state.observe(false), Some(Transition::Lost));
        assert_eq!(state.observe(false), None);
        assert_eq!(state.observe(true), Some(Transition::Restored));
        assert!(state.is_online());
    }

    #[test]
    fn test_first_failed_probe_is_lost() {
        let mut state = Connectivity::default();
        assert_eq!(state.observe(false), Some(Transition::Lost));
    }

    async fn monitor(origin: Arc<FakeOrigin>) -> (ConnectivityMonitor, Arc<Worker>) {
        let (worker, _) = worker(origin).await;
        let (dispatcher, _) = Dispatcher::spawn(worker.clone(), 8);
        let health = Url::parse("http://origin.test/api/health").unwrap();
        (ConnectivityMonitor::new(worker.clone(), dispatcher, health, Duration::from_millis(100)), worker)
    }

    #[tokio::test]
    async fn test_restore_finishes_activation() {
        let origin = Arc::new(FakeOrigin::offline());
        let (mut monitor, worker) = monitor(origin.clone()).await;

        assert_eq!(monitor.tick().await, Some(Transition::Lost));
        assert!(!worker.lifecycle.is_controlling().await);

        origin.set_online(true);
        assert_eq!(monitor.tick().await, Some(Transition::Restored));
        assert!(worker.lifecycle.is_controlling().await);
    }

    #[tokio::test]
    async fn test_restore_drains_queued_uploads() {
        let origin = Arc::new(FakeOrigin::online());
        let (mut monitor, worker) = monitor(origin.clone()).await;
        monitor.tick().await;

        origin.set_online(false);
        assert_eq!(monitor.tick().await, Some(Transition::Lost));
        let upload = InterceptedRequest::new("POST", Url::parse("http://origin.test/files/upload").unwrap());
        let result = worker.executor.handle(upload).await.unwrap();
        assert!(matches!(result.source, ServedFrom::Queued(_)));
        assert_eq!(worker.queue().len().await.unwrap(), 1);

        origin.set_online(true);
        assert_eq!(monitor.tick().await, Some(Transition::Restored));
        assert!(worker.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_steady_online_with_nothing_due_only_probes() {
        let origin = Arc::new(FakeOrigin::online());
        let (mut monitor, _) = monitor(origin.clone()).await;
        monitor.tick().await;

        let before = origin.calls();
        assert_eq!(monitor.tick().await, None);
        assert_eq!(origin.calls(), before + 1);
    }
}
