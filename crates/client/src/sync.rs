//! Upload queue drains.
//!
//! A drain replays every due item in enqueue order, then applies the outcome
//! to the queue in one locked read-modify-write:
//!
//! - 2xx replay: item removed, `UPLOAD_SUCCESS` broadcast
//! - transport failure or non-2xx: attempt recorded, next attempt delayed by
//!   exponential backoff; after `max_attempts` the item moves to `dead-letter`
//! - items enqueued while the drain was replaying are left untouched

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use harbor_core::{AppConfig, CachedResponse, Error, UploadQueue, UploadQueueItem};

use crate::fetch::Origin;
use crate::notify::ClientNotifier;

/// Tag that triggers a drain. Other tags are ignored.
pub const SYNC_TAG: &str = "upload-queue";

/// Backoff schedule and retry budget for replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay before the next replay after `attempts` failures:
    /// `min(base * 2^(attempts - 1), max)`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    fn next_attempt(&self, attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.backoff(attempts)).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            base: Duration::from_millis(config.retry_base_ms),
            max: Duration::from_millis(config.retry_max_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Draining,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub dead_lettered: Vec<String>,
    /// Items skipped because their retry time has not arrived.
    pub deferred: usize,
    /// Items still pending after the drain.
    pub remaining: usize,
}

/// Replays queued uploads when connectivity returns.
pub struct SyncCoordinator {
    origin: Arc<dyn Origin>,
    queue: UploadQueue,
    notifier: ClientNotifier,
    policy: RetryPolicy,
    draining: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(origin: Arc<dyn Origin>, queue: UploadQueue, notifier: ClientNotifier, policy: RetryPolicy) -> Self {
        Self { origin, queue, notifier, policy, draining: Mutex::new(()) }
    }

    pub fn state(&self) -> SyncState {
        if self.draining.try_lock().is_ok() { SyncState::Idle } else { SyncState::Draining }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Handle a sync signal. Returns `None` for tags this coordinator ignores.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<DrainReport>, Error> {
        if tag != SYNC_TAG {
            tracing::debug!(tag, "ignoring sync tag");
            return Ok(None);
        }
        self.drain().await.map(Some)
    }

    /// Whether any pending item is due for a replay.
    pub async fn has_due(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        Ok(self.queue.load().await?.iter().any(|item| item.is_due(now)))
    }

    /// Replay due items and persist the outcome.
    ///
    /// Concurrent calls run one after another. The queue writer lock is only
    /// held while the result is applied, never across replays.
    pub async fn drain(&self) -> Result<DrainReport, Error> {
        let _draining = self.draining.lock().await;

        let started = Utc::now();
        let items = self.queue.load().await?;
        let mut report = DrainReport::default();
        let mut failures: HashMap<String, String> = HashMap::new();

        for item in &items {
            if !item.is_due(started) {
                report.deferred += 1;
                continue;
            }
            match self.replay(item).await {
                Ok(response) => {
                    tracing::info!(upload_id = %item.id, status = response.status, "queued upload replayed");
                    self.notifier.upload_succeeded(&item.id, &response);
                    report.succeeded.push(item.id.clone());
                }
                Err(reason) => {
                    tracing::debug!(upload_id = %item.id, attempts = item.attempts + 1, reason = %reason, "replay failed");
                    report.failed.push(item.id.clone());
                    failures.insert(item.id.clone(), reason);
                }
            }
        }

        let policy = self.policy.clone();
        let succeeded = report.succeeded.clone();
        let finished = Utc::now();

        let (dead_lettered, remaining) = self
            .queue
            .update(move |pending, dead| {
                pending.retain(|item| !succeeded.contains(&item.id));

                let mut exhausted = Vec::new();
                for item in pending.iter_mut() {
                    if let Some(reason) = failures.get(&item.id) {
                        item.attempts += 1;
                        item.last_error = Some(reason.clone());
                        item.next_attempt_at = Some(policy.next_attempt(item.attempts, finished));
                        if policy.exhausted(item.attempts) {
                            exhausted.push(item.id.clone());
                        }
                    }
                }

                let (moved, kept): (Vec<_>, Vec<_>) =
                    std::mem::take(pending).into_iter().partition(|item| exhausted.contains(&item.id));
                *pending = kept;
                dead.extend(moved);

                (exhausted, pending.len())
            })
            .await?;

        for id in &dead_lettered {
            tracing::warn!(upload_id = %id, max_attempts = self.policy.max_attempts, "upload moved to dead-letter");
        }

        report.dead_lettered = dead_lettered;
        report.remaining = remaining;

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            deferred = report.deferred,
            remaining = report.remaining,
            "upload queue drained"
        );

        Ok(report)
    }

    /// Send one item, describing any failure as a short reason.
    async fn replay(&self, item: &UploadQueueItem) -> Result<CachedResponse, String> {
        let req = item.to_request().map_err(|e| e.to_string())?;
        match self.origin.send(&req).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(format!("origin answered {}", response.status)),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ClientMessage;
    use crate::testing::{ScriptedOrigin, store, url};
    use harbor_core::InterceptedRequest;

    fn item(id: &str, path: &str) -> UploadQueueItem {
        let req = InterceptedRequest::new("POST", url(path))
            .with_header("Content-Type", "multipart/form-data; boundary=z")
            .with_body(format!("payload-{id}"));
        UploadQueueItem { id: id.to_string(), ..UploadQueueItem::from_request(&req, Utc::now()) }
    }

    fn coordinator(origin: Arc<ScriptedOrigin>, queue: UploadQueue, notifier: ClientNotifier) -> SyncCoordinator {
        SyncCoordinator::new(origin, queue, notifier, RetryPolicy::default())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(30));
        assert_eq!(policy.backoff(2), Duration::from_secs(60));
        assert_eq!(policy.backoff(3), Duration::from_secs(120));
        assert_eq!(policy.backoff(4), Duration::from_secs(240));
        assert_eq!(policy.backoff(5), Duration::from_secs(300));
        assert_eq!(policy.backoff(40), Duration::from_secs(300));
    }

    #[test]
    fn test_policy_from_config() {
        let config = AppConfig { retry_base_ms: 10, retry_max_ms: 50, max_attempts: 2, ..Default::default() };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(4), Duration::from_millis(50));
        assert!(!policy.exhausted(1));
        assert!(policy.exhausted(2));
    }

    #[tokio::test]
    async fn test_other_tags_are_ignored() {
        let origin = Arc::new(ScriptedOrigin::new());
        let (_, queue) = store().await;
        queue.enqueue(item("a1", "/api/upload")).await.unwrap();

        let sync = coordinator(origin.clone(), queue.clone(), ClientNotifier::default());
        assert_eq!(sync.on_sync("periodic-refresh").await.unwrap(), None);
        assert_eq!(origin.call_count(), 0);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drain_scenario_a1() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/api/upload", CachedResponse::new(200, r#"{"ok":true}"#)));
        let (_, queue) = store().await;
        queue.enqueue(item("a1", "/api/upload")).await.unwrap();

        let notifier = ClientNotifier::new(8);
        let mut rx = notifier.subscribe();
        let sync = coordinator(origin.clone(), queue.clone(), notifier);

        let report = sync.on_sync(SYNC_TAG).await.unwrap().unwrap();
        assert_eq!(report.succeeded, vec!["a1".to_string()]);
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(origin.calls(), vec![("POST".to_string(), "/api/upload".to_string())]);

        match rx.recv().await.unwrap() {
            ClientMessage::UploadSuccess { upload_id, response } => {
                assert_eq!(upload_id, "a1");
                assert_eq!(response.status, 200);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_only_failed_item() {
        let ok = CachedResponse::new(201, "{}");
        let origin = Arc::new(
            ScriptedOrigin::new()
                .respond("/files/upload/a", ok.clone())
                .fail("/files/upload/b")
                .respond("/files/upload/c", ok),
        );
        let (_, queue) = store().await;
        for (id, path) in [("a", "/files/upload/a"), ("b", "/files/upload/b"), ("c", "/files/upload/c")] {
            queue.enqueue(item(id, path)).await.unwrap();
        }

        let notifier = ClientNotifier::new(8);
        let mut rx = notifier.subscribe();
        let sync = coordinator(origin, queue.clone(), notifier);

        let report = sync.drain().await.unwrap();
        assert_eq!(report.succeeded, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed, vec!["b".to_string()]);
        assert_eq!(report.remaining, 1);

        let left = queue.load().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "b");
        assert_eq!(left[0].attempts, 1);
        assert!(left[0].last_error.as_deref().unwrap_or_default().contains("TRANSPORT_FAILURE"));
        assert!(left[0].next_attempt_at.is_some());

        let mut notified = Vec::new();
        while let Ok(ClientMessage::UploadSuccess { upload_id, .. }) = rx.try_recv() {
            notified.push(upload_id);
        }
        assert_eq!(notified, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_preserves_body_and_content_type() {
        struct Capture(std::sync::Mutex<Option<InterceptedRequest>>);

        #[async_trait::async_trait]
        impl Origin for Capture {
            async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error> {
                *self.0.lock().unwrap() = Some(req.clone());
                Ok(CachedResponse::new(200, "{}"))
            }
        }

        let origin = Arc::new(Capture(std::sync::Mutex::new(None)));
        let (_, queue) = store().await;
        queue.enqueue(item("x", "/files/upload")).await.unwrap();

        SyncCoordinator::new(origin.clone(), queue, ClientNotifier::default(), RetryPolicy::default())
            .drain()
            .await
            .unwrap();

        let sent = origin.0.lock().unwrap().clone().unwrap();
        assert_eq!(sent.method, "POST");
        assert_eq!(&sent.body[..], b"payload-x");
        assert_eq!(sent.header("content-type"), Some("multipart/form-data; boundary=z"));
    }

    #[tokio::test]
    async fn test_error_status_counts_as_failure() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/files/upload", CachedResponse::new(500, "down")));
        let (_, queue) = store().await;
        queue.enqueue(item("a", "/files/upload")).await.unwrap();

        let report = coordinator(origin, queue.clone(), ClientNotifier::default()).drain().await.unwrap();
        assert_eq!(report.failed, vec!["a".to_string()]);
        assert_eq!(queue.load().await.unwrap()[0].last_error.as_deref(), Some("origin answered 500"));
    }

    #[tokio::test]
    async fn test_items_not_due_are_deferred() {
        let origin = Arc::new(ScriptedOrigin::new().fail("/files/upload"));
        let (_, queue) = store().await;
        queue.enqueue(item("a", "/files/upload")).await.unwrap();
        let sync = coordinator(origin.clone(), queue, ClientNotifier::default());

        sync.drain().await.unwrap();
        let second = sync.drain().await.unwrap();

        assert_eq!(second.deferred, 1);
        assert!(second.failed.is_empty());
        assert_eq!(origin.call_count(), 1);
        assert!(!sync.has_due(Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_item_moves_to_dead_letter() {
        let origin = Arc::new(ScriptedOrigin::new().fail("/files/upload"));
        let (_, queue) = store().await;
        queue.enqueue(item("a", "/files/upload")).await.unwrap();

        let policy = RetryPolicy { base: Duration::ZERO, max: Duration::ZERO, max_attempts: 2 };
        let sync = SyncCoordinator::new(origin, queue.clone(), ClientNotifier::default(), policy);

        let first = sync.drain().await.unwrap();
        assert!(first.dead_lettered.is_empty());
        assert_eq!(queue.len().await.unwrap(), 1);

        let second = sync.drain().await.unwrap();
        assert_eq!(second.dead_lettered, vec!["a".to_string()]);
        assert!(queue.is_empty().await.unwrap());

        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_items_enqueued_during_drain_survive() {
        struct EnqueueOnSend {
            queue: UploadQueue,
        }

        #[async_trait::async_trait]
        impl Origin for EnqueueOnSend {
            async fn send(&self, req: &InterceptedRequest) -> Result<CachedResponse, Error> {
                if req.path() == "/files/upload/first" {
                    self.queue.enqueue(item("late", "/files/upload/late")).await?;
                }
                Ok(CachedResponse::new(200, "{}"))
            }
        }

        let (_, queue) = store().await;
        queue.enqueue(item("first", "/files/upload/first")).await.unwrap();
        let origin = Arc::new(EnqueueOnSend { queue: queue.clone() });

        let report = SyncCoordinator::new(origin, queue.clone(), ClientNotifier::default(), RetryPolicy::default())
            .drain()
            .await
            .unwrap();

        assert_eq!(report.succeeded, vec!["first".to_string()]);
        let left: Vec<_> = queue.load().await.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(left, vec!["late".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_drains_replay_each_item_once() {
        struct SlowOrigin {
            calls: std::sync::atomic::AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Origin for SlowOrigin {
            async fn send(&self, _req: &InterceptedRequest) -> Result<CachedResponse, Error> {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(CachedResponse::new(200, "{}"))
            }
        }

        let (_, queue) = store().await;
        for n in 0..5 {
            queue.enqueue(item(&format!("u{n}"), "/files/upload")).await.unwrap();
        }
        let origin = Arc::new(SlowOrigin { calls: Default::default() });
        let notifier = ClientNotifier::new(32);
        let mut rx = notifier.subscribe();
        let sync = Arc::new(SyncCoordinator::new(origin.clone(), queue.clone(), notifier, RetryPolicy::default()));

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.drain().await }
        });
        let second = tokio::spawn({
            let sync = sync.clone();
            async move { sync.drain().await }
        });
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();

        assert_eq!(a.succeeded.len() + b.succeeded.len(), 5);
        assert!(a.succeeded.is_empty() || b.succeeded.is_empty());
        assert_eq!(origin.calls.load(std::sync::atomic::Ordering::SeqCst), 5);
        assert!(queue.is_empty().await.unwrap());

        let mut delivered = 0;
        while let Ok(ClientMessage::UploadSuccess { .. }) = rx.try_recv() {
            delivered += 1;
        }
        assert_eq!(delivered, 5);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_enqueue_then_drain_round_trip() {
        let origin = Arc::new(ScriptedOrigin::new().respond("/files/upload", CachedResponse::new(200, "{}")));
        let (_, queue) = store().await;
        for id in ["one", "two", "three"] {
            queue.enqueue(item(id, "/files/upload")).await.unwrap();
        }

        let notifier = ClientNotifier::new(16);
        let mut rx = notifier.subscribe();
        let report = coordinator(origin, queue.clone(), notifier).drain().await.unwrap();

        assert_eq!(report.succeeded.len(), 3);
        assert!(queue.is_empty().await.unwrap());
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
