//! Signal dispatch.
//!
//! Every inbound signal (an intercepted fetch, a sync trigger, a push) is
//! submitted to one bounded channel. The dispatcher runs each signal as its
//! own task and answers through a oneshot reply, so slow signals never block
//! the ones behind them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use harbor_client::{
    ClientNotifier, DrainReport, LifecycleManager, Notification, Origin, PushHandler, RetryPolicy, StrategyConfig,
    StrategyExecutor, StrategyResult, SyncCoordinator,
};
use harbor_core::{AppConfig, CacheDb, Error, InterceptedRequest, UploadQueue, classify};

use crate::error::ServerError;

/// Inbound events.
#[derive(Debug)]
pub enum Signal {
    Install,
    Activate,
    Fetch(InterceptedRequest),
    Sync { tag: String },
    Push { payload: Option<String> },
    NotificationClick { action: String },
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Signal::Install => "install",
            Signal::Activate => "activate",
            Signal::Fetch(_) => "fetch",
            Signal::Sync { .. } => "sync",
            Signal::Push { .. } => "push",
            Signal::NotificationClick { .. } => "notificationclick",
        }
    }
}

/// Reply to a signal.
#[derive(Debug)]
pub enum Completion {
    Installed(usize),
    Activated(Vec<String>),
    Fetched(StrategyResult),
    /// `None` when the sync tag was ignored.
    Synced(Option<DrainReport>),
    Notified(Notification),
    /// Path a window was opened on, if the click asked for one.
    Clicked(Option<String>),
}

/// Everything a signal can touch.
pub struct Worker {
    origin: Arc<dyn Origin>,
    queue: UploadQueue,
    pub executor: StrategyExecutor,
    pub sync: SyncCoordinator,
    pub lifecycle: LifecycleManager,
    pub push: PushHandler,
}

impl Worker {
    pub fn new(
        config: &AppConfig, base: Url, origin: Arc<dyn Origin>, db: CacheDb, queue: UploadQueue,
        notifier: ClientNotifier,
    ) -> Self {
        let executor = StrategyExecutor::new(
            origin.clone(),
            db.clone(),
            queue.clone(),
            base.clone(),
            StrategyConfig::from(config),
        );
        let sync = SyncCoordinator::new(origin.clone(), queue.clone(), notifier.clone(), RetryPolicy::from(config));
        let lifecycle = LifecycleManager::new(origin.clone(), db, base, config.precache.clone(), notifier.clone());
        let push = PushHandler::new(config, notifier);

        Self { origin, queue, executor, sync, lifecycle, push }
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn origin(&self) -> &Arc<dyn Origin> {
        &self.origin
    }

    pub async fn handle(&self, signal: Signal) -> Result<Completion, Error> {
        match signal {
            Signal::Install => self.lifecycle.install().await.map(Completion::Installed),
            Signal::Activate => self.lifecycle.activate().await.map(Completion::Activated),
            Signal::Fetch(req) => self.fetch(req).await.map(Completion::Fetched),
            Signal::Sync { tag } => self.sync.on_sync(&tag).await.map(Completion::Synced),
            Signal::Push { payload } => Ok(Completion::Notified(self.push.on_push(payload.as_deref()))),
            Signal::NotificationClick { action } => Ok(Completion::Clicked(self.push.on_click(&action))),
        }
    }

    /// Until activation, requests go straight to the origin.
    async fn fetch(&self, req: InterceptedRequest) -> Result<StrategyResult, Error> {
        if self.lifecycle.is_controlling().await {
            return self.executor.handle(req).await;
        }
        let category = classify(&req);
        let response = self.origin.send(&req).await?;
        Ok(StrategyResult::network(category, response))
    }
}

struct Job {
    signal: Signal,
    reply: oneshot::Sender<Result<Completion, Error>>,
}

/// Handle for submitting signals. Clones share one channel.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Start the dispatch loop. It stops once every `Dispatcher` clone is dropped.
    pub fn spawn(worker: Arc<Worker>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run(worker, rx));
        (Self { tx }, handle)
    }

    /// Submit a signal and wait for its completion.
    pub async fn submit(&self, signal: Signal) -> Result<Completion, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { signal, reply })
            .await
            .map_err(|_| ServerError::WorkerStopped)?;
        rx.await.map_err(|_| ServerError::WorkerStopped)?.map_err(ServerError::from)
    }

    pub async fn fetch(&self, req: InterceptedRequest) -> Result<StrategyResult, ServerError> {
        match self.submit(Signal::Fetch(req)).await? {
            Completion::Fetched(result) => Ok(result),
            other => Err(unexpected("fetch", &other)),
        }
    }

    pub async fn sync(&self, tag: &str) -> Result<Option<DrainReport>, ServerError> {
        match self.submit(Signal::Sync { tag: tag.to_string() }).await? {
            Completion::Synced(report) => Ok(report),
            other => Err(unexpected("sync", &other)),
        }
    }
}

fn unexpected(signal: &str, completion: &Completion) -> ServerError {
    ServerError::Internal(format!("{signal} completed with {completion:?}"))
}

async fn run(worker: Arc<Worker>, mut rx: mpsc::Receiver<Job>) {
    while let Some(Job { signal, reply }) = rx.recv().await {
        let worker = worker.clone();
        tokio::spawn(async move {
            let label = signal.label();
            let result = worker.handle(signal).await;
            if let Err(e) = &result {
                tracing::debug!(signal = label, error = %e, "signal failed");
            }
            // The submitter may have gone away; the work is done either way.
            let _ = reply.send(result);
        });
    }
    tracing::info!("dispatcher stopped");
}

/// Install then activate. Returns whether the proxy now controls clients.
///
/// A failed install still activates when an earlier precache survives.
pub async fn bootstrap(dispatcher: &Dispatcher) -> bool {
    match dispatcher.submit(Signal::Install).await {
        Ok(Completion::Installed(assets)) => tracing::debug!(assets, "install complete"),
        Ok(other) => tracing::warn!(completion = ?other, "unexpected install completion"),
        Err(e) => tracing::warn!(error = %e, "install failed"),
    }

    match dispatcher.submit(Signal::Activate).await {
        Ok(Completion::Activated(removed)) => {
            tracing::debug!(removed = removed.len(), "activate complete");
            true
        }
        Ok(other) => {
            tracing::warn!(completion = ?other, "unexpected activate completion");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "activation deferred until the origin is reachable");
            false
        }
    }
}
