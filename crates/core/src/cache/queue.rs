//! Persistent upload queue.
//!
//! The queue is a JSON array stored as a single entry (`queue`) in the
//! `upload-queue` generation, with exhausted items kept under `dead-letter`.
//! Every read-modify-write goes through one writer lock, so concurrent
//! enqueues cannot overwrite each other's append.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::connection::CacheDb;
use super::generations::Generation;
use super::UPLOAD_QUEUE;
use crate::{CachedResponse, Error, UploadQueueItem};

/// Entry key holding the pending items.
pub const QUEUE_KEY: &str = "queue";

/// Entry key holding items that exhausted their retry budget.
pub const DEAD_LETTER_KEY: &str = "dead-letter";

/// Single-writer handle to the persisted upload queue.
///
/// Clones share the writer lock.
#[derive(Clone, Debug)]
pub struct UploadQueue {
    db: CacheDb,
    writer: Arc<Mutex<()>>,
    max_len: usize,
}

fn persistence(err: Error) -> Error {
    match err {
        Error::QueuePersistence(_) | Error::QueueFull { .. } => err,
        other => Error::QueuePersistence(other.to_string()),
    }
}

fn encode(items: &[UploadQueueItem]) -> Result<CachedResponse, Error> {
    let body = serde_json::to_vec(items).map_err(|e| Error::QueuePersistence(e.to_string()))?;
    Ok(CachedResponse::new(200, body).with_header("Content-Type", "application/json"))
}

impl UploadQueue {
    /// Create a queue handle bounded to `max_len` pending items.
    pub fn new(db: CacheDb, max_len: usize) -> Self {
        Self { db, writer: Arc::new(Mutex::new(())), max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    async fn generation(&self) -> Result<Generation, Error> {
        self.db.open_generation(UPLOAD_QUEUE).await.map_err(persistence)
    }

    async fn read(&self, key: &str) -> Result<Vec<UploadQueueItem>, Error> {
        let generation = self.generation().await?;
        match self.db.get(&generation, key).await.map_err(persistence)? {
            Some(entry) => serde_json::from_slice(&entry.body)
                .map_err(|e| Error::QueuePersistence(format!("corrupt {key} record: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Pending items in enqueue order. Empty if never initialized.
    pub async fn load(&self) -> Result<Vec<UploadQueueItem>, Error> {
        self.read(QUEUE_KEY).await
    }

    /// Items moved aside after exhausting their retries.
    pub async fn dead_letters(&self) -> Result<Vec<UploadQueueItem>, Error> {
        self.read(DEAD_LETTER_KEY).await
    }

    /// Replace the pending list wholesale.
    pub async fn save(&self, items: &[UploadQueueItem]) -> Result<(), Error> {
        let _guard = self.writer.lock().await;
        let generation = self.generation().await?;
        self.db
            .put(&generation, QUEUE_KEY, &encode(items)?)
            .await
            .map_err(persistence)
    }

    /// Append an item, returning the new queue length.
    ///
    /// Fails with `QueueFull` instead of dropping anything once the bound is reached.
    pub async fn enqueue(&self, item: UploadQueueItem) -> Result<usize, Error> {
        let max_len = self.max_len;
        self.update(move |pending, _| {
            if pending.len() >= max_len {
                return Err(Error::QueueFull { limit: max_len });
            }
            pending.push(item);
            Ok(pending.len())
        })
        .await?
    }

    /// Remove items by id, returning how many were removed.
    pub async fn remove_by_ids(&self, ids: &[String]) -> Result<usize, Error> {
        self.update(|pending, _| {
            let before = pending.len();
            pending.retain(|item| !ids.contains(&item.id));
            before - pending.len()
        })
        .await
    }

    /// Read-modify-write both lists under the writer lock.
    ///
    /// The closure sees the current pending list and dead-letter list; both are
    /// persisted in one transaction afterwards.
    pub async fn update<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Vec<UploadQueueItem>, &mut Vec<UploadQueueItem>) -> R,
    {
        let _guard = self.writer.lock().await;

        let mut pending = self.read(QUEUE_KEY).await?;
        let mut dead = self.read(DEAD_LETTER_KEY).await?;
        let result = f(&mut pending, &mut dead);

        let generation = self.generation().await?;
        let entries = vec![(QUEUE_KEY.to_string(), encode(&pending)?), (DEAD_LETTER_KEY.to_string(), encode(&dead)?)];
        self.db.put_many(&generation, &entries).await.map_err(persistence)?;

        Ok(result)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.load().await?.is_empty())
    }
}
