//! Fire-and-forget scheduling of sync work onto a background worker.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error};

use crate::cache::{CacheSyncEngine, ContentStore};
use crate::wp::{ApiClient, RemoteId};

/// A unit of queued sync work
#[derive(Debug, Clone)]
pub enum SyncJob {
  SyncOne {
    content_type: String,
    remote_id: Value,
    preview: bool,
  },
  SyncAll {
    content_type: String,
  },
  Purge {
    content_type: String,
    remote_id: RemoteId,
  },
}

impl SyncJob {
  fn content_type(&self) -> &str {
    match self {
      SyncJob::SyncOne { content_type, .. }
      | SyncJob::SyncAll { content_type }
      | SyncJob::Purge { content_type, .. } => content_type,
    }
  }
}

/// Queue in front of a [`CacheSyncEngine`].
///
/// Every job runs on its own task. Full syncs hold an exclusive per-content-type
/// lock while single-item syncs and purges share it, so a record synced during
/// a full sync can never be deleted by that sync's reconciliation. Failed jobs
/// are logged and dropped, never retried.
///
/// At most one full sync per content type waits for the lock at a time;
/// further requests for that type are dropped until it starts.
pub struct SyncScheduler {
  tx: mpsc::UnboundedSender<SyncJob>,
  dispatcher: JoinHandle<()>,
  /// Content types with a full sync queued but not yet running
  pending_full: PendingSet,
}

type PendingSet = Arc<Mutex<HashSet<String>>>;

fn lock_pending(pending: &PendingSet) -> MutexGuard<'_, HashSet<String>> {
  pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncScheduler {
  /// Spawn the dispatcher on the current tokio runtime.
  pub fn start<C, S>(engine: Arc<CacheSyncEngine<C, S>>) -> Self
  where
    C: ApiClient + 'static,
    S: ContentStore + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending_full = PendingSet::default();
    let dispatcher = tokio::spawn(dispatch(engine, rx, Arc::clone(&pending_full)));
    Self {
      tx,
      dispatcher,
      pending_full,
    }
  }

  /// Request a single-item sync.
  pub fn enqueue(&self, content_type: impl Into<String>, remote_id: Value, preview: bool) {
    self.send(SyncJob::SyncOne {
      content_type: content_type.into(),
      remote_id,
      preview,
    });
  }

  /// Request a full sync of one content type.
  ///
  /// Returns `false` when a full sync of that type is already waiting to run.
  pub fn enqueue_sync_all(&self, content_type: impl Into<String>) -> bool {
    let content_type = content_type.into();
    if !lock_pending(&self.pending_full).insert(content_type.clone()) {
      debug!(content_type = %content_type, "full sync already pending, not queued");
      return false;
    }
    self.send(SyncJob::SyncAll { content_type });
    true
  }

  /// Request removal of one cached record.
  pub fn enqueue_purge(&self, content_type: impl Into<String>, remote_id: RemoteId) {
    self.send(SyncJob::Purge {
      content_type: content_type.into(),
      remote_id,
    });
  }

  fn send(&self, job: SyncJob) {
    debug!(?job, "enqueued");
    // Only fails once the dispatcher is gone
    if self.tx.send(job).is_err() {
      error!("sync dispatcher has stopped, job dropped");
    }
  }

  /// Stop accepting work and wait for every queued job to finish.
  pub async fn shutdown(self) {
    drop(self.tx);
    if let Err(e) = self.dispatcher.await {
      error!("sync dispatcher panicked: {}", e);
    }
  }
}

async fn dispatch<C, S>(
  engine: Arc<CacheSyncEngine<C, S>>,
  mut rx: mpsc::UnboundedReceiver<SyncJob>,
  pending_full: PendingSet,
) where
  C: ApiClient + 'static,
  S: ContentStore + 'static,
{
  let mut locks: HashMap<String, Arc<RwLock<()>>> = HashMap::new();
  let mut in_flight = JoinSet::new();

  while let Some(job) = rx.recv().await {
    let lock = locks
      .entry(job.content_type().to_string())
      .or_default()
      .clone();
    let engine = Arc::clone(&engine);
    let pending_full = Arc::clone(&pending_full);

    in_flight.spawn(async move { run_job(&engine, &lock, &pending_full, job).await });

    // Reap finished jobs so the set does not grow without bound
    while let Some(result) = in_flight.try_join_next() {
      log_panic(result);
    }
  }

  while let Some(result) = in_flight.join_next().await {
    log_panic(result);
  }
}

fn log_panic(result: Result<(), JoinError>) {
  if let Err(e) = result {
    error!("sync job panicked: {}", e);
  }
}

async fn run_job<C, S>(
  engine: &CacheSyncEngine<C, S>,
  lock: &RwLock<()>,
  pending_full: &PendingSet,
  job: SyncJob,
) where
  C: ApiClient,
  S: ContentStore,
{
  match job {
    SyncJob::SyncOne {
      content_type,
      remote_id,
      preview,
    } => {
      let _shared = lock.read().await;
      match engine.sync_one(&content_type, &remote_id, preview).await {
        Ok(outcome) => debug!(content_type = %content_type, %remote_id, ?outcome, "sync finished"),
        Err(e) => error!(content_type = %content_type, %remote_id, "sync failed: {}", e),
      }
    }
    SyncJob::SyncAll { content_type } => {
      let _exclusive = lock.write().await;
      lock_pending(pending_full).remove(&content_type);
      if let Err(e) = engine.sync_all(&content_type).await {
        error!(content_type = %content_type, "full sync failed: {}", e);
      }
    }
    SyncJob::Purge {
      content_type,
      remote_id,
    } => {
      let _shared = lock.read().await;
      if let Err(e) = engine.purge(&content_type, &remote_id).await {
        error!(content_type = %content_type, id = %remote_id, "purge failed: {}", e);
      }
    }
  }
}
