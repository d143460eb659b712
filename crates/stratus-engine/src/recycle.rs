//! The recycle queue: asynchronous deletion of orphaned backend blobs.
//!
//! Producers are the write path (any failure after a blob was allocated) and
//! the supersede/delete paths. Entries are delivered at least once; backend
//! deletes are idempotent, so replays are harmless. The queue is bounded and
//! lossy under pressure (a logged drop); a periodic backend GC pass outside
//! this process covers anything lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cluster::ClusterRegistry;
use stratus_meta::types::{Object, ObjectType};

/// Delete attempts before an entry is dropped.
const MAX_DELETE_ATTEMPTS: u32 = 3;

/// Initial retry backoff; doubles per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// A backend blob queued for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecycleEntry {
    /// The owning cluster's fs identifier.
    pub location: String,
    /// The pool the blob lives in.
    pub pool: String,
    /// The blob id.
    pub object_id: String,
    /// The owning object's layout, for logging.
    pub object_type: ObjectType,
}

impl RecycleEntry {
    /// The recycle entries covering all blobs an object row references:
    /// each part blob for a multipart object, the single blob otherwise.
    #[must_use]
    pub fn for_object(object: &Object) -> Vec<Self> {
        if object.object_type == ObjectType::Multipart {
            object
                .parts
                .values()
                .map(|part| Self {
                    location: object.location.clone(),
                    pool: object.pool.clone(),
                    object_id: part.object_id.clone(),
                    object_type: ObjectType::Multipart,
                })
                .collect()
        } else if object.object_id.is_empty() {
            Vec::new()
        } else {
            vec![Self {
                location: object.location.clone(),
                pool: object.pool.clone(),
                object_id: object.object_id.clone(),
                object_type: object.object_type,
            }]
        }
    }
}

/// Producer handle onto the process-wide recycle channel.
#[derive(Clone)]
pub struct RecycleQueue {
    tx: mpsc::Sender<RecycleEntry>,
}

impl std::fmt::Debug for RecycleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecycleQueue")
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}

impl RecycleQueue {
    /// Create the channel. The receiver goes to
    /// [`spawn_recycle_workers`] (or is drained directly in tests).
    #[must_use]
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<RecycleEntry>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Enqueue one blob for deletion. Never blocks: a full queue drops the
    /// entry with a warning.
    pub fn enqueue(&self, entry: RecycleEntry) {
        if let Err(e) = self.tx.try_send(entry) {
            warn!(error = %e, "recycle queue full, dropping entry");
        }
    }

    /// Enqueue every blob an object row references.
    pub fn enqueue_object(&self, object: &Object) {
        for entry in RecycleEntry::for_object(object) {
            self.enqueue(entry);
        }
    }
}

/// Spawn the worker pool draining the recycle channel.
pub fn spawn_recycle_workers(
    workers: usize,
    receiver: mpsc::Receiver<RecycleEntry>,
    clusters: Arc<ClusterRegistry>,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
    (0..workers.max(1))
        .map(|worker| {
            let receiver = Arc::clone(&receiver);
            let clusters = Arc::clone(&clusters);
            tokio::spawn(async move {
                loop {
                    let entry = { receiver.lock().await.recv().await };
                    match entry {
                        Some(entry) => recycle_one(&clusters, entry).await,
                        None => {
                            debug!(worker, "recycle channel closed");
                            break;
                        }
                    }
                }
            })
        })
        .collect()
}

/// Delete one blob with bounded retry; permanent failures are logged and
/// dropped.
async fn recycle_one(clusters: &ClusterRegistry, entry: RecycleEntry) {
    let cluster = match clusters.get(&entry.location) {
        Ok(c) => c,
        Err(e) => {
            warn!(location = %entry.location, error = %e, "recycle entry for unknown cluster");
            return;
        }
    };

    let mut backoff = RETRY_BACKOFF;
    for attempt in 1..=MAX_DELETE_ATTEMPTS {
        match cluster.delete(&entry.pool, &entry.object_id).await {
            Ok(()) => {
                debug!(pool = %entry.pool, object_id = %entry.object_id, "recycled blob");
                return;
            }
            Err(e) if attempt < MAX_DELETE_ATTEMPTS => {
                warn!(
                    pool = %entry.pool,
                    object_id = %entry.object_id,
                    attempt,
                    error = %e,
                    "recycle delete failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                warn!(
                    pool = %entry.pool,
                    object_id = %entry.object_id,
                    error = %e,
                    "recycle delete failed permanently, dropping entry"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
