//! The blob-backend capability and its in-memory reference implementation.
//!
//! A [`Cluster`] is opaque storage for object data: `put` streams a reader
//! into a new blob and reports how many bytes actually landed, `get` opens a
//! ranged reader, `delete` is idempotent. The engine never assumes anything
//! beyond this contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::error::{EngineError, EngineResult};
use crate::placement::pick_pool;
use stratus_meta::types::StorageClass;

/// Opaque blob storage.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// The cluster (fs) identifier, stored on object rows as `location`.
    fn id(&self) -> &str;

    /// Stream a reader into a new blob. Returns the blob id and the number
    /// of bytes written; a short count means the stream ended early.
    async fn put(
        &self,
        pool: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> anyhow::Result<(String, u64)>;

    /// Open a reader over `[offset, offset+length)` of a blob; a negative
    /// length means to the end.
    async fn get(
        &self,
        pool: &str,
        object_id: &str,
        offset: u64,
        length: i64,
    ) -> anyhow::Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn delete(&self, pool: &str, object_id: &str) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// MemCluster
// ---------------------------------------------------------------------------

/// In-memory [`Cluster`] used by tests and single-process deployments.
pub struct MemCluster {
    fsid: String,
    blobs: DashMap<(String, String), Bytes>,
}

impl std::fmt::Debug for MemCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCluster")
            .field("fsid", &self.fsid)
            .field("blobs", &self.blobs.len())
            .finish()
    }
}

impl MemCluster {
    /// Create an empty cluster with the given fs identifier.
    #[must_use]
    pub fn new(fsid: impl Into<String>) -> Self {
        Self {
            fsid: fsid.into(),
            blobs: DashMap::new(),
        }
    }

    /// Number of stored blobs, across all pools.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Whether a blob exists.
    #[must_use]
    pub fn contains(&self, pool: &str, object_id: &str) -> bool {
        self.blobs
            .contains_key(&(pool.to_owned(), object_id.to_owned()))
    }

    /// Raw blob bytes, for assertions on what actually landed in storage.
    #[must_use]
    pub fn blob(&self, pool: &str, object_id: &str) -> Option<Bytes> {
        self.blobs
            .get(&(pool.to_owned(), object_id.to_owned()))
            .map(|b| b.clone())
    }
}

#[async_trait]
impl Cluster for MemCluster {
    fn id(&self) -> &str {
        &self.fsid
    }

    async fn put(
        &self,
        pool: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> anyhow::Result<(String, u64)> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let object_id = uuid::Uuid::new_v4().simple().to_string();
        let written = data.len() as u64;
        trace!(fsid = %self.fsid, pool, object_id = %object_id, written, "stored blob");
        self.blobs
            .insert((pool.to_owned(), object_id.clone()), Bytes::from(data));
        Ok((object_id, written))
    }

    async fn get(
        &self,
        pool: &str,
        object_id: &str,
        offset: u64,
        length: i64,
    ) -> anyhow::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let blob = self
            .blobs
            .get(&(pool.to_owned(), object_id.to_owned()))
            .map(|b| b.clone())
            .ok_or_else(|| anyhow!("no such blob: {pool}/{object_id}"))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start > blob.len() {
            return Err(anyhow!("offset {offset} beyond blob of {} bytes", blob.len()));
        }
        let end = if length < 0 {
            blob.len()
        } else {
            (start + usize::try_from(length).unwrap_or(usize::MAX)).min(blob.len())
        };
        Ok(Box::new(std::io::Cursor::new(blob.slice(start..end))))
    }

    async fn delete(&self, pool: &str, object_id: &str) -> anyhow::Result<()> {
        if self
            .blobs
            .remove(&(pool.to_owned(), object_id.to_owned()))
            .is_some()
        {
            trace!(fsid = %self.fsid, pool, object_id, "deleted blob");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ClusterRegistry
// ---------------------------------------------------------------------------

/// The process-wide set of backend clusters, keyed by fs identifier.
pub struct ClusterRegistry {
    clusters: BTreeMap<String, Arc<dyn Cluster>>,
}

impl std::fmt::Debug for ClusterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRegistry")
            .field("clusters", &self.clusters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clusters: BTreeMap::new(),
        }
    }

    /// Register a cluster under its own id.
    pub fn register(&mut self, cluster: Arc<dyn Cluster>) {
        self.clusters.insert(cluster.id().to_owned(), cluster);
    }

    /// Look up a cluster by fs identifier.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the location is unknown; object rows
    /// always reference a registered cluster.
    pub fn get(&self, fsid: &str) -> EngineResult<Arc<dyn Cluster>> {
        self.clusters
            .get(fsid)
            .cloned()
            .ok_or_else(|| EngineError::Internal(anyhow!("unknown cluster: {fsid}")))
    }

    /// Choose the cluster and pool for a new write.
    ///
    /// Placement is by storage class and declared size; with several
    /// clusters registered the first (lowest id) wins, which keeps test
    /// deployments deterministic.
    ///
    /// # Errors
    ///
    /// Returns an internal error when no cluster is registered.
    pub fn pick(
        &self,
        storage_class: StorageClass,
        size: i64,
    ) -> EngineResult<(Arc<dyn Cluster>, &'static str)> {
        let cluster = self
            .clusters
            .values()
            .next()
            .cloned()
            .ok_or_else(|| EngineError::Internal(anyhow!("no cluster registered")))?;
        Ok((cluster, pick_pool(storage_class, size)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
