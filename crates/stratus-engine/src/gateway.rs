//! The object-lifecycle engine's top-level handle.
//!
//! [`StorageGateway`] owns the process-wide singletons: the metadata store,
//! the backend cluster registry, the recycle-queue producer handle, and the
//! engine configuration. Individual S3 operations are implemented in the
//! [`crate::ops`] submodules as `impl StorageGateway` blocks.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cluster::{Cluster, ClusterRegistry};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::recycle::{spawn_recycle_workers, RecycleEntry, RecycleQueue};
use crate::stream::{CtrCipherReader, Md5Reader, ThrottleReader};
use stratus_meta::client::Transaction;
use stratus_meta::types::Object;
use stratus_meta::{MetaClient, MetaStore};

/// The object engine. Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub struct StorageGateway {
    pub(crate) meta: Arc<MetaStore>,
    pub(crate) clusters: Arc<ClusterRegistry>,
    pub(crate) recycle: RecycleQueue,
    pub(crate) config: Arc<EngineConfig>,
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("clusters", &self.clusters)
            .field("recycle", &self.recycle)
            .finish_non_exhaustive()
    }
}

impl StorageGateway {
    /// Assemble a gateway from its parts. The caller keeps the recycle
    /// receiver (see [`spawn_recycle_workers`]); tests often drain it
    /// directly instead.
    #[must_use]
    pub fn new(
        client: Arc<dyn MetaClient>,
        clusters: Arc<ClusterRegistry>,
        recycle: RecycleQueue,
        config: EngineConfig,
    ) -> Self {
        Self {
            meta: Arc::new(MetaStore::new(client)),
            clusters,
            recycle,
            config: Arc::new(config),
        }
    }

    /// Convenience constructor: builds the recycle channel and spawns its
    /// worker pool.
    #[must_use]
    pub fn bootstrap(
        client: Arc<dyn MetaClient>,
        clusters: Arc<ClusterRegistry>,
        config: EngineConfig,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (recycle, receiver) = RecycleQueue::new(config.recycle_queue_depth);
        let workers = spawn_recycle_workers(config.recycle_workers, receiver, Arc::clone(&clusters));
        (Self::new(client, clusters, recycle, config), workers)
    }

    /// The metadata store.
    #[must_use]
    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    /// The cluster registry.
    #[must_use]
    pub fn clusters(&self) -> &ClusterRegistry {
        &self.clusters
    }

    /// The recycle-queue producer handle.
    #[must_use]
    pub fn recycle(&self) -> &RecycleQueue {
        &self.recycle
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the canonical streaming write: bounded read, MD5 tee, optional
    /// AES-CTR encryption, QoS throttle, backend put.
    ///
    /// Returns `(object_id, bytes_written, md5_hex)`. The caller owns the
    /// recycle decision: a short write or a failed digest check must enqueue
    /// the returned blob.
    pub(crate) async fn stream_to_backend(
        &self,
        cluster: &Arc<dyn Cluster>,
        pool: &str,
        body: Box<dyn AsyncRead + Send + Unpin>,
        size: u64,
        data_key: &[u8],
        iv: &[u8],
    ) -> EngineResult<(String, u64, String)> {
        use tokio::io::AsyncReadExt;

        let md5_reader = Md5Reader::new(body.take(size));
        let md5_handle = md5_reader.handle();

        let reader: Box<dyn AsyncRead + Send + Unpin> = if data_key.is_empty() {
            Box::new(md5_reader)
        } else {
            Box::new(CtrCipherReader::new(md5_reader, data_key, iv)?)
        };
        let mut reader: Box<dyn AsyncRead + Send + Unpin> =
            if self.config.throttle_bytes_per_sec > 0 {
                Box::new(ThrottleReader::new(reader, self.config.throttle_bytes_per_sec))
            } else {
                reader
            };

        let (object_id, bytes_written) = cluster.put(pool, &mut reader).await?;
        Ok((object_id, bytes_written, md5_handle.hex_digest()))
    }

    /// Tear down a superseded object: enqueue its blobs for recycle, drop its
    /// part rows, and give back its usage, in one transaction.
    ///
    /// Best-effort: failures are logged, the blobs are already queued.
    pub(crate) async fn remove_old_object(&self, object: &Object) {
        self.recycle.enqueue_object(object);

        let mut tx = Transaction::new();
        if let Err(e) = self.meta.delete_object_parts(object, Some(&mut tx)).await {
            warn!(
                bucket = %object.bucket_name,
                key = %object.name,
                error = %e,
                "failed to stage part cleanup for superseded object"
            );
            return;
        }
        if self.config.piggyback_usage {
            if let Err(e) = self
                .meta
                .update_usage(&object.bucket_name, -(object.size as i64), Some(&mut tx))
                .await
            {
                warn!(bucket = %object.bucket_name, error = %e, "failed to stage usage rollback");
                return;
            }
        }
        if let Err(e) = self.meta.commit(tx).await {
            warn!(
                bucket = %object.bucket_name,
                key = %object.name,
                error = %e,
                "failed to clean up superseded object"
            );
        }
    }

    /// Enqueue one freshly written blob for recycle after a failed write
    /// step.
    pub(crate) fn recycle_blob(&self, cluster: &Arc<dyn Cluster>, pool: &str, object_id: String) {
        self.recycle.enqueue(RecycleEntry {
            location: cluster.id().to_owned(),
            pool: pool.to_owned(),
            object_id,
            object_type: stratus_meta::types::ObjectType::Normal,
        });
    }
}
