//! The recycle pipeline end to end: orphaned blobs are reclaimed by the
//! worker pool and storage never leaks.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use stratus_engine::{
        Cluster, ClusterRegistry, EngineConfig, PutObjectInput, StorageGateway,
    };
    use stratus_meta::types::Acl;
    use stratus_meta::{MemMetaClient, MetaClient};

    use crate::{init_tracing, md5_hex, owner, test_bucket_name};

    /// A gateway with live recycle workers draining into the cluster.
    fn worker_env() -> (StorageGateway, Arc<stratus_engine::MemCluster>) {
        init_tracing();
        let meta = Arc::new(MemMetaClient::new());
        let cluster = Arc::new(stratus_engine::MemCluster::new("mem-fs"));
        let mut registry = ClusterRegistry::new();
        registry.register(Arc::clone(&cluster) as Arc<dyn Cluster>);

        let (gateway, _workers) = StorageGateway::bootstrap(
            meta as Arc<dyn MetaClient>,
            Arc::new(registry),
            EngineConfig::default(),
        );
        (gateway, cluster)
    }

    /// Poll until the cluster holds exactly `expected` blobs.
    async fn wait_for_blob_count(cluster: &stratus_engine::MemCluster, expected: usize) {
        for _ in 0..200 {
            if cluster.blob_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {expected} blobs, cluster still holds {}",
            cluster.blob_count()
        );
    }

    #[tokio::test]
    async fn test_should_reclaim_superseded_blob() {
        let (gateway, cluster) = worker_env();
        let bucket = test_bucket_name("workers");
        gateway
            .create_bucket(&owner(), &bucket, Acl::default())
            .await
            .expect("bucket");

        let put = |data: Vec<u8>| {
            PutObjectInput::new(&bucket, "k", data.len() as u64, {
                Box::new(std::io::Cursor::new(data))
            })
        };
        gateway
            .put_object(&owner(), put(b"first".to_vec()))
            .await
            .expect("first put");
        gateway
            .put_object(&owner(), put(b"second".to_vec()))
            .await
            .expect("second put");

        // The worker pool reclaims the superseded blob; only the live one
        // remains.
        wait_for_blob_count(&cluster, 1).await;
    }

    #[tokio::test]
    async fn test_should_leak_nothing_after_failed_writes() {
        let (gateway, cluster) = worker_env();
        let bucket = test_bucket_name("noleak");
        gateway
            .create_bucket(&owner(), &bucket, Acl::default())
            .await
            .expect("bucket");

        // One good object...
        gateway
            .put_object(
                &owner(),
                PutObjectInput::new(
                    &bucket,
                    "live",
                    4,
                    Box::new(std::io::Cursor::new(b"good".to_vec())),
                ),
            )
            .await
            .expect("good put");

        // ...then a burst of failed writes: every one allocates a blob that
        // must be reclaimed.
        for i in 0..5 {
            let mut input = PutObjectInput::new(
                &bucket,
                "bad",
                4,
                Box::new(std::io::Cursor::new(b"body".to_vec())),
            );
            input.content_md5 = Some(md5_hex(format!("wrong-{i}").as_bytes()));
            let result = gateway.put_object(&owner(), input).await;
            assert!(result.is_err(), "digest mismatch must fail");
        }

        wait_for_blob_count(&cluster, 1).await;
    }
}
