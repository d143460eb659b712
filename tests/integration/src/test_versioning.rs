//! Versioning state machine: enabled, suspended, delete markers, the null
//! slot.

#[cfg(test)]
mod tests {
    use stratus_engine::{EngineError, GetObjectInput, ListObjectsInput, ListVersionsInput};
    use stratus_meta::types::{Acl, NULL_VERSION_ID};
    use stratus_meta::MetaClient;

    use crate::{owner, test_bucket_name, test_env, TestEnv};

    async fn versioned_bucket(env: &TestEnv, prefix: &str) -> String {
        let bucket = test_bucket_name(prefix);
        env.make_bucket(&bucket, Acl::default()).await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable versioning");
        bucket
    }

    #[tokio::test]
    async fn test_should_list_put_put_delete_as_three_versions() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "ppd").await;

        env.put_bytes(&bucket, "k", b"version one").await;
        env.put_bytes(&bucket, "k", b"version two").await;
        let deleted = env
            .gateway
            .delete_object(&owner(), &bucket, "k", None)
            .await
            .expect("delete");
        assert!(deleted.delete_marker);

        // Versioned listing: three rows, newest first.
        let versions = env
            .gateway
            .list_object_versions(&owner(), &bucket, &ListVersionsInput::default())
            .await
            .expect("list versions");
        assert_eq!(versions.objects.len(), 3);
        assert!(versions.objects[0].delete_marker, "newest is the marker");
        assert!(!versions.objects[1].delete_marker);
        assert!(!versions.objects[2].delete_marker);
        assert!(
            versions.objects[1].create_time > versions.objects[2].create_time,
            "versions must come back newest first"
        );

        // Latest-only listing: the marker hides the key entirely.
        let latest = env
            .gateway
            .list_objects(&owner(), &bucket, &ListObjectsInput::default())
            .await
            .expect("list latest");
        assert!(latest.objects.is_empty());

        // And a plain GET resolves to the marker.
        let result = env
            .gateway
            .get_object(&owner(), GetObjectInput::new(&bucket, "k"))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::Meta(stratus_meta::MetaError::NoSuchKey { .. }))
        ));
    }

    #[tokio::test]
    async fn test_should_assign_monotonically_sorting_version_ids() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "mono").await;

        let first = env.put_bytes(&bucket, "k", b"one").await;
        let second = env.put_bytes(&bucket, "k", b"two").await;

        let v1: u64 = first
            .version_id
            .expect("versioned put")
            .parse()
            .expect("numeric");
        let v2: u64 = second
            .version_id
            .expect("versioned put")
            .parse()
            .expect("numeric");
        assert!(
            v2 < v1,
            "the later write must sort first in ascending order: {v2} >= {v1}"
        );
    }

    #[tokio::test]
    async fn test_should_keep_distinct_version_rows_without_recycling() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "keep").await;

        env.put_bytes(&bucket, "k", b"one").await;
        env.put_bytes(&bucket, "k", b"two").await;

        // Both versions remain readable; nothing was superseded.
        env.assert_no_recycle().await;
        let versions = env
            .gateway
            .list_object_versions(&owner(), &bucket, &ListVersionsInput::default())
            .await
            .expect("list");
        assert_eq!(versions.objects.len(), 2);
        assert_eq!(env.cluster.blob_count(), 2);
    }

    #[tokio::test]
    async fn test_should_read_specific_versions() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "byver").await;

        let first = env.put_bytes(&bucket, "k", b"old bytes").await;
        env.put_bytes(&bucket, "k", b"new bytes").await;

        let mut get = GetObjectInput::new(&bucket, "k");
        get.version = first.version_id.clone();
        let output = env.gateway.get_object(&owner(), get).await.expect("get v1");
        assert_eq!(output.object.etag, crate::md5_hex(b"old bytes"));

        assert_eq!(env.get_bytes(&bucket, "k").await, b"new bytes");
    }

    #[tokio::test]
    async fn test_should_keep_single_null_version_when_suspended() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "null").await;

        env.put_bytes(&bucket, "k", b"versioned").await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Suspended")
            .await
            .expect("suspend");

        env.put_bytes(&bucket, "k", b"null one").await;
        env.put_bytes(&bucket, "k", b"null two").await;
        // The second null write superseded the first.
        env.expect_recycle().await;

        let versions = env
            .gateway
            .list_object_versions(&owner(), &bucket, &ListVersionsInput::default())
            .await
            .expect("list");
        let null_rows = versions
            .objects
            .iter()
            .filter(|o| o.is_null_version())
            .count();
        assert_eq!(null_rows, 1, "at most one null version per key");
        assert_eq!(versions.objects.len(), 2);

        // The suspended bucket still resolves the newest write.
        assert_eq!(env.get_bytes(&bucket, "k").await, b"null two");
    }

    #[tokio::test]
    async fn test_should_replace_null_slot_with_delete_marker_when_suspended() {
        let env = test_env();
        let bucket = test_bucket_name("susdel");
        env.make_bucket(&bucket, Acl::default()).await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable");
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Suspended")
            .await
            .expect("suspend");

        env.put_bytes(&bucket, "k", b"null contents").await;
        let out = env
            .gateway
            .delete_object(&owner(), &bucket, "k", None)
            .await
            .expect("delete");
        assert!(out.delete_marker);
        assert_eq!(out.version_id.as_deref(), Some("null"));

        // The displaced null version's blob is reclaimed.
        env.expect_recycle().await;

        let row = env
            .meta
            .get_object(&bucket, "k", NULL_VERSION_ID)
            .await
            .expect("marker row");
        assert!(row.delete_marker);
        assert_eq!(row.size, 0);
    }

    #[tokio::test]
    async fn test_should_delete_specific_version_row() {
        let env = test_env();
        let bucket = versioned_bucket(&env, "delver").await;

        let first = env.put_bytes(&bucket, "k", b"one").await;
        env.put_bytes(&bucket, "k", b"two").await;

        let out = env
            .gateway
            .delete_object(&owner(), &bucket, "k", first.version_id.as_deref())
            .await
            .expect("delete version");
        assert!(!out.delete_marker);
        env.expect_recycle().await;

        let versions = env
            .gateway
            .list_object_versions(&owner(), &bucket, &ListVersionsInput::default())
            .await
            .expect("list");
        assert_eq!(versions.objects.len(), 1);
        assert_eq!(env.get_bytes(&bucket, "k").await, b"two");
    }

    #[tokio::test]
    async fn test_should_reject_invalid_versioning_values() {
        let env = test_env();
        let bucket = test_bucket_name("badver");
        env.make_bucket(&bucket, Acl::default()).await;

        for bad in ["Disabled", "enabled", "on", ""] {
            let result = env
                .gateway
                .put_bucket_versioning(&owner(), &bucket, bad)
                .await;
            assert!(
                matches!(result, Err(EngineError::InvalidVersioning)),
                "value {bad:?} must be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_should_resolve_latest_across_null_and_versioned_rows() {
        let env = test_env();
        let bucket = test_bucket_name("resolve");
        env.make_bucket(&bucket, Acl::default()).await;

        // Write into the null slot first, then enable versioning and write a
        // versioned row: the versioned row is now the latest.
        env.put_bytes(&bucket, "k", b"null era").await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable");
        env.put_bytes(&bucket, "k", b"versioned era").await;

        assert_eq!(env.get_bytes(&bucket, "k").await, b"versioned era");

        // The old null version is still addressable directly.
        let mut get = GetObjectInput::new(&bucket, "k");
        get.version = Some("null".to_owned());
        let output = env
            .gateway
            .get_object(&owner(), get)
            .await
            .expect("get null");
        assert_eq!(output.object.etag, crate::md5_hex(b"null era"));
    }
}
