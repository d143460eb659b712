//! Single-part object lifecycle: put, get, overwrite, delete, recycle.

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use stratus_engine::{
        EngineError, GetObjectInput, PutObjectInput, SseRequest, StreamVerifier, MAX_PART_SIZE,
    };
    use stratus_meta::types::{Acl, NULL_VERSION_ID};
    use stratus_meta::{MetaClient, MetaError};

    use crate::{md5_hex, owner, test_bucket_name, test_env};

    #[tokio::test]
    async fn test_should_roundtrip_put_and_get() {
        let env = test_env();
        let bucket = test_bucket_name("roundtrip");
        env.make_bucket(&bucket, Acl::default()).await;

        let data = b"ten bytes!";
        assert_eq!(data.len(), 10);
        let put = env.put_bytes(&bucket, "a", data).await;
        assert_eq!(put.etag, md5_hex(data));
        assert!(put.version_id.is_none(), "null slot has no wire version");

        let read = env.get_bytes(&bucket, "a").await;
        assert_eq!(read, data);
        env.assert_no_recycle().await;
    }

    #[tokio::test]
    async fn test_should_recycle_prior_blob_on_overwrite() {
        let env = test_env();
        let bucket = test_bucket_name("overwrite");
        env.make_bucket(&bucket, Acl::default()).await;

        env.put_bytes(&bucket, "a", b"first contents").await;
        let first_row = env
            .meta
            .get_object(&bucket, "a", NULL_VERSION_ID)
            .await
            .expect("first row");

        env.put_bytes(&bucket, "a", b"second contents").await;
        assert_eq!(env.get_bytes(&bucket, "a").await, b"second contents");

        // The superseded null version's blob lands in the recycle queue.
        let entry = env.expect_recycle().await;
        assert_eq!(entry.object_id, first_row.object_id);

        let second_row = env
            .meta
            .get_object(&bucket, "a", NULL_VERSION_ID)
            .await
            .expect("second row");
        assert_ne!(second_row.object_id, first_row.object_id);
    }

    #[tokio::test]
    async fn test_should_fail_bad_digest_and_recycle() {
        let env = test_env();
        let bucket = test_bucket_name("digest");
        env.make_bucket(&bucket, Acl::default()).await;

        let mut input = PutObjectInput::new(
            &bucket,
            "k",
            4,
            Box::new(std::io::Cursor::new(b"body".to_vec())),
        );
        input.content_md5 = Some(md5_hex(b"different"));

        let result = env.gateway.put_object(&owner(), input).await;
        assert!(matches!(result, Err(EngineError::BadDigest)));

        // The backend blob of the failed attempt is queued for reclamation
        // and no metadata was committed.
        let entry = env.expect_recycle().await;
        assert!(env.cluster.contains(&entry.pool, &entry.object_id));
        assert!(matches!(
            env.meta.get_object(&bucket, "k", NULL_VERSION_ID).await,
            Err(MetaError::NoSuchKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_fail_incomplete_body_and_recycle() {
        let env = test_env();
        let bucket = test_bucket_name("short");
        env.make_bucket(&bucket, Acl::default()).await;

        // Declared 100 bytes, the stream carries 10.
        let input = PutObjectInput::new(
            &bucket,
            "k",
            100,
            Box::new(std::io::Cursor::new(vec![1u8; 10])),
        );
        let result = env.gateway.put_object(&owner(), input).await;
        assert!(matches!(result, Err(EngineError::IncompleteBody)));
        env.expect_recycle().await;
    }

    #[tokio::test]
    async fn test_should_reject_oversized_put() {
        let env = test_env();
        let bucket = test_bucket_name("huge");
        env.make_bucket(&bucket, Acl::default()).await;

        let input = PutObjectInput::new(
            &bucket,
            "k",
            MAX_PART_SIZE + 1,
            Box::new(std::io::Cursor::new(Vec::new())),
        );
        let result = env.gateway.put_object(&owner(), input).await;
        assert!(matches!(result, Err(EngineError::EntityTooLarge)));
        // Rejected before any backend allocation.
        env.assert_no_recycle().await;
    }

    #[tokio::test]
    async fn test_should_honor_forbid_overwrite() {
        let env = test_env();
        let bucket = test_bucket_name("forbid");
        env.make_bucket(&bucket, Acl::default()).await;
        env.put_bytes(&bucket, "k", b"existing").await;

        let mut input = PutObjectInput::new(
            &bucket,
            "k",
            3,
            Box::new(std::io::Cursor::new(b"new".to_vec())),
        );
        input.forbid_overwrite = true;
        let result = env.gateway.put_object(&owner(), input).await;
        assert!(matches!(result, Err(EngineError::ForbiddenOverwriteKey)));
        assert_eq!(env.get_bytes(&bucket, "k").await, b"existing");
    }

    struct FailingStreamVerifier;

    impl StreamVerifier for FailingStreamVerifier {
        fn verify(&self) -> Result<(), stratus_auth::AuthError> {
            Err(stratus_auth::AuthError::SignatureDoesNotMatch)
        }
    }

    #[tokio::test]
    async fn test_should_recycle_when_stream_verification_fails() {
        let env = test_env();
        let bucket = test_bucket_name("chunked");
        env.make_bucket(&bucket, Acl::default()).await;

        let mut input = PutObjectInput::new(
            &bucket,
            "k",
            4,
            Box::new(std::io::Cursor::new(b"body".to_vec())),
        );
        input.verifier = Some(Box::new(FailingStreamVerifier));

        let result = env.gateway.put_object(&owner(), input).await;
        assert!(result.is_err());
        env.expect_recycle().await;
    }

    #[tokio::test]
    async fn test_should_delete_missing_key_without_error() {
        let env = test_env();
        let bucket = test_bucket_name("idem");
        env.make_bucket(&bucket, Acl::default()).await;

        let out = env
            .gateway
            .delete_object(&owner(), &bucket, "ghost", None)
            .await
            .expect("idempotent delete");
        assert!(!out.delete_marker);
        assert!(out.version_id.is_none());
    }

    #[tokio::test]
    async fn test_should_update_usage_across_put_and_delete() {
        let env = test_env();
        let bucket = test_bucket_name("usage");
        env.make_bucket(&bucket, Acl::default()).await;

        env.put_bytes(&bucket, "k", &vec![0u8; 500]).await;
        assert_eq!(
            env.gateway
                .get_bucket_usage(&owner(), &bucket)
                .await
                .expect("usage"),
            500
        );

        env.gateway
            .delete_object(&owner(), &bucket, "k", None)
            .await
            .expect("delete");
        env.expect_recycle().await;
        assert_eq!(
            env.gateway
                .get_bucket_usage(&owner(), &bucket)
                .await
                .expect("usage"),
            0
        );
    }

    #[tokio::test]
    async fn test_should_encrypt_at_rest_with_sse_s3() {
        let env = test_env();
        let bucket = test_bucket_name("sse");
        env.make_bucket(&bucket, Acl::default()).await;

        let plaintext = b"sensitive payload".to_vec();
        let mut input = PutObjectInput::new(
            &bucket,
            "secret",
            plaintext.len() as u64,
            Box::new(std::io::Cursor::new(plaintext.clone())),
        );
        input.sse = SseRequest::s3();
        env.gateway
            .put_object(&owner(), input)
            .await
            .expect("sse put");

        // What landed in the backend is ciphertext.
        let row = env
            .meta
            .get_object(&bucket, "secret", NULL_VERSION_ID)
            .await
            .expect("row");
        let stored = env
            .cluster
            .blob(&row.pool, &row.object_id)
            .expect("stored blob");
        assert_ne!(stored.as_ref(), plaintext.as_slice());
        assert!(!row.encryption_key.is_empty(), "sealed key must be stored");
        assert!(!row.initialization_vector.is_empty());

        // The read path decrypts transparently.
        assert_eq!(env.get_bytes(&bucket, "secret").await, plaintext);
    }

    #[tokio::test]
    async fn test_should_read_byte_ranges_of_encrypted_object() {
        let env = test_env();
        let bucket = test_bucket_name("range");
        env.make_bucket(&bucket, Acl::default()).await;

        let plaintext: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        let mut input = PutObjectInput::new(
            &bucket,
            "blob",
            plaintext.len() as u64,
            Box::new(std::io::Cursor::new(plaintext.clone())),
        );
        input.sse = SseRequest::s3();
        env.gateway.put_object(&owner(), input).await.expect("put");

        let mut get = GetObjectInput::new(&bucket, "blob");
        get.range = Some((1000, 500));
        let output = env.gateway.get_object(&owner(), get).await.expect("get");
        let mut body = output.body;
        let mut data = Vec::new();
        body.read_to_end(&mut data).await.expect("read");
        assert_eq!(data, plaintext[1000..1500]);
    }

    #[tokio::test]
    async fn test_should_reject_unsatisfiable_range() {
        let env = test_env();
        let bucket = test_bucket_name("badrange");
        env.make_bucket(&bucket, Acl::default()).await;
        env.put_bytes(&bucket, "k", b"abc").await;

        let mut get = GetObjectInput::new(&bucket, "k");
        get.range = Some((10, 1));
        let result = env.gateway.get_object(&owner(), get).await;
        assert!(matches!(result, Err(EngineError::InvalidRange)));
    }

    #[tokio::test]
    async fn test_should_refuse_bucket_delete_until_empty() {
        let env = test_env();
        let bucket = test_bucket_name("delete");
        env.make_bucket(&bucket, Acl::default()).await;
        env.put_bytes(&bucket, "k", b"x").await;

        let result = env.gateway.delete_bucket(&owner(), &bucket).await;
        assert!(
            matches!(
                result,
                Err(EngineError::Meta(MetaError::BucketNotEmpty { .. }))
            ),
            "expected BucketNotEmpty, got {result:?}"
        );

        env.gateway
            .delete_object(&owner(), &bucket, "k", None)
            .await
            .expect("empty the bucket");
        env.gateway
            .delete_bucket(&owner(), &bucket)
            .await
            .expect("delete empty bucket");
    }
}
