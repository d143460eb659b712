//! Listing semantics: prefixes, delimiters, pagination, version markers.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use stratus_engine::{ListObjectsInput, ListVersionsInput};
    use stratus_meta::types::Acl;

    use crate::{owner, test_bucket_name, test_env, TestEnv};

    async fn bucket_with_keys(env: &TestEnv, prefix: &str, keys: &[&str]) -> String {
        let bucket = test_bucket_name(prefix);
        env.make_bucket(&bucket, Acl::default()).await;
        for key in keys {
            env.put_bytes(&bucket, key, key.as_bytes()).await;
        }
        bucket
    }

    #[tokio::test]
    async fn test_should_fold_common_prefixes() {
        let env = test_env();
        let bucket = bucket_with_keys(&env, "fold", &["p/a", "p/b", "p/c/x", "q/y"]).await;

        let listing = env
            .gateway
            .list_objects(
                &owner(),
                &bucket,
                &ListObjectsInput {
                    prefix: "p/".to_owned(),
                    delimiter: "/".to_owned(),
                    ..ListObjectsInput::default()
                },
            )
            .await
            .expect("list");

        let keys: Vec<&str> = listing.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(keys, vec!["p/a", "p/b"]);
        assert_eq!(listing.common_prefixes, vec!["p/c/".to_owned()]);
        assert!(!listing.is_truncated);
    }

    #[tokio::test]
    async fn test_should_cover_all_keys_across_pages() {
        let env = test_env();
        let all_keys: Vec<String> = (0..17).map(|i| format!("key-{i:02}")).collect();
        let key_refs: Vec<&str> = all_keys.iter().map(String::as_str).collect();
        let bucket = bucket_with_keys(&env, "pages", &key_refs).await;

        // The union of pages equals the full live key set.
        let mut seen = BTreeSet::new();
        let mut marker = String::new();
        loop {
            let page = env
                .gateway
                .list_objects(
                    &owner(),
                    &bucket,
                    &ListObjectsInput {
                        marker: marker.clone(),
                        max_keys: 5,
                        ..ListObjectsInput::default()
                    },
                )
                .await
                .expect("page");
            for obj in &page.objects {
                assert!(seen.insert(obj.name.clone()), "duplicate key {}", obj.name);
            }
            if !page.is_truncated {
                break;
            }
            marker = page.next_marker.clone().expect("truncated page has marker");
        }
        let expected: BTreeSet<String> = all_keys.into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_should_report_truncation_with_next_marker() {
        let env = test_env();
        let bucket = bucket_with_keys(&env, "trunc", &["a", "b", "c", "d"]).await;

        let page = env
            .gateway
            .list_objects(
                &owner(),
                &bucket,
                &ListObjectsInput {
                    max_keys: 2,
                    ..ListObjectsInput::default()
                },
            )
            .await
            .expect("page");
        assert_eq!(page.objects.len(), 2);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_should_skip_prefix_siblings_after_folding() {
        let env = test_env();
        let bucket = bucket_with_keys(
            &env,
            "skip",
            &["logs/2024/a", "logs/2024/b", "logs/2025/a", "readme"],
        )
        .await;

        let listing = env
            .gateway
            .list_objects(
                &owner(),
                &bucket,
                &ListObjectsInput {
                    delimiter: "/".to_owned(),
                    ..ListObjectsInput::default()
                },
            )
            .await
            .expect("list");
        assert_eq!(listing.common_prefixes, vec!["logs/".to_owned()]);
        let keys: Vec<&str> = listing.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(keys, vec!["readme"]);
    }

    #[tokio::test]
    async fn test_should_list_versions_with_null_marker() {
        let env = test_env();
        let bucket = test_bucket_name("vmark");
        env.make_bucket(&bucket, Acl::default()).await;

        // A null-era write, then versioned writes on the same key.
        env.put_bytes(&bucket, "k", b"null era").await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable");
        env.put_bytes(&bucket, "k", b"v1").await;
        env.put_bytes(&bucket, "k", b"v2").await;

        let all = env
            .gateway
            .list_object_versions(&owner(), &bucket, &ListVersionsInput::default())
            .await
            .expect("list all");
        assert_eq!(all.objects.len(), 3);
        // The null row is the oldest write, so it comes back last.
        assert!(all.objects[2].is_null_version());

        // Resuming after the null version leaves nothing (it is the oldest).
        let after_null = env
            .gateway
            .list_object_versions(
                &owner(),
                &bucket,
                &ListVersionsInput {
                    key_marker: "k".to_owned(),
                    version_id_marker: "null".to_owned(),
                    ..ListVersionsInput::default()
                },
            )
            .await
            .expect("resume after null");
        assert!(after_null.objects.is_empty());

        // Resuming after the newest versioned row yields the older two.
        let newest = all.objects[0].wire_version_id();
        let resumed = env
            .gateway
            .list_object_versions(
                &owner(),
                &bucket,
                &ListVersionsInput {
                    key_marker: "k".to_owned(),
                    version_id_marker: newest,
                    ..ListVersionsInput::default()
                },
            )
            .await
            .expect("resume");
        assert_eq!(resumed.objects.len(), 2);
        assert!(resumed.objects[1].is_null_version());
    }

    #[tokio::test]
    async fn test_should_resume_after_common_prefix_marker() {
        // Pins the marker-at-a-prefix-boundary behavior: a key-marker ending
        // in the delimiter resumes after the whole prefix rather than inside
        // it, and does not re-emit the prefix.
        let env = test_env();
        let bucket = test_bucket_name("boundary");
        env.make_bucket(&bucket, Acl::default()).await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable");
        for key in ["p/a", "p/c/x", "p/c/y", "p/d"] {
            env.put_bytes(&bucket, key, key.as_bytes()).await;
        }

        let resumed = env
            .gateway
            .list_object_versions(
                &owner(),
                &bucket,
                &ListVersionsInput {
                    prefix: "p/".to_owned(),
                    delimiter: "/".to_owned(),
                    key_marker: "p/c/".to_owned(),
                    ..ListVersionsInput::default()
                },
            )
            .await
            .expect("resume at boundary");

        let keys: Vec<&str> = resumed.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(keys, vec!["p/d"], "listing resumes past the whole prefix");
        assert!(
            resumed.common_prefixes.is_empty(),
            "the prefix at the marker is not re-emitted"
        );
    }

    #[tokio::test]
    async fn test_should_paginate_versions_across_keys() {
        let env = test_env();
        let bucket = test_bucket_name("vpages");
        env.make_bucket(&bucket, Acl::default()).await;
        env.gateway
            .put_bucket_versioning(&owner(), &bucket, "Enabled")
            .await
            .expect("enable");

        for key in ["a", "b"] {
            env.put_bytes(&bucket, key, b"one").await;
            env.put_bytes(&bucket, key, b"two").await;
        }

        let page1 = env
            .gateway
            .list_object_versions(
                &owner(),
                &bucket,
                &ListVersionsInput {
                    max_keys: 3,
                    ..ListVersionsInput::default()
                },
            )
            .await
            .expect("page 1");
        assert_eq!(page1.objects.len(), 3);
        assert!(page1.is_truncated);

        let page2 = env
            .gateway
            .list_object_versions(
                &owner(),
                &bucket,
                &ListVersionsInput {
                    key_marker: page1.next_key_marker.clone().expect("key marker"),
                    version_id_marker: page1
                        .next_version_id_marker
                        .clone()
                        .expect("version marker"),
                    ..ListVersionsInput::default()
                },
            )
            .await
            .expect("page 2");
        assert_eq!(page2.objects.len(), 1);
        assert!(!page2.is_truncated);

        // Four version rows total, none seen twice.
        let mut seen: Vec<(String, String)> = Vec::new();
        for obj in page1.objects.iter().chain(page2.objects.iter()) {
            let id = (obj.name.clone(), obj.wire_version_id());
            assert!(!seen.contains(&id), "duplicate row {id:?}");
            seen.push(id);
        }
        assert_eq!(seen.len(), 4);
    }
}
