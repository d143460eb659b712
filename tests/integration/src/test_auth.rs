//! The authorization cascade end to end: pipeline verdicts feeding the
//! engine's ACL layer.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stratus_auth::acl::check_bucket_access;
    use stratus_auth::policy::{StaticPolicy, StaticPolicyDecoder};
    use stratus_auth::{
        AuthError, AuthPipeline, AuthRequest, AuthType, Credential, S3Action, Verdict,
    };
    use stratus_engine::{EngineError, GetObjectInput};
    use stratus_meta::types::{Acl, CannedAcl, Permission};
    use stratus_meta::MetaClient;

    use crate::{owner, stranger, test_bucket_name, test_env, RejectingVerifier, StaticVerifier};

    fn signed_request() -> AuthRequest {
        let mut req = AuthRequest::anonymous();
        req.auth_type = AuthType::SignedV4;
        req
    }

    #[tokio::test]
    async fn test_should_allow_anonymous_get_on_public_read_bucket() {
        let env = test_env();
        let bucket_name = test_bucket_name("pubread");
        env.make_bucket(&bucket_name, Acl::canned(CannedAcl::PublicRead))
            .await;
        env.put_bytes(&bucket_name, "k", b"public bytes").await;

        // Anonymous request through the pipeline, then through the engine.
        let pipeline = AuthPipeline::new(
            Arc::new(StaticPolicyDecoder(Verdict::Indeterminate)),
            Arc::new(RejectingVerifier),
        );
        let bucket = env.meta.get_bucket(&bucket_name).await.expect("bucket");
        let credential = pipeline
            .check_request_auth(
                &AuthRequest::anonymous(),
                S3Action::GetObject,
                Some(&bucket),
                "k",
            )
            .expect("anonymous pipeline pass");

        let output = env
            .gateway
            .get_object(&credential, GetObjectInput::new(&bucket_name, "k"))
            .await
            .expect("anonymous read of public-read bucket");
        assert_eq!(output.object.size, 12);
    }

    #[tokio::test]
    async fn test_should_forbid_anonymous_get_on_authenticated_read_bucket() {
        let env = test_env();
        let bucket_name = test_bucket_name("authread");
        env.make_bucket(&bucket_name, Acl::canned(CannedAcl::AuthenticatedRead))
            .await;
        env.put_bytes(&bucket_name, "k", b"members only").await;

        let result = env
            .gateway
            .get_object(
                &Credential::anonymous(),
                GetObjectInput::new(&bucket_name, "k"),
            )
            .await;
        assert!(
            matches!(
                result,
                Err(EngineError::Auth(AuthError::BucketAccessForbidden))
            ),
            "expected BucketAccessForbidden, got {result:?}"
        );

        // The same request with any authenticated credential passes.
        env.gateway
            .get_object(&stranger(), GetObjectInput::new(&bucket_name, "k"))
            .await
            .expect("authenticated read");
    }

    #[tokio::test]
    async fn test_should_let_policy_allow_bypass_acl() {
        let env = test_env();
        let bucket_name = test_bucket_name("polallow");
        env.make_bucket(&bucket_name, Acl::default()).await;
        env.put_bytes(&bucket_name, "k", b"private").await;

        // Give the bucket a policy blob; the stub decoder allows.
        {
            let bucket = env.meta.get_bucket(&bucket_name).await.expect("bucket");
            let mut updated = bucket.clone();
            updated.policy = b"{\"allow\":true}".to_vec();
            env.meta.put_bucket(updated).await.expect("store policy");
        }

        let pipeline = AuthPipeline::new(
            Arc::new(StaticPolicyDecoder(Verdict::Allow)),
            Arc::new(StaticVerifier(stranger())),
        );
        let bucket = env.meta.get_bucket(&bucket_name).await.expect("bucket");
        let credential = pipeline
            .check_request_auth(&signed_request(), S3Action::GetObject, Some(&bucket), "k")
            .expect("policy allow");
        assert!(credential.allow_other_user_access);

        // A private ACL would forbid the stranger, but the decorated
        // credential skips ACL evaluation.
        env.gateway
            .get_object(&credential, GetObjectInput::new(&bucket_name, "k"))
            .await
            .expect("policy-allowed read");
    }

    #[tokio::test]
    async fn test_should_fail_policy_deny_before_acl() {
        let env = test_env();
        let bucket_name = test_bucket_name("poldeny");
        // Even a public-read ACL cannot save an explicit policy deny.
        env.make_bucket(&bucket_name, Acl::canned(CannedAcl::PublicRead))
            .await;

        let pipeline = AuthPipeline::new(
            Arc::new(StaticPolicyDecoder(Verdict::Deny)),
            Arc::new(StaticVerifier(stranger())),
        );
        let mut bucket = env.meta.get_bucket(&bucket_name).await.expect("bucket");
        bucket.policy = b"{\"deny\":true}".to_vec();

        let result =
            pipeline.check_request_auth(&signed_request(), S3Action::GetObject, Some(&bucket), "k");
        assert!(matches!(result, Err(AuthError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_should_match_auth_precedence_formula() {
        // The decision is: owner_shortcut OR policy_allow OR
        // (policy_indeterminate AND ram_allow) OR
        // (policy_indeterminate AND ram_indeterminate AND acl_allow).
        let env = test_env();
        let bucket_name = test_bucket_name("formula");
        env.make_bucket(&bucket_name, Acl::canned(CannedAcl::PublicRead))
            .await;
        let mut bucket = env.meta.get_bucket(&bucket_name).await.expect("bucket");
        bucket.policy = b"{}".to_vec();

        struct Case {
            policy: Verdict,
            iam: Option<Verdict>,
            sub_user_of_owner: bool,
            expect_allowed: bool,
        }
        let cases = [
            // Policy allow decides alone.
            Case {
                policy: Verdict::Allow,
                iam: None,
                sub_user_of_owner: false,
                expect_allowed: true,
            },
            // Indeterminate + IAM allow for a sub-user of the owner.
            Case {
                policy: Verdict::Indeterminate,
                iam: Some(Verdict::Allow),
                sub_user_of_owner: true,
                expect_allowed: true,
            },
            // Indeterminate + IAM allow for a foreign user: IAM is skipped,
            // the public-read ACL then decides.
            Case {
                policy: Verdict::Indeterminate,
                iam: Some(Verdict::Allow),
                sub_user_of_owner: false,
                expect_allowed: true,
            },
            // Indeterminate everywhere: falls to the ACL (public-read).
            Case {
                policy: Verdict::Indeterminate,
                iam: None,
                sub_user_of_owner: false,
                expect_allowed: true,
            },
        ];

        for (i, case) in cases.iter().enumerate() {
            let mut credential = if case.sub_user_of_owner {
                let mut c = Credential::root("owner-acct", "sub");
                c.extern_user_id = "sub-user".to_owned();
                c
            } else {
                stranger()
            };
            credential.iam_policy = case.iam.map(|v| {
                Arc::new(StaticPolicy(v)) as Arc<dyn stratus_auth::PolicyDocument>
            });

            let pipeline = AuthPipeline::new(
                Arc::new(StaticPolicyDecoder(case.policy)),
                Arc::new(StaticVerifier(credential)),
            );
            let decorated = pipeline
                .check_request_auth(&signed_request(), S3Action::GetObject, Some(&bucket), "k")
                .unwrap_or_else(|e| panic!("case {i}: unexpected pipeline error {e}"));

            let allowed = check_bucket_access(
                &bucket,
                &decorated,
                Permission::Read,
                &[],
            )
            .is_ok();
            assert_eq!(allowed, case.expect_allowed, "case {i}");
        }
    }

    #[tokio::test]
    async fn test_should_reject_unknown_auth_type() {
        let pipeline = AuthPipeline::new(
            Arc::new(StaticPolicyDecoder(Verdict::Allow)),
            Arc::new(StaticVerifier(owner())),
        );
        let mut req = AuthRequest::anonymous();
        req.auth_type = AuthType::Unknown;
        let result = pipeline.check_request_auth(&req, S3Action::GetObject, None, "");
        assert!(matches!(
            result,
            Err(AuthError::SignatureVersionNotSupported)
        ));
    }

    #[tokio::test]
    async fn test_should_deny_anonymous_list_all_my_buckets() {
        let pipeline = AuthPipeline::new(
            Arc::new(StaticPolicyDecoder(Verdict::Allow)),
            Arc::new(StaticVerifier(owner())),
        );
        let result = pipeline.check_request_auth(
            &AuthRequest::anonymous(),
            S3Action::ListAllMyBuckets,
            None,
            "",
        );
        assert!(matches!(result, Err(AuthError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_should_keep_foreign_writes_out_of_private_buckets() {
        let env = test_env();
        let bucket_name = test_bucket_name("private");
        env.make_bucket(&bucket_name, Acl::default()).await;

        let input = stratus_engine::PutObjectInput::new(
            &bucket_name,
            "k",
            4,
            Box::new(std::io::Cursor::new(b"data".to_vec())),
        );
        let result = env.gateway.put_object(&stranger(), input).await;
        assert!(matches!(
            result,
            Err(EngineError::Auth(AuthError::BucketAccessForbidden))
        ));
    }

    #[tokio::test]
    async fn test_should_list_only_own_buckets() {
        let env = test_env();
        let mine = test_bucket_name("mine");
        env.make_bucket(&mine, Acl::default()).await;
        env.gateway
            .create_bucket(&stranger(), &test_bucket_name("theirs"), Acl::default())
            .await
            .expect("stranger bucket");

        let buckets = env.gateway.list_buckets(&owner()).await.expect("list");
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, mine);
    }
}
