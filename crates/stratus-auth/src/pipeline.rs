//! The cascading authorization pipeline.
//!
//! Evaluation order for an authenticated request against an existing bucket:
//! owner shortcut, then bucket policy, then (for sub-users of the bucket
//! owner) IAM policy. A policy `Allow` ends the cascade; a `Deny` fails with
//! `AccessDenied`; `Indeterminate` falls through. The bucket-ACL layer is
//! applied later, per-operation, only when no policy layer allowed the
//! request (see [`crate::acl`]).

use std::sync::Arc;

use stratus_meta::types::Bucket;
use tracing::debug;

use crate::action::S3Action;
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::policy::{PolicyArgs, PolicyDecoder, PolicyDocument, Verdict};
use crate::request::{AuthRequest, AuthType, SignatureVerifier};

/// The authorization pipeline: auth-type dispatch plus the policy cascade.
pub struct AuthPipeline {
    decoder: Arc<dyn PolicyDecoder>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl AuthPipeline {
    /// Build a pipeline over the consumed policy and signature capabilities.
    #[must_use]
    pub fn new(decoder: Arc<dyn PolicyDecoder>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { decoder, verifier }
    }

    /// Authorize a request, returning the decorated credential.
    ///
    /// `bucket` is `None` only for actions that have no bucket yet
    /// (`ListAllMyBuckets`, `CreateBucket`); for everything else a missing
    /// bucket fails with `NoSuchBucket`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SignatureVersionNotSupported`] for unknown auth types.
    /// - The signature verifier's error, surfaced verbatim.
    /// - [`AuthError::AccessDenied`] on an explicit policy deny, or for
    ///   anonymous `ListAllMyBuckets`.
    pub fn check_request_auth(
        &self,
        request: &AuthRequest,
        action: S3Action,
        bucket: Option<&Bucket>,
        object_name: &str,
    ) -> AuthResult<Credential> {
        match request.auth_type {
            AuthType::Unknown => {
                debug!("rejecting request with unknown auth type");
                Err(AuthError::SignatureVersionNotSupported)
            }
            AuthType::SignedV2
            | AuthType::SignedV4
            | AuthType::PresignedV2
            | AuthType::PresignedV4 => {
                let mut credential = self.verifier.verify(request)?;
                let allow = if action.is_bucketless() {
                    self.ram_policy_allowed(credential.iam_policy.as_deref(), request, action)?
                } else {
                    let mut allow =
                        self.bucket_policy_allowed(&credential, bucket, request, action, object_name)?;
                    if !allow {
                        // A sub-user of the bucket owner gets an IAM-policy
                        // evaluation when the bucket policy was indeterminate.
                        if let Some(bucket) = bucket {
                            if credential.extern_root_id == bucket.owner_id {
                                allow = self.ram_policy_allowed(
                                    credential.iam_policy.as_deref(),
                                    request,
                                    action,
                                )?;
                            }
                        }
                    }
                    allow
                };
                credential.allow_other_user_access = allow;
                Ok(credential)
            }
            AuthType::Anonymous => {
                if action == S3Action::ListAllMyBuckets {
                    return Err(AuthError::AccessDenied);
                }
                let mut credential = Credential::anonymous();
                let allow =
                    self.bucket_policy_allowed(&credential, bucket, request, action, object_name)?;
                credential.allow_other_user_access = allow;
                Ok(credential)
            }
        }
    }

    /// Re-run the policy cascade against a copy-source bucket, decorating the
    /// credential in place.
    ///
    /// # Errors
    ///
    /// Same failure modes as the bucket-policy layer of
    /// [`AuthPipeline::check_request_auth`].
    pub fn check_source_bucket_auth(
        &self,
        credential: &mut Credential,
        bucket: &Bucket,
        request: &AuthRequest,
        action: S3Action,
        object_name: &str,
    ) -> AuthResult<()> {
        let mut allow =
            self.bucket_policy_allowed(credential, Some(bucket), request, action, object_name)?;
        if !allow && credential.extern_root_id == bucket.owner_id {
            allow = self.ram_policy_allowed(credential.iam_policy.as_deref(), request, action)?;
        }
        credential.allow_other_user_access = allow;
        Ok(())
    }

    /// Bucket-policy layer: `Ok(true)` for owner shortcut or explicit allow,
    /// `Ok(false)` for indeterminate, `Err(AccessDenied)` for explicit deny.
    fn bucket_policy_allowed(
        &self,
        credential: &Credential,
        bucket: Option<&Bucket>,
        request: &AuthRequest,
        action: S3Action,
        object_name: &str,
    ) -> AuthResult<bool> {
        let Some(bucket) = bucket else {
            return Err(AuthError::NoSuchBucket {
                bucket: String::new(),
            });
        };

        // The root user always has full control of its own bucket.
        if credential.is_root_of(&bucket.owner_id) {
            return Ok(true);
        }

        let Some(document) = self.decoder.decode(&bucket.policy)? else {
            return Ok(false);
        };
        let conditions = request.condition_values();
        let verdict = document.is_allowed(&PolicyArgs {
            account: &credential.extern_user_id,
            action,
            bucket: &bucket.name,
            object: object_name,
            conditions: &conditions,
        });
        match verdict {
            Verdict::Allow => Ok(true),
            Verdict::Deny => Err(AuthError::AccessDenied),
            Verdict::Indeterminate => Ok(false),
        }
    }

    /// IAM-policy layer. Evaluates the action only, with no resource
    /// binding. For the bucketless actions an indeterminate outcome (or a
    /// missing policy) becomes a deny.
    fn ram_policy_allowed(
        &self,
        policy: Option<&dyn PolicyDocument>,
        request: &AuthRequest,
        action: S3Action,
    ) -> AuthResult<bool> {
        let Some(policy) = policy else {
            if action.is_bucketless() {
                return Err(AuthError::AccessDenied);
            }
            return Ok(false);
        };

        let conditions = request.condition_values();
        let verdict = policy.is_allowed(&PolicyArgs {
            account: "",
            action,
            bucket: "",
            object: "",
            conditions: &conditions,
        });
        match verdict {
            Verdict::Allow => Ok(true),
            Verdict::Deny => Err(AuthError::AccessDenied),
            Verdict::Indeterminate => {
                if action.is_bucketless() {
                    Err(AuthError::AccessDenied)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
