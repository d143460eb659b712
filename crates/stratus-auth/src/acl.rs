//! Bucket ACL evaluation.
//!
//! The last layer of the cascade: it runs only when policy evaluation was
//! indeterminate, i.e. the credential does not carry
//! `allow_other_user_access`, and never for the bucket owner's root user.

use stratus_meta::types::{AclGroup, Bucket, CannedAcl, Permission};
use tracing::debug;

use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};

/// Check that the bucket's ACL grants the credential the required
/// permission. `FULL_CONTROL` always satisfies.
///
/// # Errors
///
/// Returns [`AuthError::BucketAccessForbidden`] when no canned ACL rule or
/// explicit grant matches.
pub fn check_bucket_access(
    bucket: &Bucket,
    credential: &Credential,
    permission: Permission,
    log_delivery_group: &[String],
) -> AuthResult<()> {
    // A policy layer already allowed the request.
    if credential.allow_other_user_access {
        return Ok(());
    }
    // The root user always has full control of its own bucket.
    if credential.is_root_of(&bucket.owner_id) {
        return Ok(());
    }

    if let Some(canned) = bucket.acl.canned {
        return check_canned(canned, credential, permission);
    }
    check_grants(bucket, credential, permission, log_delivery_group)
}

fn check_canned(
    canned: CannedAcl,
    credential: &Credential,
    permission: Permission,
) -> AuthResult<()> {
    let allowed = match permission {
        Permission::Read => match canned {
            CannedAcl::PublicRead | CannedAcl::PublicReadWrite => true,
            CannedAcl::AuthenticatedRead => !credential.is_anonymous(),
            _ => false,
        },
        Permission::Write => matches!(canned, CannedAcl::PublicReadWrite),
        // ACP and full-control permissions are never granted by the canned
        // ACLs a bucket can carry here.
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        debug!(%canned, ?permission, "canned ACL denied bucket access");
        Err(AuthError::BucketAccessForbidden)
    }
}

fn check_grants(
    bucket: &Bucket,
    credential: &Credential,
    permission: Permission,
    log_delivery_group: &[String],
) -> AuthResult<()> {
    let acl = &bucket.acl;
    let user_id = credential.extern_user_id.as_str();

    let by_id = |perm| {
        acl.is_permission_matched_by_id(perm, user_id)
            || acl.is_permission_matched_by_id(Permission::FullControl, user_id)
    };
    let by_group = |perm, group| {
        acl.is_permission_matched_by_group(perm, group)
            || acl.is_permission_matched_by_group(Permission::FullControl, group)
    };

    if by_id(permission) {
        return Ok(());
    }
    if by_group(permission, AclGroup::AllUsers) {
        return Ok(());
    }
    if by_group(permission, AclGroup::AuthenticatedUsers) && !credential.is_anonymous() {
        return Ok(());
    }
    if by_group(permission, AclGroup::LogDelivery)
        && log_delivery_group.iter().any(|id| id == user_id)
    {
        return Ok(());
    }

    debug!(bucket = %bucket.name, ?permission, "no ACL grant matched");
    Err(AuthError::BucketAccessForbidden)
}
