//! Bucket operations: admission, deletion, versioning, listing, usage.

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::gateway::StorageGateway;
use stratus_auth::acl::check_bucket_access;
use stratus_auth::Credential;
use stratus_meta::types::{Acl, Bucket, Permission, VersioningStatus};
use stratus_meta::MetaError;

impl StorageGateway {
    /// Create a bucket owned by the credential's root account.
    ///
    /// Admission is idempotent at the store level; losing the race (or the
    /// name being taken) surfaces as `BucketAlreadyExists`.
    pub async fn create_bucket(
        &self,
        credential: &Credential,
        bucket_name: &str,
        acl: Acl,
    ) -> EngineResult<()> {
        let mut bucket = Bucket::new(bucket_name, credential.extern_root_id.clone());
        bucket.acl = acl;

        let created = self.meta.check_and_put_bucket(bucket).await?;
        if !created {
            return Err(EngineError::BucketAlreadyExists {
                bucket: bucket_name.to_owned(),
            });
        }
        info!(bucket = %bucket_name, owner = %credential.extern_root_id, "bucket created");
        Ok(())
    }

    /// Delete a bucket. Requires ownership and full emptiness: no live
    /// versions, no null version, no in-flight multipart uploads.
    pub async fn delete_bucket(
        &self,
        credential: &Credential,
        bucket_name: &str,
    ) -> EngineResult<()> {
        let bucket = self.meta.get_bucket_info(bucket_name).await?;
        if !credential.allow_other_user_access && bucket.owner_id != credential.extern_root_id {
            return Err(stratus_auth::AuthError::AccessDenied.into());
        }
        if !self.meta.is_empty_bucket(&bucket).await? {
            return Err(MetaError::BucketNotEmpty {
                bucket: bucket_name.to_owned(),
            }
            .into());
        }
        self.meta.delete_bucket(&bucket).await?;
        info!(bucket = %bucket_name, "bucket deleted");
        Ok(())
    }

    /// The buckets owned by the credential's root account.
    pub async fn list_buckets(&self, credential: &Credential) -> EngineResult<Vec<Bucket>> {
        let names = self
            .meta
            .list_user_buckets(&credential.extern_root_id)
            .await?;
        let mut buckets = Vec::with_capacity(names.len());
        for name in names {
            buckets.push((*self.meta.get_bucket(&name, true).await?).clone());
        }
        Ok(buckets)
    }

    /// The bucket's versioning status.
    pub async fn get_bucket_versioning(
        &self,
        credential: &Credential,
        bucket_name: &str,
    ) -> EngineResult<VersioningStatus> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;
        Ok(bucket.versioning)
    }

    /// Set the bucket's versioning status from a wire value; only `Enabled`
    /// and `Suspended` are acceptable.
    pub async fn put_bucket_versioning(
        &self,
        credential: &Credential,
        bucket_name: &str,
        status: &str,
    ) -> EngineResult<()> {
        let requested =
            VersioningStatus::from_wire(status).map_err(|_| EngineError::InvalidVersioning)?;

        let bucket = self.meta.get_bucket_info(bucket_name).await?;
        if !credential.allow_other_user_access && bucket.owner_id != credential.extern_root_id {
            return Err(stratus_auth::AuthError::AccessDenied.into());
        }

        let mut updated = (*bucket).clone();
        updated.versioning = requested;
        self.meta.put_bucket(updated).await?;
        info!(bucket = %bucket_name, status = %requested, "bucket versioning updated");
        Ok(())
    }

    /// Replace the bucket ACL.
    pub async fn put_bucket_acl(
        &self,
        credential: &Credential,
        bucket_name: &str,
        acl: Acl,
    ) -> EngineResult<()> {
        let bucket = self.meta.get_bucket_info(bucket_name).await?;
        if !credential.allow_other_user_access && bucket.owner_id != credential.extern_root_id {
            return Err(stratus_auth::AuthError::AccessDenied.into());
        }
        let mut updated = (*bucket).clone();
        updated.acl = acl;
        self.meta.put_bucket(updated).await?;
        Ok(())
    }

    /// Accurate usage reading for a bucket.
    pub async fn get_bucket_usage(
        &self,
        credential: &Credential,
        bucket_name: &str,
    ) -> EngineResult<i64> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;
        Ok(self.meta.get_usage(bucket_name).await?)
    }
}
