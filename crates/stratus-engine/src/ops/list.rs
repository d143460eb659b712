//! Listing operations over buckets.

use crate::error::EngineResult;
use crate::gateway::StorageGateway;
use stratus_auth::acl::check_bucket_access;
use stratus_auth::Credential;
use stratus_meta::client::{ObjectListing, VersionedListing};
use stratus_meta::types::{Permission, VersioningStatus};

/// Default and maximum page size for listings.
pub const MAX_LISTING_KEYS: usize = 1000;

/// Parameters of a `ListObjects`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsInput {
    /// Key prefix filter.
    pub prefix: String,
    /// Delimiter for common-prefix folding; empty disables folding.
    pub delimiter: String,
    /// Exclusive start marker.
    pub marker: String,
    /// Page size; clamped to [`MAX_LISTING_KEYS`].
    pub max_keys: usize,
}

/// Parameters of a `ListObjectVersions`.
#[derive(Debug, Clone, Default)]
pub struct ListVersionsInput {
    /// Key prefix filter.
    pub prefix: String,
    /// Delimiter for common-prefix folding; empty disables folding.
    pub delimiter: String,
    /// Key to resume from.
    pub key_marker: String,
    /// Version to resume after within `key_marker`; `"null"` names the null
    /// version.
    pub version_id_marker: String,
    /// Page size; clamped to [`MAX_LISTING_KEYS`].
    pub max_keys: usize,
}

fn clamp_max_keys(max_keys: usize) -> usize {
    if max_keys == 0 {
        MAX_LISTING_KEYS
    } else {
        max_keys.min(MAX_LISTING_KEYS)
    }
}

impl StorageGateway {
    /// List the visible objects of a bucket: one entry per key, delete
    /// markers hidden, common prefixes folded by the delimiter.
    pub async fn list_objects(
        &self,
        credential: &Credential,
        bucket_name: &str,
        input: &ListObjectsInput,
    ) -> EngineResult<ObjectListing> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;

        let max_keys = clamp_max_keys(input.max_keys);
        let listing = if bucket.versioning == VersioningStatus::Disabled {
            self.meta
                .list_objects(
                    bucket_name,
                    &input.marker,
                    &input.prefix,
                    &input.delimiter,
                    max_keys,
                )
                .await?
        } else {
            self.meta
                .list_latest_objects(
                    bucket_name,
                    &input.marker,
                    &input.prefix,
                    &input.delimiter,
                    max_keys,
                )
                .await?
        };
        Ok(listing)
    }

    /// List every object version of a bucket, delete markers included,
    /// newest first within each key.
    pub async fn list_object_versions(
        &self,
        credential: &Credential,
        bucket_name: &str,
        input: &ListVersionsInput,
    ) -> EngineResult<VersionedListing> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;

        Ok(self
            .meta
            .list_versioned_objects(
                bucket_name,
                &input.key_marker,
                &input.version_id_marker,
                &input.prefix,
                &input.delimiter,
                clamp_max_keys(input.max_keys),
            )
            .await?)
    }
}
