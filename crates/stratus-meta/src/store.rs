//! The metadata store façade: a [`MetaClient`] fronted by the hot cache.
//!
//! Reads go through the cache; every mutation invalidates the affected
//! entries before the call returns. Freshness-critical reads (`usage`,
//! bucket info) refresh by removing the entry first.

use std::sync::Arc;

use crate::cache::{CacheTable, HotCache};
use crate::client::{MetaClient, ObjectListing, Transaction, UploadListing, VersionedListing};
use crate::error::MetaResult;
use crate::types::{Bucket, Freezer, Multipart, Object, Part};

/// Cache key for an object row.
fn object_cache_key(bucket: &str, name: &str, version: u64) -> String {
    format!("{bucket}:{name}:{version}")
}

/// Metadata store: transactional client plus hot cache.
pub struct MetaStore {
    client: Arc<dyn MetaClient>,
    cache: HotCache,
}

impl std::fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStore")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl MetaStore {
    /// Build a store over a metadata client.
    #[must_use]
    pub fn new(client: Arc<dyn MetaClient>) -> Self {
        Self {
            client,
            cache: HotCache::new(),
        }
    }

    /// The underlying client, for operations that compose transactions.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn MetaClient> {
        &self.client
    }

    // -- buckets --

    /// Fetch a bucket through the cache.
    ///
    /// The `usage` field of a cached bucket may lag; use
    /// [`MetaStore::get_usage`] for an accurate reading.
    pub async fn get_bucket(&self, name: &str, will_need: bool) -> MetaResult<Arc<Bucket>> {
        self.cache
            .get(CacheTable::Bucket, name, will_need, || {
                self.client.get_bucket(name)
            })
            .await
    }

    /// Fetch a bucket bypassing any cached copy.
    pub async fn get_bucket_info(&self, name: &str) -> MetaResult<Arc<Bucket>> {
        self.cache.remove(CacheTable::Bucket, name);
        self.get_bucket(name, true).await
    }

    /// Accurate usage reading for a bucket.
    pub async fn get_usage(&self, name: &str) -> MetaResult<i64> {
        Ok(self.get_bucket_info(name).await?.usage)
    }

    /// Every bucket row.
    pub async fn list_buckets(&self) -> MetaResult<Vec<Bucket>> {
        self.client.list_buckets().await
    }

    /// Bucket names owned by a user.
    pub async fn list_user_buckets(&self, user_id: &str) -> MetaResult<Vec<String>> {
        self.cache.remove(CacheTable::User, user_id);
        self.client.list_user_buckets(user_id).await
    }

    /// Insert a new bucket row and its user-index row.
    pub async fn put_new_bucket(&self, bucket: Bucket) -> MetaResult<()> {
        let name = bucket.name.clone();
        let owner = bucket.owner_id.clone();
        self.client.put_new_bucket(bucket).await?;
        self.cache.remove(CacheTable::Bucket, &name);
        self.cache.remove(CacheTable::User, &owner);
        Ok(())
    }

    /// Idempotent bucket create.
    pub async fn check_and_put_bucket(&self, bucket: Bucket) -> MetaResult<bool> {
        let name = bucket.name.clone();
        let owner = bucket.owner_id.clone();
        let created = self.client.check_and_put_bucket(bucket).await?;
        self.cache.remove(CacheTable::Bucket, &name);
        self.cache.remove(CacheTable::User, &owner);
        Ok(created)
    }

    /// Update a bucket row.
    pub async fn put_bucket(&self, bucket: Bucket) -> MetaResult<()> {
        let name = bucket.name.clone();
        self.client.put_bucket(bucket).await?;
        self.cache.remove(CacheTable::Bucket, &name);
        Ok(())
    }

    /// Delete a bucket row and its index rows.
    pub async fn delete_bucket(&self, bucket: &Bucket) -> MetaResult<()> {
        self.client.delete_bucket(bucket).await?;
        self.cache.remove(CacheTable::Bucket, &bucket.name);
        self.cache.remove(CacheTable::User, &bucket.owner_id);
        Ok(())
    }

    /// Add a usage delta, joining the caller's transaction when given one.
    pub async fn update_usage(
        &self,
        bucket: &str,
        delta: i64,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        self.client.update_usage(bucket, delta, tx).await?;
        self.cache.remove(CacheTable::Bucket, bucket);
        Ok(())
    }

    // -- objects --

    /// Fetch one object row by exact version, through the cache.
    pub async fn get_object(
        &self,
        bucket: &str,
        name: &str,
        version: u64,
        will_need: bool,
    ) -> MetaResult<Arc<Object>> {
        let key = object_cache_key(bucket, name, version);
        self.cache
            .get(CacheTable::Object, &key, will_need, || {
                self.client.get_object(bucket, name, version)
            })
            .await
    }

    /// Resolve the latest visible version for a key. Uncached: the answer
    /// depends on two rows.
    pub async fn get_latest_object_version(&self, bucket: &str, name: &str) -> MetaResult<Object> {
        self.client.get_latest_object_version(bucket, name).await
    }

    /// Insert an object row (and parts, multipart consumption, usage) in one
    /// transaction, then invalidate.
    pub async fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> MetaResult<()> {
        self.client.put_object(object, multipart, update_usage).await?;
        self.invalidate_object(&object.bucket_name, &object.name, object.version_id);
        Ok(())
    }

    /// Update an object row, optionally inside the caller's transaction.
    pub async fn update_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        self.client
            .update_object(object, multipart, update_usage, tx)
            .await?;
        self.invalidate_object(&object.bucket_name, &object.name, object.version_id);
        Ok(())
    }

    /// Delete an object row and its part rows.
    pub async fn delete_object(
        &self,
        object: &Object,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        self.client.delete_object(object, tx).await?;
        self.invalidate_object(&object.bucket_name, &object.name, object.version_id);
        Ok(())
    }

    /// Delete only an object's part rows.
    pub async fn delete_object_parts(
        &self,
        object: &Object,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()> {
        self.client.delete_object_parts(object, tx).await?;
        self.invalidate_object(&object.bucket_name, &object.name, object.version_id);
        Ok(())
    }

    /// Drop the cached copy of one object row and the owning bucket.
    pub fn invalidate_object(&self, bucket: &str, name: &str, version: u64) {
        self.cache
            .remove(CacheTable::Object, &object_cache_key(bucket, name, version));
        self.cache.remove(CacheTable::Bucket, bucket);
    }

    // -- listings --

    /// Unversioned listing.
    pub async fn list_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing> {
        self.client
            .list_objects(bucket, marker, prefix, delimiter, max_keys)
            .await
    }

    /// Latest-only listing over a versioned bucket.
    pub async fn list_latest_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing> {
        self.client
            .list_latest_objects(bucket, marker, prefix, delimiter, max_keys)
            .await
    }

    /// Full version listing.
    pub async fn list_versioned_objects(
        &self,
        bucket: &str,
        key_marker: &str,
        version_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<VersionedListing> {
        self.client
            .list_versioned_objects(bucket, key_marker, version_id_marker, prefix, delimiter, max_keys)
            .await
    }

    /// Whether the bucket is empty of versions and in-flight uploads.
    pub async fn is_empty_bucket(&self, bucket: &Bucket) -> MetaResult<bool> {
        self.client.is_empty_bucket(bucket).await
    }

    // -- multipart --

    /// Insert a multipart row.
    pub async fn create_multipart(&self, multipart: Multipart) -> MetaResult<()> {
        self.client.create_multipart(multipart).await
    }

    /// Fetch a multipart row.
    pub async fn get_multipart(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> MetaResult<Multipart> {
        self.client.get_multipart(bucket, object, upload_id).await
    }

    /// Record an uploaded part, returning the size delta.
    pub async fn put_object_part(&self, multipart: &Multipart, part: Part) -> MetaResult<i64> {
        self.client.put_object_part(multipart, part).await
    }

    /// Delete a multipart row, returning the recorded size.
    pub async fn delete_multipart(
        &self,
        multipart: &Multipart,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<i64> {
        self.client.delete_multipart(multipart, tx).await
    }

    /// List in-flight uploads.
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: &str,
        upload_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_uploads: usize,
    ) -> MetaResult<UploadListing> {
        self.client
            .list_multipart_uploads(bucket, key_marker, upload_id_marker, prefix, delimiter, max_uploads)
            .await
    }

    // -- freezer --

    /// Fetch a pending-restore entry.
    pub async fn get_freezer(&self, bucket: &str, name: &str, version: u64) -> MetaResult<Freezer> {
        self.client.get_freezer(bucket, name, version).await
    }

    /// Delete a pending-restore entry.
    pub async fn delete_freezer(&self, freezer: &Freezer) -> MetaResult<()> {
        self.client.delete_freezer(freezer).await
    }

    // -- transactions --

    /// Commit an accumulated transaction.
    pub async fn commit(&self, tx: Transaction) -> MetaResult<()> {
        self.client.commit(tx).await
    }
}
