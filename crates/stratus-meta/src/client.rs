//! The transactional metadata capability.
//!
//! [`MetaClient`] is the driver boundary: every relational backend (or the
//! in-memory reference client) implements it. Mutating operations either open
//! and commit their own transaction or, when handed `Some(&mut Transaction)`,
//! append their mutations to the caller's transaction, which the caller
//! commits with [`MetaClient::commit`]. Transaction participation is always
//! explicit, never ambient.

use async_trait::async_trait;

use crate::error::MetaResult;
use crate::types::{Bucket, Freezer, Multipart, Object, Part};

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A single staged row mutation.
///
/// Mutations are the unit a [`Transaction`] accumulates; [`MetaClient::commit`]
/// applies all of them atomically or none.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert or replace a bucket row.
    PutBucket(Bucket),
    /// Delete a bucket row.
    DeleteBucket {
        /// The bucket name.
        name: String,
    },
    /// Add a signed delta to a bucket's usage counter.
    AddUsage {
        /// The bucket name.
        bucket: String,
        /// Bytes to add (may be negative).
        delta: i64,
    },
    /// Insert or replace an object row (parts are staged separately).
    PutObject(Object),
    /// Delete an object row.
    DeleteObject {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        name: String,
        /// The version id.
        version: u64,
    },
    /// Insert or replace a part row.
    PutPart {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        object: String,
        /// The part version the row is keyed under.
        part_version: u64,
        /// The part row.
        part: Part,
    },
    /// Delete every part row under a part version.
    DeleteParts {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        object: String,
        /// The part version.
        part_version: u64,
    },
    /// Insert or replace a multipart row.
    PutMultipart(Multipart),
    /// Replace one in-flight part inside a multipart row.
    PutMultipartPart {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        object: String,
        /// The upload id.
        upload_id: String,
        /// The part row.
        part: Part,
    },
    /// Delete a multipart row.
    DeleteMultipart {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        object: String,
        /// The upload id.
        upload_id: String,
    },
    /// Insert a `(user, bucket)` index row.
    PutUserBucket {
        /// The owning user.
        user_id: String,
        /// The bucket name.
        bucket: String,
    },
    /// Delete a `(user, bucket)` index row.
    DeleteUserBucket {
        /// The owning user.
        user_id: String,
        /// The bucket name.
        bucket: String,
    },
    /// Delete a bucket's lifecycle row.
    DeleteLifecycle {
        /// The bucket name.
        bucket: String,
    },
    /// Delete a freezer (pending restore) row.
    DeleteFreezer {
        /// The owning bucket.
        bucket: String,
        /// The object key.
        name: String,
        /// The object version.
        version: u64,
    },
}

/// An explicit transaction: an ordered accumulation of mutations.
#[derive(Debug, Default)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    /// Start an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Number of staged mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Consume the transaction, yielding its mutations in order.
    #[must_use]
    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

// ---------------------------------------------------------------------------
// Listing results
// ---------------------------------------------------------------------------

/// Result of an unversioned or latest-only object listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// Matched objects, in key order.
    pub objects: Vec<Object>,
    /// Common prefixes folded by the delimiter, in first-seen order.
    pub common_prefixes: Vec<String>,
    /// Whether a further page exists.
    pub is_truncated: bool,
    /// Marker for the next page (last emitted key or prefix).
    pub next_marker: Option<String>,
}

/// Result of a versioned object listing.
#[derive(Debug, Clone, Default)]
pub struct VersionedListing {
    /// Matched versions (objects and delete markers) in `(key, version)` order.
    pub objects: Vec<Object>,
    /// Common prefixes folded by the delimiter, in first-seen order.
    pub common_prefixes: Vec<String>,
    /// Whether a further page exists.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page (`"null"` for the null version).
    pub next_version_id_marker: Option<String>,
}

/// Result of a multipart-upload listing.
#[derive(Debug, Clone, Default)]
pub struct UploadListing {
    /// Matched uploads, ordered by `(key, upload_id)`.
    pub uploads: Vec<Multipart>,
    /// Common prefixes folded by the delimiter, in first-seen order.
    pub common_prefixes: Vec<String>,
    /// Whether a further page exists.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Upload-id marker for the next page.
    pub next_upload_id_marker: Option<String>,
}

// ---------------------------------------------------------------------------
// MetaClient
// ---------------------------------------------------------------------------

/// The transactional metadata capability consumed by the object engine.
#[async_trait]
pub trait MetaClient: Send + Sync {
    // -- buckets --

    /// Fetch a bucket row by name.
    async fn get_bucket(&self, name: &str) -> MetaResult<Bucket>;

    /// Fetch every bucket row.
    async fn list_buckets(&self) -> MetaResult<Vec<Bucket>>;

    /// Fetch the bucket names owned by a user, from the user index.
    async fn list_user_buckets(&self, user_id: &str) -> MetaResult<Vec<String>>;

    /// Insert a new bucket row and its `(user, bucket)` index row atomically.
    async fn put_new_bucket(&self, bucket: Bucket) -> MetaResult<()>;

    /// Idempotent create: insert the bucket (and index row) only if absent.
    /// Returns whether a row was created.
    async fn check_and_put_bucket(&self, bucket: Bucket) -> MetaResult<bool>;

    /// Update an existing bucket row.
    async fn put_bucket(&self, bucket: Bucket) -> MetaResult<()>;

    /// Delete the bucket row, its user-index row, and its lifecycle row
    /// atomically.
    async fn delete_bucket(&self, bucket: &Bucket) -> MetaResult<()>;

    /// Add a signed delta to the bucket's usage counter, joining the caller's
    /// transaction when given one.
    async fn update_usage(
        &self,
        bucket: &str,
        delta: i64,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()>;

    // -- objects --

    /// Fetch one object row by exact version. Multipart rows come back with
    /// their parts materialized.
    async fn get_object(&self, bucket: &str, name: &str, version: u64) -> MetaResult<Object>;

    /// Resolve the latest visible version for a key: the null row and the
    /// smallest positive version are compared by `last_modified`, larger wins,
    /// ties go to the versioned row.
    async fn get_latest_object_version(&self, bucket: &str, name: &str) -> MetaResult<Object>;

    /// Insert an object row, its part rows, optionally consume a multipart
    /// row, and optionally add the object size to usage, all in one
    /// transaction.
    async fn put_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
    ) -> MetaResult<()>;

    /// Same as [`MetaClient::put_object`] but as an update, optionally joining
    /// the caller's transaction.
    async fn update_object(
        &self,
        object: &Object,
        multipart: Option<&Multipart>,
        update_usage: bool,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()>;

    /// Delete an object row, cascading to its part rows.
    async fn delete_object(&self, object: &Object, tx: Option<&mut Transaction>) -> MetaResult<()>;

    /// Delete only the part rows belonging to an object.
    async fn delete_object_parts(
        &self,
        object: &Object,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<()>;

    /// Unversioned listing: one row per key, delete markers skipped.
    async fn list_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing>;

    /// Latest-only listing over a versioned bucket.
    async fn list_latest_objects(
        &self,
        bucket: &str,
        marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<ObjectListing>;

    /// Full version listing, interleaving the null version by creation time.
    async fn list_versioned_objects(
        &self,
        bucket: &str,
        key_marker: &str,
        version_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> MetaResult<VersionedListing>;

    /// Whether the bucket holds no versions, no null version, and no
    /// in-flight multipart uploads.
    async fn is_empty_bucket(&self, bucket: &Bucket) -> MetaResult<bool>;

    // -- multipart --

    /// Insert a multipart row.
    async fn create_multipart(&self, multipart: Multipart) -> MetaResult<()>;

    /// Fetch a multipart row.
    async fn get_multipart(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> MetaResult<Multipart>;

    /// Record an uploaded part on the multipart row, returning the signed
    /// size delta against any part it replaced.
    async fn put_object_part(&self, multipart: &Multipart, part: Part) -> MetaResult<i64>;

    /// Delete a multipart row, returning the total size of its recorded
    /// parts.
    async fn delete_multipart(
        &self,
        multipart: &Multipart,
        tx: Option<&mut Transaction>,
    ) -> MetaResult<i64>;

    /// List in-flight uploads for a bucket.
    async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key_marker: &str,
        upload_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_uploads: usize,
    ) -> MetaResult<UploadListing>;

    // -- freezer --

    /// Fetch the pending-restore entry for an object version.
    async fn get_freezer(&self, bucket: &str, name: &str, version: u64) -> MetaResult<Freezer>;

    /// Delete a pending-restore entry.
    async fn delete_freezer(&self, freezer: &Freezer) -> MetaResult<()>;

    // -- transactions --

    /// Commit an accumulated transaction atomically.
    async fn commit(&self, tx: Transaction) -> MetaResult<()>;
}
