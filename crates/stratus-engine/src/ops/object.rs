//! The object read/write/delete paths.
//!
//! `put_object` is the canonical write flow: resolve and authorize, select a
//! backend, prepare encryption, stream through the lazy pipeline, verify
//! digests, commit metadata in one transaction, and recycle whatever the
//! write superseded. Every failure after the backend allocated a blob
//! enqueues that blob for recycle before returning.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::encryption::{
    encryption_keys_from_sse_request, new_initialization_vector, resolve_read_key, SseRequest,
};
use crate::error::{EngineError, EngineResult};
use crate::gateway::StorageGateway;
use crate::ops::multipart::MAX_PART_SIZE;
use crate::stream::{CtrCipherReader, StreamVerifier};
use stratus_auth::acl::check_bucket_access;
use stratus_auth::Credential;
use stratus_meta::types::{
    derive_version_id, parse_wire_version_id, version_for, wire_version_id, Acl, Object,
    ObjectType, Permission, SseType, StorageClass, VersioningStatus, NULL_VERSION_ID,
};
use stratus_meta::MetaError;

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// A single-part PUT.
pub struct PutObjectInput {
    /// Target bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Declared content length.
    pub size: u64,
    /// The request body.
    pub body: Box<dyn AsyncRead + Send + Unpin>,
    /// Client-supplied `Content-MD5` (hex), verified against the stream.
    pub content_md5: Option<String>,
    /// MIME type.
    pub content_type: Option<String>,
    /// User metadata headers.
    pub custom_attributes: HashMap<String, String>,
    /// Object ACL.
    pub acl: Acl,
    /// Encryption request.
    pub sse: SseRequest,
    /// Storage class.
    pub storage_class: StorageClass,
    /// Refuse to overwrite an existing key (non-versioned buckets only).
    pub forbid_overwrite: bool,
    /// Final verification hook for streaming-signed bodies.
    pub verifier: Option<Box<dyn StreamVerifier>>,
}

impl PutObjectInput {
    /// A PUT with default metadata.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        size: u64,
        body: Box<dyn AsyncRead + Send + Unpin>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
            body,
            content_md5: None,
            content_type: None,
            custom_attributes: HashMap::new(),
            acl: Acl::default(),
            sse: SseRequest::none(),
            storage_class: StorageClass::Standard,
            forbid_overwrite: false,
            verifier: None,
        }
    }
}

/// Result of a PUT.
#[derive(Debug, Clone)]
pub struct PutObjectOutput {
    /// Hex MD5 of the stored plaintext.
    pub etag: String,
    /// Wire version id for versioned writes; `None` for the null slot.
    pub version_id: Option<String>,
    /// When the object was written.
    pub last_modified: DateTime<Utc>,
    /// The encryption variant applied.
    pub sse_type: SseType,
}

/// A GET.
pub struct GetObjectInput {
    /// Target bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Wire version id (`"null"` or decimal); `None` resolves the latest.
    pub version: Option<String>,
    /// Byte range `(offset, length)`; a negative length reads to the end.
    pub range: Option<(u64, i64)>,
    /// SSE-C key material, required to read SSE-C objects.
    pub sse: SseRequest,
}

impl GetObjectInput {
    /// A whole-object latest-version GET.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version: None,
            range: None,
            sse: SseRequest::none(),
        }
    }
}

/// Result of a GET: the resolved row and a decrypted body reader.
pub struct GetObjectOutput {
    /// The resolved object row.
    pub object: Object,
    /// Plaintext body reader for the requested range.
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("object", &self.object)
            .field("body", &"<body>")
            .finish()
    }
}

/// Result of a DELETE.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectOutput {
    /// Wire version id of the affected row or created delete marker.
    pub version_id: Option<String>,
    /// Whether a delete marker now hides the key.
    pub delete_marker: bool,
}

/// A zero-size tombstone row. `null_slot` puts it at version 0 instead of a
/// fresh derived version.
fn make_delete_marker(owner_id: &str, bucket_name: &str, key: &str, null_slot: bool) -> Object {
    let now = Utc::now();
    let create_time = now.timestamp_nanos_opt().unwrap_or_default() as u64;
    let version_id = if null_slot {
        NULL_VERSION_ID
    } else {
        derive_version_id(create_time)
    };
    Object {
        bucket_name: bucket_name.to_owned(),
        name: key.to_owned(),
        version_id,
        null_version: null_slot,
        delete_marker: true,
        owner_id: owner_id.to_owned(),
        location: String::new(),
        pool: String::new(),
        object_id: String::new(),
        size: 0,
        etag: String::new(),
        content_type: String::new(),
        custom_attributes: HashMap::new(),
        acl: Acl::default(),
        sse_type: SseType::None,
        encryption_key: Vec::new(),
        initialization_vector: Vec::new(),
        object_type: ObjectType::Normal,
        storage_class: StorageClass::Standard,
        create_time,
        last_modified: now,
        parts: BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl StorageGateway {
    /// Store an object.
    pub async fn put_object(
        &self,
        credential: &Credential,
        input: PutObjectInput,
    ) -> EngineResult<PutObjectOutput> {
        let bucket = self.meta.get_bucket(&input.bucket, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;

        if input.size > MAX_PART_SIZE {
            return Err(EngineError::EntityTooLarge);
        }

        let existing = match self
            .meta
            .get_latest_object_version(&input.bucket, &input.key)
            .await
        {
            Ok(o) => Some(o),
            Err(MetaError::NoSuchKey { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        if input.forbid_overwrite
            && bucket.versioning == VersioningStatus::Disabled
            && existing.is_some()
        {
            return Err(EngineError::ForbiddenOverwriteKey);
        }

        let (cluster, pool) = self.clusters.pick(input.storage_class, input.size as i64)?;

        let (data_key, sealed_key) =
            encryption_keys_from_sse_request(&self.config.master_key, &input.sse)?;
        let iv = if data_key.is_empty() {
            Vec::new()
        } else {
            new_initialization_vector()
        };

        let (object_id, bytes_written, calculated_md5) = self
            .stream_to_backend(&cluster, pool, input.body, input.size, &data_key, &iv)
            .await?;

        if bytes_written < input.size {
            self.recycle_blob(&cluster, pool, object_id);
            return Err(EngineError::IncompleteBody);
        }
        if let Some(expected) = &input.content_md5 {
            if expected != &calculated_md5 {
                self.recycle_blob(&cluster, pool, object_id);
                return Err(EngineError::BadDigest);
            }
        }
        if let Some(verifier) = &input.verifier {
            if let Err(e) = verifier.verify() {
                self.recycle_blob(&cluster, pool, object_id);
                return Err(e.into());
            }
        }

        let now = Utc::now();
        let create_time = now.timestamp_nanos_opt().unwrap_or_default() as u64;
        let version_id = version_for(bucket.versioning, create_time);
        let object = Object {
            bucket_name: input.bucket.clone(),
            name: input.key.clone(),
            version_id,
            null_version: bucket.versioning != VersioningStatus::Enabled,
            delete_marker: false,
            owner_id: bucket.owner_id.clone(),
            location: cluster.id().to_owned(),
            pool: pool.to_owned(),
            object_id: object_id.clone(),
            size: input.size,
            etag: calculated_md5.clone(),
            content_type: input
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_owned()),
            custom_attributes: input.custom_attributes.clone(),
            acl: input.acl.clone(),
            sse_type: input.sse.sse_type,
            encryption_key: sealed_key,
            initialization_vector: iv,
            object_type: ObjectType::Normal,
            storage_class: input.storage_class,
            create_time,
            last_modified: now,
            parts: BTreeMap::new(),
        };

        if let Err(e) = self
            .meta
            .put_object(&object, None, self.config.piggyback_usage)
            .await
        {
            self.recycle_blob(&cluster, pool, object_id);
            return Err(e.into());
        }

        // A write to the null slot supersedes the previous null version.
        if bucket.versioning != VersioningStatus::Enabled {
            if let Some(old) = existing {
                if old.is_null_version() && !old.delete_marker {
                    let gateway = self.clone();
                    tokio::spawn(async move { gateway.remove_old_object(&old).await });
                }
            }
        }

        debug!(
            bucket = %input.bucket,
            key = %input.key,
            version = version_id,
            size = input.size,
            "put_object committed"
        );

        Ok(PutObjectOutput {
            etag: calculated_md5,
            version_id: (version_id != NULL_VERSION_ID).then(|| wire_version_id(version_id)),
            last_modified: now,
            sse_type: input.sse.sse_type,
        })
    }

    /// Read an object, resolving the version through the version resolver.
    pub async fn get_object(
        &self,
        credential: &Credential,
        input: GetObjectInput,
    ) -> EngineResult<GetObjectOutput> {
        let bucket = self.meta.get_bucket(&input.bucket, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;

        let object = match &input.version {
            None => {
                self.meta
                    .get_latest_object_version(&input.bucket, &input.key)
                    .await?
            }
            Some(v) => {
                let version =
                    parse_wire_version_id(v).ok_or_else(|| EngineError::InvalidArgument {
                        message: format!("invalid version id: {v}"),
                    })?;
                (*self
                    .meta
                    .get_object(&input.bucket, &input.key, version, true)
                    .await?)
                    .clone()
            }
        };
        if object.delete_marker {
            return Err(MetaError::NoSuchKey {
                key: input.key.clone(),
            }
            .into());
        }

        let (offset, length) = input.range.unwrap_or((0, -1));
        if offset > object.size || (length >= 0 && offset + length as u64 > object.size) {
            return Err(EngineError::InvalidRange);
        }

        let data_key = resolve_read_key(
            &self.config.master_key,
            object.sse_type,
            &object.encryption_key,
            &input.sse,
        )?;
        let body = self
            .open_object_reader(&object, &data_key, offset, length)
            .await?;

        Ok(GetObjectOutput { object, body })
    }

    /// Delete an object (or one version of it) under the bucket's versioning
    /// rules.
    pub async fn delete_object(
        &self,
        credential: &Credential,
        bucket_name: &str,
        key: &str,
        version: Option<&str>,
    ) -> EngineResult<DeleteObjectOutput> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;

        // Explicit version delete removes exactly that row.
        if let Some(v) = version {
            let vid = parse_wire_version_id(v).ok_or_else(|| EngineError::InvalidArgument {
                message: format!("invalid version id: {v}"),
            })?;
            let object = match self.meta.get_object(bucket_name, key, vid, false).await {
                Ok(o) => (*o).clone(),
                Err(MetaError::NoSuchKey { .. }) => return Ok(DeleteObjectOutput::default()),
                Err(e) => return Err(e.into()),
            };
            self.delete_object_row(&object).await?;
            return Ok(DeleteObjectOutput {
                version_id: Some(object.wire_version_id()),
                delete_marker: object.delete_marker,
            });
        }

        match bucket.versioning {
            VersioningStatus::Disabled => {
                let object = match self
                    .meta
                    .get_object(bucket_name, key, NULL_VERSION_ID, false)
                    .await
                {
                    Ok(o) => (*o).clone(),
                    // Deleting a missing key is a no-op.
                    Err(MetaError::NoSuchKey { .. }) => return Ok(DeleteObjectOutput::default()),
                    Err(e) => return Err(e.into()),
                };
                self.delete_object_row(&object).await?;
                Ok(DeleteObjectOutput::default())
            }
            VersioningStatus::Enabled => {
                let marker = make_delete_marker(&bucket.owner_id, bucket_name, key, false);
                self.meta.put_object(&marker, None, false).await?;
                Ok(DeleteObjectOutput {
                    version_id: Some(marker.wire_version_id()),
                    delete_marker: true,
                })
            }
            VersioningStatus::Suspended => {
                // The delete marker takes over the null slot; whatever null
                // version was there is torn down.
                let old = match self
                    .meta
                    .get_object(bucket_name, key, NULL_VERSION_ID, false)
                    .await
                {
                    Ok(o) => Some((*o).clone()),
                    Err(MetaError::NoSuchKey { .. }) => None,
                    Err(e) => return Err(e.into()),
                };

                let marker = make_delete_marker(&bucket.owner_id, bucket_name, key, true);
                let mut tx = stratus_meta::client::Transaction::new();
                self.meta
                    .update_object(&marker, None, false, Some(&mut tx))
                    .await?;
                if let Some(old) = &old {
                    if !old.delete_marker {
                        self.meta.delete_object_parts(old, Some(&mut tx)).await?;
                        if self.config.piggyback_usage {
                            self.meta
                                .update_usage(bucket_name, -(old.size as i64), Some(&mut tx))
                                .await?;
                        }
                    }
                }
                self.meta.commit(tx).await?;
                self.meta.invalidate_object(bucket_name, key, NULL_VERSION_ID);
                if let Some(old) = old {
                    if !old.delete_marker {
                        self.recycle.enqueue_object(&old);
                    }
                }
                Ok(DeleteObjectOutput {
                    version_id: Some(marker.wire_version_id()),
                    delete_marker: true,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Remove one object row: delete the row and its parts, give back usage,
    /// recycle its blobs.
    async fn delete_object_row(&self, object: &Object) -> EngineResult<()> {
        let mut tx = stratus_meta::client::Transaction::new();
        self.meta.delete_object(object, Some(&mut tx)).await?;
        if !object.delete_marker && self.config.piggyback_usage {
            self.meta
                .update_usage(&object.bucket_name, -(object.size as i64), Some(&mut tx))
                .await?;
        }
        self.meta.commit(tx).await?;
        if !object.delete_marker {
            self.recycle.enqueue_object(object);
        }
        Ok(())
    }

    /// Open a plaintext reader over `[offset, offset+length)` of an object,
    /// chaining and seek-decrypting part blobs as needed.
    pub(crate) async fn open_object_reader(
        &self,
        object: &Object,
        data_key: &[u8],
        offset: u64,
        length: i64,
    ) -> EngineResult<Box<dyn AsyncRead + Send + Unpin>> {
        let cluster = self.clusters.get(&object.location)?;
        let end = if length < 0 {
            object.size
        } else {
            (offset + length as u64).min(object.size)
        };

        if object.object_type == ObjectType::Multipart {
            let mut out: Box<dyn AsyncRead + Send + Unpin> = Box::new(tokio::io::empty());
            for part in object.parts.values() {
                let part_start = part.offset;
                let part_end = part.offset + part.size;
                if part_end <= offset || part_start >= end {
                    continue;
                }
                let within_start = offset.max(part_start) - part_start;
                let within_len = end.min(part_end) - offset.max(part_start);
                let raw = cluster
                    .get(&object.pool, &part.object_id, within_start, within_len as i64)
                    .await?;
                let piece: Box<dyn AsyncRead + Send + Unpin> = if data_key.is_empty() {
                    raw
                } else {
                    Box::new(CtrCipherReader::with_offset(
                        raw,
                        data_key,
                        &part.initialization_vector,
                        within_start,
                    )?)
                };
                out = Box::new(out.chain(piece));
            }
            Ok(out)
        } else {
            let read_len = if length < 0 { -1 } else { (end - offset) as i64 };
            let raw = cluster
                .get(&object.pool, &object.object_id, offset, read_len)
                .await?;
            if data_key.is_empty() {
                Ok(raw)
            } else {
                Ok(Box::new(CtrCipherReader::with_offset(
                    raw,
                    data_key,
                    &object.initialization_vector,
                    offset,
                )?))
            }
        }
    }
}
