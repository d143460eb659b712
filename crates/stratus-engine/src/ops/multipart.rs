//! The multipart engine: create, put-part, copy-part, list, abort, complete.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use digest::Digest;
use md5::Md5;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::encryption::{
    encryption_keys_from_sse_request, new_initialization_vector, resolve_part_key, SseRequest,
};
use crate::error::{EngineError, EngineResult};
use crate::gateway::StorageGateway;
use crate::ops::object::GetObjectInput;
use crate::recycle::RecycleEntry;
use crate::stream::StreamVerifier;
use stratus_auth::acl::check_bucket_access;
use stratus_auth::Credential;
use stratus_meta::client::UploadListing;
use stratus_meta::types::{
    version_for, wire_version_id, Acl, Multipart, MultipartMetadata, Object, ObjectType, Part,
    Permission, SseType, StorageClass, VersioningStatus, NULL_VERSION_ID,
};
use stratus_meta::MetaError;

/// Minimum size of every part but the last.
pub const MIN_PART_SIZE: u64 = 100 << 10;

/// Maximum size of a single part (and of a single-part PUT).
pub const MAX_PART_SIZE: u64 = 5 << 30;

/// Highest acceptable part number.
pub const MAX_PART_NUMBER: u32 = 10_000;

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// A `CreateMultipartUpload`.
pub struct CreateMultipartInput {
    /// Target bucket.
    pub bucket: String,
    /// Object key the upload will create.
    pub key: String,
    /// MIME type of the final object.
    pub content_type: Option<String>,
    /// User metadata headers.
    pub custom_attributes: HashMap<String, String>,
    /// ACL of the final object.
    pub acl: Acl,
    /// Encryption request, fixed for the whole upload.
    pub sse: SseRequest,
    /// Storage class of the final object.
    pub storage_class: StorageClass,
    /// Refuse to overwrite an existing key (non-versioned buckets only).
    pub forbid_overwrite: bool,
}

impl CreateMultipartInput {
    /// An upload with default metadata.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            custom_attributes: HashMap::new(),
            acl: Acl::default(),
            sse: SseRequest::none(),
            storage_class: StorageClass::Standard,
            forbid_overwrite: false,
        }
    }
}

/// An `UploadPart`.
pub struct UploadPartInput {
    /// Target bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// The upload the part belongs to.
    pub upload_id: String,
    /// Part number, 1-based.
    pub part_number: u32,
    /// Declared part length.
    pub size: u64,
    /// The part body.
    pub body: Box<dyn AsyncRead + Send + Unpin>,
    /// Client-supplied `Content-MD5` (hex).
    pub content_md5: Option<String>,
    /// Per-part SSE headers; must match the upload's declared type.
    pub sse: SseRequest,
    /// Final verification hook for streaming-signed bodies.
    pub verifier: Option<Box<dyn StreamVerifier>>,
}

impl UploadPartInput {
    /// A part upload with default headers.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
        part_number: u32,
        size: u64,
        body: Box<dyn AsyncRead + Send + Unpin>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            part_number,
            size,
            body,
            content_md5: None,
            sse: SseRequest::none(),
            verifier: None,
        }
    }
}

/// Result of an `UploadPart` or `UploadPartCopy`.
#[derive(Debug, Clone)]
pub struct UploadPartOutput {
    /// Hex MD5 of the part plaintext.
    pub etag: String,
    /// The encryption variant applied.
    pub sse_type: SseType,
}

/// An `UploadPartCopy`.
pub struct CopyPartInput {
    /// Target bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// The upload the part belongs to.
    pub upload_id: String,
    /// Part number, 1-based.
    pub part_number: u32,
    /// Source bucket.
    pub source_bucket: String,
    /// Source key.
    pub source_key: String,
    /// Source wire version id; `None` resolves the latest.
    pub source_version: Option<String>,
    /// Per-part SSE headers for the destination upload.
    pub sse: SseRequest,
    /// SSE-C key material for reading the source.
    pub source_sse: SseRequest,
}

/// One entry of a `CompleteMultipartUpload` request.
#[derive(Debug, Clone)]
pub struct CompletedPart {
    /// The part number the client uploaded.
    pub part_number: u32,
    /// The ETag the client observed for it.
    pub etag: String,
}

/// Result of a `CompleteMultipartUpload`.
#[derive(Debug, Clone)]
pub struct CompleteMultipartOutput {
    /// Composite ETag: `hex(md5(concat(part digests)))-N`.
    pub etag: String,
    /// Wire version id for versioned writes; `None` for the null slot.
    pub version_id: Option<String>,
    /// Final object size.
    pub size: u64,
    /// Creation time, nanoseconds since the Unix epoch.
    pub create_time: u64,
}

/// Result of a `ListParts`.
#[derive(Debug, Clone)]
pub struct ListPartsOutput {
    /// The parts page.
    pub parts: Vec<Part>,
    /// Whether a further page exists.
    pub is_truncated: bool,
    /// Marker for the next page.
    pub next_part_number_marker: Option<u32>,
    /// The upload's storage class.
    pub storage_class: StorageClass,
}

/// Strip surrounding double quotes from a client-supplied ETag.
fn normalize_etag(etag: &str) -> &str {
    etag.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(etag)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl StorageGateway {
    /// Start a multipart upload. Placement and encryption state are fixed
    /// here and shared by every part.
    pub async fn create_multipart_upload(
        &self,
        credential: &Credential,
        input: CreateMultipartInput,
    ) -> EngineResult<String> {
        let bucket = self.meta.get_bucket(&input.bucket, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;

        if bucket.versioning == VersioningStatus::Disabled && input.forbid_overwrite {
            match self
                .meta
                .get_latest_object_version(&input.bucket, &input.key)
                .await
            {
                Ok(_) => return Err(EngineError::ForbiddenOverwriteKey),
                Err(MetaError::NoSuchKey { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let (cluster, pool) = self.clusters.pick(input.storage_class, -1)?;
        let (data_key, sealed_key) =
            encryption_keys_from_sse_request(&self.config.master_key, &input.sse)?;

        let metadata = MultipartMetadata {
            initiator_id: bucket.owner_id.clone(),
            owner_id: bucket.owner_id.clone(),
            content_type: input
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_owned()),
            location: cluster.id().to_owned(),
            pool: pool.to_owned(),
            acl: input.acl,
            sse_type: input.sse.sse_type,
            data_key,
            sealed_key,
            custom_attributes: input.custom_attributes,
            storage_class: input.storage_class,
        };
        let multipart = Multipart::new(&input.bucket, &input.key, metadata);
        let upload_id = multipart.upload_id.clone();
        self.meta.create_multipart(multipart).await?;

        debug!(bucket = %input.bucket, key = %input.key, upload_id = %upload_id, "multipart created");
        Ok(upload_id)
    }

    /// Upload one part through the canonical write flow.
    pub async fn put_object_part(
        &self,
        credential: &Credential,
        input: UploadPartInput,
    ) -> EngineResult<UploadPartOutput> {
        let bucket = self.meta.get_bucket(&input.bucket, true).await?;
        let multipart = self
            .meta
            .get_multipart(&input.bucket, &input.key, &input.upload_id)
            .await?;

        if input.size > MAX_PART_SIZE {
            return Err(EngineError::EntityTooLarge);
        }
        if !(1..=MAX_PART_NUMBER).contains(&input.part_number) {
            return Err(EngineError::InvalidArgument {
                message: format!(
                    "part number must be between 1 and {MAX_PART_NUMBER}: {}",
                    input.part_number
                ),
            });
        }
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;

        let data_key = resolve_part_key(
            multipart.metadata.sse_type,
            &multipart.metadata.data_key,
            &input.sse,
        )?;
        let iv = if data_key.is_empty() {
            Vec::new()
        } else {
            new_initialization_vector()
        };

        let cluster = self.clusters.get(&multipart.metadata.location)?;
        let pool = multipart.metadata.pool.clone();

        let (object_id, bytes_written, calculated_md5) = self
            .stream_to_backend(&cluster, &pool, input.body, input.size, &data_key, &iv)
            .await?;

        if bytes_written < input.size {
            self.recycle_blob(&cluster, &pool, object_id);
            return Err(EngineError::IncompleteBody);
        }
        if let Some(expected) = &input.content_md5 {
            if expected != &calculated_md5 {
                self.recycle_blob(&cluster, &pool, object_id);
                return Err(EngineError::BadDigest);
            }
        }
        if let Some(verifier) = &input.verifier {
            if let Err(e) = verifier.verify() {
                self.recycle_blob(&cluster, &pool, object_id);
                return Err(e.into());
            }
        }

        let part = Part {
            part_number: input.part_number,
            size: input.size,
            object_id: object_id.clone(),
            offset: 0,
            etag: calculated_md5.clone(),
            last_modified: Utc::now(),
            initialization_vector: iv,
        };
        let delta = match self.meta.put_object_part(&multipart, part).await {
            Ok(delta) => delta,
            Err(e) => {
                self.recycle_blob(&cluster, &pool, object_id);
                return Err(e.into());
            }
        };
        if self.config.piggyback_usage && delta != 0 {
            self.meta.update_usage(&input.bucket, delta, None).await?;
        }

        // The replaced part's blob is now orphaned.
        if let Some(old) = multipart.parts.get(&input.part_number) {
            self.recycle.enqueue(RecycleEntry {
                location: multipart.metadata.location.clone(),
                pool: pool.clone(),
                object_id: old.object_id.clone(),
                object_type: ObjectType::Multipart,
            });
        }

        Ok(UploadPartOutput {
            etag: calculated_md5,
            sse_type: input.sse.sse_type,
        })
    }

    /// Upload a part by copying from an existing object.
    pub async fn copy_object_part(
        &self,
        credential: &Credential,
        input: CopyPartInput,
    ) -> EngineResult<UploadPartOutput> {
        // Read access to the source bucket is checked by the GET path.
        let source = self
            .get_object(
                credential,
                GetObjectInput {
                    bucket: input.source_bucket.clone(),
                    key: input.source_key.clone(),
                    version: input.source_version.clone(),
                    range: None,
                    sse: input.source_sse.clone(),
                },
            )
            .await?;
        if source.object.size > MAX_PART_SIZE {
            return Err(EngineError::EntityTooLarge);
        }

        self.put_object_part(
            credential,
            UploadPartInput {
                bucket: input.bucket,
                key: input.key,
                upload_id: input.upload_id,
                part_number: input.part_number,
                size: source.object.size,
                body: source.body,
                content_md5: None,
                sse: input.sse,
                verifier: None,
            },
        )
        .await
    }

    /// List the parts uploaded so far.
    pub async fn list_object_parts(
        &self,
        credential: &Credential,
        bucket_name: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
        max_parts: usize,
    ) -> EngineResult<ListPartsOutput> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;
        let multipart = self.meta.get_multipart(bucket_name, key, upload_id).await?;

        let max_parts = max_parts.clamp(1, 1000);
        let mut parts: Vec<Part> = multipart
            .parts
            .range(part_number_marker.saturating_add(1)..)
            .take(max_parts + 1)
            .map(|(_, p)| p.clone())
            .collect();

        let is_truncated = parts.len() > max_parts;
        let next_part_number_marker = if is_truncated {
            parts.truncate(max_parts);
            parts.last().map(|p| p.part_number)
        } else {
            None
        };

        Ok(ListPartsOutput {
            parts,
            is_truncated,
            next_part_number_marker,
            storage_class: multipart.metadata.storage_class,
        })
    }

    /// Abort an upload: the multipart row goes away and every uploaded part
    /// blob is recycled.
    pub async fn abort_multipart_upload(
        &self,
        credential: &Credential,
        bucket_name: &str,
        key: &str,
        upload_id: &str,
    ) -> EngineResult<()> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;
        let multipart = self.meta.get_multipart(bucket_name, key, upload_id).await?;

        let removed = self.meta.delete_multipart(&multipart, None).await?;
        for part in multipart.parts.values() {
            self.recycle.enqueue(RecycleEntry {
                location: multipart.metadata.location.clone(),
                pool: multipart.metadata.pool.clone(),
                object_id: part.object_id.clone(),
                object_type: ObjectType::Multipart,
            });
        }
        if self.config.piggyback_usage && removed != 0 {
            self.meta.update_usage(bucket_name, -removed, None).await?;
        }

        debug!(bucket = %bucket_name, key = %key, upload_id = %upload_id, "multipart aborted");
        Ok(())
    }

    /// Complete an upload: validate the part list, assemble offsets and the
    /// composite ETag, and consume the multipart row atomically with the
    /// object insert.
    pub async fn complete_multipart_upload(
        &self,
        credential: &Credential,
        bucket_name: &str,
        key: &str,
        upload_id: &str,
        uploaded_parts: &[CompletedPart],
    ) -> EngineResult<CompleteMultipartOutput> {
        let bucket = self.meta.get_bucket_info(bucket_name).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Write,
            &self.config.log_delivery_group,
        )?;
        let multipart = self.meta.get_multipart(bucket_name, key, upload_id).await?;

        if uploaded_parts.is_empty() {
            return Err(EngineError::InvalidPart);
        }

        let existing = match self.meta.get_latest_object_version(bucket_name, key).await {
            Ok(o) => Some(o),
            Err(MetaError::NoSuchKey { .. }) => None,
            Err(e) => return Err(e.into()),
        };

        // Part numbers must be contiguous from 1; each must exist with a
        // matching ETag; all but the last must reach the minimum size.
        let mut etag_md5 = <Md5 as Digest>::new();
        let mut total_size: u64 = 0;
        let mut assembled: BTreeMap<u32, Part> = BTreeMap::new();
        for (i, uploaded) in uploaded_parts.iter().enumerate() {
            let expected_number = (i + 1) as u32;
            if uploaded.part_number != expected_number {
                return Err(EngineError::InvalidPart);
            }
            let Some(part) = multipart.get_part(expected_number) else {
                return Err(EngineError::InvalidPart);
            };
            if part.size < MIN_PART_SIZE && (i + 1) != uploaded_parts.len() {
                return Err(EngineError::PartTooSmall {
                    size: part.size,
                    part_number: part.part_number,
                    etag: part.etag.clone(),
                });
            }
            if part.etag != normalize_etag(&uploaded.etag) {
                return Err(EngineError::InvalidPart);
            }
            let etag_bytes = hex::decode(&part.etag).map_err(|_| EngineError::InvalidPart)?;
            Digest::update(&mut etag_md5, &etag_bytes);

            let mut part = part.clone();
            part.offset = total_size;
            total_size += part.size;
            assembled.insert(part.part_number, part);
        }
        let etag = format!(
            "{}-{}",
            hex::encode(etag_md5.finalize()),
            uploaded_parts.len()
        );

        let now = Utc::now();
        let create_time = now.timestamp_nanos_opt().unwrap_or_default() as u64;
        let version_id = version_for(bucket.versioning, create_time);
        let object = Object {
            bucket_name: bucket_name.to_owned(),
            name: key.to_owned(),
            version_id,
            null_version: bucket.versioning != VersioningStatus::Enabled,
            delete_marker: false,
            owner_id: multipart.metadata.owner_id.clone(),
            location: multipart.metadata.location.clone(),
            pool: multipart.metadata.pool.clone(),
            object_id: String::new(),
            size: total_size,
            etag: etag.clone(),
            content_type: multipart.metadata.content_type.clone(),
            custom_attributes: multipart.metadata.custom_attributes.clone(),
            acl: multipart.metadata.acl.clone(),
            sse_type: multipart.metadata.sse_type,
            encryption_key: multipart.metadata.sealed_key.clone(),
            initialization_vector: Vec::new(),
            object_type: ObjectType::Multipart,
            storage_class: multipart.metadata.storage_class,
            create_time,
            last_modified: now,
            parts: assembled,
        };

        // A superseded Glacier object may have a pending restore; drop it.
        if let Some(old) = &existing {
            if old.storage_class == StorageClass::Glacier
                && bucket.versioning != VersioningStatus::Enabled
            {
                match self
                    .meta
                    .get_freezer(bucket_name, key, object.version_id)
                    .await
                {
                    Ok(freezer) => self.meta.delete_freezer(&freezer).await?,
                    Err(MetaError::NoSuchKey { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        // One transaction: part rows, object row, multipart-row consumption.
        // Usage was accumulated per part, so no further delta here.
        self.meta.put_object(&object, Some(&multipart), false).await?;

        if bucket.versioning != VersioningStatus::Enabled {
            if let Some(old) = existing {
                if old.is_null_version() && !old.delete_marker {
                    let gateway = self.clone();
                    tokio::spawn(async move { gateway.remove_old_object(&old).await });
                }
            }
        }

        debug!(
            bucket = %bucket_name,
            key = %key,
            upload_id = %upload_id,
            parts = uploaded_parts.len(),
            size = total_size,
            "complete_multipart_upload committed"
        );

        Ok(CompleteMultipartOutput {
            etag,
            version_id: (version_id != NULL_VERSION_ID).then(|| wire_version_id(version_id)),
            size: total_size,
            create_time,
        })
    }

    /// List in-flight uploads for a bucket.
    pub async fn list_multipart_uploads(
        &self,
        credential: &Credential,
        bucket_name: &str,
        key_marker: &str,
        upload_id_marker: &str,
        prefix: &str,
        delimiter: &str,
        max_uploads: usize,
    ) -> EngineResult<UploadListing> {
        let bucket = self.meta.get_bucket(bucket_name, true).await?;
        check_bucket_access(
            &bucket,
            credential,
            Permission::Read,
            &self.config.log_delivery_group,
        )?;
        Ok(self
            .meta
            .list_multipart_uploads(
                bucket_name,
                key_marker,
                upload_id_marker,
                prefix,
                delimiter,
                max_uploads.clamp(1, 1000),
            )
            .await?)
    }
}
