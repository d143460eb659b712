//! In-flight multipart uploads and their parts.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::acl::Acl;
use super::object::{SseType, StorageClass};

/// A single uploaded part.
///
/// While the upload is in flight the part lives in the multipart row; on
/// Complete the parts become rows keyed by `(bucket, object, part_version,
/// part_number)` with `offset` filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Part number, 1-based.
    pub part_number: u32,
    /// Part size in bytes.
    pub size: u64,
    /// Backend blob id.
    pub object_id: String,
    /// Byte offset within the assembled object; filled at Complete.
    pub offset: u64,
    /// Hex MD5 of the part plaintext.
    pub etag: String,
    /// When the part was uploaded.
    pub last_modified: DateTime<Utc>,
    /// Initialization vector used to encrypt this part (empty if unencrypted).
    #[serde(default)]
    pub initialization_vector: Vec<u8>,
}

/// Metadata shared by all parts of a multipart upload, captured at create.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartMetadata {
    /// Canonical user id of the upload initiator.
    pub initiator_id: String,
    /// Canonical user id the final object will belong to.
    pub owner_id: String,
    /// MIME type of the final object.
    pub content_type: String,
    /// Backend cluster identifier chosen at create.
    pub location: String,
    /// Backend pool chosen at create.
    pub pool: String,
    /// ACL for the final object.
    pub acl: Acl,
    /// Encryption variant requested at create.
    pub sse_type: SseType,
    /// Plaintext data key used to encrypt parts (SSE-S3 only; never persisted
    /// beyond the upload's lifetime).
    #[serde(default)]
    pub data_key: Vec<u8>,
    /// Sealed data key stored on the final object row (SSE-S3 only).
    #[serde(default)]
    pub sealed_key: Vec<u8>,
    /// User metadata headers for the final object.
    #[serde(default)]
    pub custom_attributes: HashMap<String, String>,
    /// Storage class of the final object.
    pub storage_class: StorageClass,
}

/// An in-flight multipart upload, keyed by `(bucket, object, upload_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Multipart {
    /// The owning bucket.
    pub bucket_name: String,
    /// The object key the upload will create.
    pub object_name: String,
    /// Random opaque upload token.
    pub upload_id: String,
    /// When the upload was initiated, nanoseconds since the Unix epoch.
    pub initial_time: u64,
    /// Metadata captured at create.
    pub metadata: MultipartMetadata,
    /// Parts uploaded so far, by part number.
    #[serde(default)]
    pub parts: BTreeMap<u32, Part>,
}

impl Multipart {
    /// Start a new upload with a freshly generated upload id.
    #[must_use]
    pub fn new(
        bucket_name: impl Into<String>,
        object_name: impl Into<String>,
        metadata: MultipartMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            upload_id: generate_upload_id(),
            initial_time: now.timestamp_nanos_opt().unwrap_or_default() as u64,
            metadata,
            parts: BTreeMap::new(),
        }
    }

    /// Insert or replace a part, returning the replaced part if any.
    pub fn put_part(&mut self, part: Part) -> Option<Part> {
        self.parts.insert(part.part_number, part)
    }

    /// Get a part by number.
    #[must_use]
    pub fn get_part(&self, part_number: u32) -> Option<&Part> {
        self.parts.get(&part_number)
    }

    /// Total size of all uploaded parts.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.parts.values().map(|p| p.size).sum()
    }
}

/// Generate a random upload id: 64 hex characters.
#[must_use]
pub fn generate_upload_id() -> String {
    let mut rng = rand::rng();
    let mut buf = [0u8; 32];
    rng.fill(&mut buf);
    hex::encode(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
