//! Object rows, storage classes, SSE markers, and restore bookkeeping.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::acl::Acl;
use super::multipart::Part;
use super::version::{self, NULL_VERSION_ID};

// ---------------------------------------------------------------------------
// SseType
// ---------------------------------------------------------------------------

/// Server-side-encryption variant recorded on an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SseType {
    /// No encryption.
    #[default]
    None,
    /// System-managed key (SSE-S3); the sealed data key is stored on the row.
    S3,
    /// Customer-provided key (SSE-C); the key is re-presented on every request.
    SseC,
    /// External KMS-managed key.
    S3Kms,
}

impl SseType {
    /// Return the stored string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::S3 => "SSE-S3",
            Self::SseC => "SSE-C",
            Self::S3Kms => "SSE-KMS",
        }
    }
}

// ---------------------------------------------------------------------------
// StorageClass
// ---------------------------------------------------------------------------

/// Object storage class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageClass {
    /// Frequently accessed data (default).
    #[default]
    Standard,
    /// Infrequently accessed data.
    Ia,
    /// Archived data requiring restore before read.
    Glacier,
}

impl StorageClass {
    /// Return the wire name of the storage class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Ia => "STANDARD_IA",
            Self::Glacier => "GLACIER",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`StorageClass`] from a string fails.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown storage class: {0}")]
pub struct ParseStorageClassError(String);

impl FromStr for StorageClass {
    type Err = ParseStorageClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "STANDARD" => Ok(Self::Standard),
            "STANDARD_IA" => Ok(Self::Ia),
            "GLACIER" => Ok(Self::Glacier),
            other => Err(ParseStorageClassError(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectType
// ---------------------------------------------------------------------------

/// How the object's backend data is laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    /// One backend blob.
    #[default]
    Normal,
    /// Assembled from multipart part blobs.
    Multipart,
    /// Append-written object (no append operation is currently exposed).
    Append,
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// An object row, keyed by `(bucket_name, name, version_id)`.
///
/// For multipart objects the `parts` map is materialized from the part table
/// on read; the object row itself does not persist parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// The owning bucket.
    pub bucket_name: String,
    /// The object key.
    pub name: String,
    /// Version id; `0` is the null version.
    pub version_id: u64,
    /// Whether this row occupies the null slot.
    pub null_version: bool,
    /// Whether this row is a delete marker (zero-size tombstone).
    pub delete_marker: bool,
    /// Canonical user id of the object owner.
    pub owner_id: String,
    /// Backend cluster identifier.
    pub location: String,
    /// Backend pool within the cluster.
    pub pool: String,
    /// Backend blob id (empty for multipart objects; see `parts`).
    pub object_id: String,
    /// Object size in bytes.
    pub size: u64,
    /// Hex MD5 of the plaintext, or the composite multipart ETag.
    pub etag: String,
    /// MIME type.
    pub content_type: String,
    /// User metadata headers.
    #[serde(default)]
    pub custom_attributes: HashMap<String, String>,
    /// Object ACL.
    pub acl: Acl,
    /// Encryption variant.
    pub sse_type: SseType,
    /// Sealed data key (SSE-S3 only; empty otherwise).
    #[serde(default)]
    pub encryption_key: Vec<u8>,
    /// Initialization vector for single-blob objects (parts carry their own).
    #[serde(default)]
    pub initialization_vector: Vec<u8>,
    /// Backend data layout.
    pub object_type: ObjectType,
    /// Storage class.
    pub storage_class: StorageClass,
    /// Creation time, nanoseconds since the Unix epoch.
    pub create_time: u64,
    /// Last-modified timestamp.
    pub last_modified: DateTime<Utc>,
    /// Parts by part number, for multipart objects.
    #[serde(default)]
    pub parts: BTreeMap<u32, Part>,
}

impl Object {
    /// Whether this row occupies the null slot.
    #[must_use]
    pub fn is_null_version(&self) -> bool {
        self.version_id == NULL_VERSION_ID
    }

    /// The version under which this object's part rows are keyed.
    #[must_use]
    pub fn part_version(&self) -> u64 {
        version::part_version(self.create_time)
    }

    /// The version id to present on the wire (`"null"` for the null slot).
    #[must_use]
    pub fn wire_version_id(&self) -> String {
        version::wire_version_id(self.version_id)
    }

    /// The version id this row would carry if it were a versioned row,
    /// derived from its creation time. Used to order a null version against
    /// versioned rows in listings.
    #[must_use]
    pub fn derived_version_id(&self) -> u64 {
        version::derive_version_id(self.create_time)
    }

    /// The version id used to interleave this row in a versioned listing:
    /// the stored id for versioned rows, the derived id for the null row.
    #[must_use]
    pub fn effective_version_id(&self) -> u64 {
        if self.is_null_version() {
            self.derived_version_id()
        } else {
            self.version_id
        }
    }

    /// The last-modified timestamp in the persisted store layout.
    #[must_use]
    pub fn store_last_modified(&self) -> String {
        self.last_modified
            .format(super::bucket::STORE_TIME_LAYOUT)
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Freezer
// ---------------------------------------------------------------------------

/// A pending Glacier restore entry for an object version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freezer {
    /// The owning bucket.
    pub bucket_name: String,
    /// The object key.
    pub name: String,
    /// The object version the restore belongs to.
    pub version_id: u64,
    /// Backend cluster identifier of the restored copy.
    pub location: String,
    /// Backend pool of the restored copy.
    pub pool: String,
    /// Backend blob id of the restored copy.
    pub object_id: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
