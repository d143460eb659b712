//! Bucket row and versioning state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::acl::Acl;

/// The format used for timestamps persisted by the metadata store.
pub const STORE_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// VersioningStatus
// ---------------------------------------------------------------------------

/// Bucket versioning state machine.
///
/// `Disabled` is the initial state and can never be returned to once
/// versioning has been enabled; a `PUT ?versioning` request may only carry
/// `Enabled` or `Suspended`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning has never been enabled on this bucket.
    #[default]
    Disabled,
    /// Versioning is currently enabled.
    Enabled,
    /// Versioning was previously enabled but is now suspended.
    Suspended,
}

impl VersioningStatus {
    /// Return the wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }

    /// Parse a versioning configuration value from the wire.
    ///
    /// Only `Enabled` and `Suspended` are accepted; everything else, including
    /// `Disabled`, is invalid as a requested state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidVersioningValue`] for any unaccepted value.
    pub fn from_wire(s: &str) -> Result<Self, InvalidVersioningValue> {
        match s {
            "Enabled" => Ok(Self::Enabled),
            "Suspended" => Ok(Self::Suspended),
            other => Err(InvalidVersioningValue(other.to_owned())),
        }
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersioningStatus {
    type Err = InvalidVersioningValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disabled" => Ok(Self::Disabled),
            "Enabled" => Ok(Self::Enabled),
            "Suspended" => Ok(Self::Suspended),
            other => Err(InvalidVersioningValue(other.to_owned())),
        }
    }
}

/// Error returned for an unaccepted versioning configuration value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid versioning value: {0}")]
pub struct InvalidVersioningValue(pub String);

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// A bucket row.
///
/// Configuration blobs (CORS, lifecycle, website, encryption, logging) are
/// stored as opaque JSON documents; the gateway core never interprets them.
/// The bucket policy is a serialized document decoded by the consumed policy
/// engine at authorization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Globally unique bucket name.
    pub name: String,
    /// Canonical user id of the owning root account.
    pub owner_id: String,
    /// The bucket ACL (canned or explicit grants).
    pub acl: Acl,
    /// Serialized bucket policy document; empty means no policy.
    #[serde(default, with = "serde_bytes_vec")]
    pub policy: Vec<u8>,
    /// CORS configuration, stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<serde_json::Value>,
    /// Lifecycle configuration, stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<serde_json::Value>,
    /// Static-website configuration, stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<serde_json::Value>,
    /// Default-encryption configuration, stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<serde_json::Value>,
    /// Access-logging configuration, stored opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    /// When the bucket was created.
    pub create_time: DateTime<Utc>,
    /// Accumulated byte usage of live object versions (signed counter).
    pub usage: i64,
    /// Versioning state.
    pub versioning: VersioningStatus,
}

impl Bucket {
    /// Create a bucket with default configuration for the given owner.
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_id: owner_id.into(),
            acl: Acl::default(),
            policy: Vec::new(),
            cors: None,
            lifecycle: None,
            website: None,
            encryption: None,
            logging: None,
            create_time: Utc::now(),
            usage: 0,
            versioning: VersioningStatus::default(),
        }
    }

    /// Whether versioning is currently enabled.
    #[must_use]
    pub fn is_versioning_enabled(&self) -> bool {
        self.versioning == VersioningStatus::Enabled
    }

    /// The creation time in the persisted store layout.
    #[must_use]
    pub fn store_create_time(&self) -> String {
        self.create_time.format(STORE_TIME_LAYOUT).to_string()
    }
}

// The policy blob is raw bytes; serialize it as a base64-free byte sequence
// so JSON snapshots of rows stay diffable.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.collect_seq(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(de)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
