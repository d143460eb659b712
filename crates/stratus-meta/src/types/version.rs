//! Version-id derivation for object rows.
//!
//! Version ids are derived from the object's creation time so that ordering
//! by *ascending* version id within a key yields newest-first: a later
//! `create_time` produces a smaller id. The sentinel id `0` is the "null
//! version", the single mutable slot used by buckets whose versioning is
//! Disabled or Suspended.

use super::bucket::VersioningStatus;

/// The sentinel version id of the null version.
pub const NULL_VERSION_ID: u64 = 0;

/// The wire representation of the null version id.
pub const NULL_VERSION_WIRE: &str = "null";

/// Derive a version id from a creation timestamp (nanoseconds since epoch).
///
/// The derivation is monotonically decreasing in `create_time`, so two writes
/// with wall-clock order P1 -> P2 satisfy `id(P2) < id(P1)`.
#[must_use]
pub fn derive_version_id(create_time: u64) -> u64 {
    u64::MAX - create_time
}

/// The version under which part rows of a multipart object are keyed.
///
/// Uses the same derivation as [`derive_version_id`] so part rows sort with
/// their owning multipart object.
#[must_use]
pub fn part_version(create_time: u64) -> u64 {
    u64::MAX - create_time
}

/// Choose the version id for a new write under the bucket's versioning state.
///
/// Enabled buckets get a fresh derived id; Disabled and Suspended buckets
/// write to the null slot.
#[must_use]
pub fn version_for(status: VersioningStatus, create_time: u64) -> u64 {
    match status {
        VersioningStatus::Enabled => derive_version_id(create_time),
        VersioningStatus::Disabled | VersioningStatus::Suspended => NULL_VERSION_ID,
    }
}

/// Render a version id for the wire: `0` maps to the literal `"null"`.
#[must_use]
pub fn wire_version_id(version_id: u64) -> String {
    if version_id == NULL_VERSION_ID {
        NULL_VERSION_WIRE.to_owned()
    } else {
        version_id.to_string()
    }
}

/// Parse a wire version id back to its numeric form.
///
/// Accepts the literal `"null"` and decimal version ids.
#[must_use]
pub fn parse_wire_version_id(s: &str) -> Option<u64> {
    if s == NULL_VERSION_WIRE {
        return Some(NULL_VERSION_ID);
    }
    s.parse().ok()
}
