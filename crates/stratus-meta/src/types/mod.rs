//! Persisted row types and their derivations.

pub mod acl;
pub mod bucket;
pub mod multipart;
pub mod object;
pub mod version;

pub use acl::{Acl, AclGroup, CannedAcl, Grant, Grantee, Permission};
pub use bucket::{Bucket, InvalidVersioningValue, VersioningStatus, STORE_TIME_LAYOUT};
pub use multipart::{generate_upload_id, Multipart, MultipartMetadata, Part};
pub use object::{Freezer, Object, ObjectType, SseType, StorageClass};
pub use version::{
    derive_version_id, parse_wire_version_id, part_version, version_for, wire_version_id,
    NULL_VERSION_ID, NULL_VERSION_WIRE,
};
