//! The closed set of S3 actions the gateway authorizes.

use serde::{Deserialize, Serialize};
use stratus_meta::types::Permission;

/// An S3 action, as named in policy documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum S3Action {
    /// `s3:ListAllMyBuckets`
    ListAllMyBuckets,
    /// `s3:CreateBucket`
    CreateBucket,
    /// `s3:DeleteBucket`
    DeleteBucket,
    /// `s3:ListBucket`
    ListBucket,
    /// `s3:ListBucketVersions`
    ListBucketVersions,
    /// `s3:GetBucketVersioning`
    GetBucketVersioning,
    /// `s3:PutBucketVersioning`
    PutBucketVersioning,
    /// `s3:GetBucketAcl`
    GetBucketAcl,
    /// `s3:PutBucketAcl`
    PutBucketAcl,
    /// `s3:GetObject`
    GetObject,
    /// `s3:PutObject`
    PutObject,
    /// `s3:DeleteObject`
    DeleteObject,
    /// `s3:GetObjectAcl`
    GetObjectAcl,
    /// `s3:PutObjectAcl`
    PutObjectAcl,
    /// `s3:ListBucketMultipartUploads`
    ListBucketMultipartUploads,
    /// `s3:ListMultipartUploadParts`
    ListMultipartUploadParts,
    /// `s3:AbortMultipartUpload`
    AbortMultipartUpload,
    /// `s3:RestoreObject`
    RestoreObject,
}

impl S3Action {
    /// The action name as it appears in policy documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListAllMyBuckets => "s3:ListAllMyBuckets",
            Self::CreateBucket => "s3:CreateBucket",
            Self::DeleteBucket => "s3:DeleteBucket",
            Self::ListBucket => "s3:ListBucket",
            Self::ListBucketVersions => "s3:ListBucketVersions",
            Self::GetBucketVersioning => "s3:GetBucketVersioning",
            Self::PutBucketVersioning => "s3:PutBucketVersioning",
            Self::GetBucketAcl => "s3:GetBucketAcl",
            Self::PutBucketAcl => "s3:PutBucketAcl",
            Self::GetObject => "s3:GetObject",
            Self::PutObject => "s3:PutObject",
            Self::DeleteObject => "s3:DeleteObject",
            Self::GetObjectAcl => "s3:GetObjectAcl",
            Self::PutObjectAcl => "s3:PutObjectAcl",
            Self::ListBucketMultipartUploads => "s3:ListBucketMultipartUploads",
            Self::ListMultipartUploadParts => "s3:ListMultipartUploadParts",
            Self::AbortMultipartUpload => "s3:AbortMultipartUpload",
            Self::RestoreObject => "s3:RestoreObject",
        }
    }

    /// Whether this action has no bucket to evaluate a bucket policy against.
    #[must_use]
    pub fn is_bucketless(&self) -> bool {
        matches!(self, Self::ListAllMyBuckets | Self::CreateBucket)
    }

    /// The bucket-ACL permission this action requires: READ for read-ish
    /// actions, WRITE for mutations.
    #[must_use]
    pub fn required_permission(&self) -> Permission {
        match self {
            Self::ListAllMyBuckets
            | Self::ListBucket
            | Self::ListBucketVersions
            | Self::GetBucketVersioning
            | Self::GetBucketAcl
            | Self::GetObject
            | Self::GetObjectAcl
            | Self::ListBucketMultipartUploads
            | Self::ListMultipartUploadParts => Permission::Read,
            Self::CreateBucket
            | Self::DeleteBucket
            | Self::PutBucketVersioning
            | Self::PutBucketAcl
            | Self::PutObject
            | Self::DeleteObject
            | Self::PutObjectAcl
            | Self::AbortMultipartUpload
            | Self::RestoreObject => Permission::Write,
        }
    }
}

impl std::fmt::Display for S3Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
