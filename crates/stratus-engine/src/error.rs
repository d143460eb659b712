//! Engine error taxonomy.
//!
//! Recoverable errors map to their S3 error codes through
//! [`EngineError::code`]; fatal variants keep the underlying cause attached
//! for logging and surface as `InternalError`.

use stratus_auth::AuthError;
use stratus_meta::MetaError;

/// An object-engine failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A metadata-store failure.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// An authorization failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A referenced part does not exist, is out of order, or carries a
    /// mismatched ETag.
    #[error("one or more of the specified parts could not be found or did not match")]
    InvalidPart,

    /// A non-final part is below the minimum part size.
    #[error("part {part_number} is too small: {size} bytes (etag {etag})")]
    PartTooSmall {
        /// The offending part's size.
        size: u64,
        /// The offending part's number.
        part_number: u32,
        /// The offending part's ETag.
        etag: String,
    },

    /// The payload exceeds the maximum allowed size.
    #[error("your proposed upload exceeds the maximum allowed object size")]
    EntityTooLarge,

    /// Fewer body bytes arrived than the declared content length.
    #[error("the request body was smaller than the specified content length")]
    IncompleteBody,

    /// The supplied Content-MD5 did not match the received body.
    #[error("the Content-MD5 you specified did not match what we received")]
    BadDigest,

    /// The SSE headers are inconsistent with the upload's encryption state.
    #[error("the encryption request you specified is not valid")]
    InvalidSseHeader,

    /// The requested functionality is not implemented.
    #[error("a header you provided implies functionality that is not implemented")]
    NotImplemented,

    /// Overwrite of an existing key was forbidden by the request.
    #[error("the key already exists and overwrite is forbidden")]
    ForbiddenOverwriteKey,

    /// The versioning configuration value is not acceptable.
    #[error("the versioning configuration is invalid")]
    InvalidVersioning,

    /// The requested bucket name already belongs to another account.
    #[error("the requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The taken bucket name.
        bucket: String,
    },

    /// An argument failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// The requested byte range is not satisfiable.
    #[error("the requested range is not satisfiable")]
    InvalidRange,

    /// An internal failure outside the recoverable taxonomy.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// The S3 error code this error maps to.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Meta(e) => e.code(),
            Self::Auth(e) => e.code(),
            Self::InvalidPart => "InvalidPart",
            Self::PartTooSmall { .. } => "EntityTooSmall",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::IncompleteBody => "IncompleteBody",
            Self::BadDigest => "BadDigest",
            Self::InvalidSseHeader => "InvalidEncryptionAlgorithmError",
            Self::NotImplemented => "NotImplemented",
            Self::ForbiddenOverwriteKey => "ForbiddenOverwriteKey",
            Self::InvalidVersioning => "IllegalVersioningConfigurationException",
            Self::BucketAlreadyExists { .. } => "BucketAlreadyExists",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::InvalidRange => "InvalidRange",
            Self::Internal(_) => "InternalError",
        }
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
