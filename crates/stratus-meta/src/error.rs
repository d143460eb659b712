//! Metadata-store error types.
//!
//! Recoverable lookups surface as the corresponding S3 error code; fatal
//! variants wrap the underlying cause for logging and surface as a 500-class
//! response at the boundary.

/// Metadata-store error.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// The specified bucket does not exist.
    #[error("the specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The specified key (or version of a key) does not exist.
    #[error("the specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified multipart upload does not exist.
    #[error("the specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload id that was not found.
        upload_id: String,
    },

    /// The bucket still holds versions, a null version, or in-flight uploads.
    #[error("the bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The non-empty bucket.
        bucket: String,
    },

    /// A row decoded into an unexpected shape; recoverable.
    #[error("metadata warning: {context}")]
    Warn {
        /// Where the warning originated.
        context: &'static str,
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The store failed in a way the caller cannot recover from.
    #[error("metadata fatal error: {context}")]
    Fatal {
        /// Where the failure originated.
        context: &'static str,
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },
}

impl MetaError {
    /// Wrap a cause as a fatal store error.
    pub fn fatal(context: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Fatal {
            context,
            source: source.into(),
        }
    }

    /// Wrap a cause as a recoverable warning.
    pub fn warn(context: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Warn {
            context,
            source: source.into(),
        }
    }

    /// The S3 error code this error maps to.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::BucketNotEmpty { .. } => "BucketNotEmpty",
            Self::Warn { .. } | Self::Fatal { .. } => "InternalError",
        }
    }
}

/// Convenience result type for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;
