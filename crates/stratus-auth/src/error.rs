//! Authorization error types.

/// Authorization failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is not permitted.
    #[error("access denied")]
    AccessDenied,

    /// The bucket ACL does not grant the required permission.
    #[error("bucket access forbidden")]
    BucketAccessForbidden,

    /// The request carried an unrecognized authentication type.
    #[error("the authorization mechanism you have provided is not supported")]
    SignatureVersionNotSupported,

    /// The request signature did not verify.
    #[error("the request signature we calculated does not match the signature you provided")]
    SignatureDoesNotMatch,

    /// The access key in the request is unknown.
    #[error("the access key id you provided does not exist: {0}")]
    InvalidAccessKeyId(String),

    /// The target bucket of the request does not exist.
    #[error("the specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name.
        bucket: String,
    },

    /// A stored policy document failed to decode; fatal.
    #[error("policy decode error: {context}")]
    PolicyDecode {
        /// Where the failure originated.
        context: &'static str,
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },
}

impl AuthError {
    /// Wrap a policy decode failure.
    pub fn policy_decode(context: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::PolicyDecode {
            context,
            source: source.into(),
        }
    }

    /// The S3 error code this error maps to.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BucketAccessForbidden => "AccessDenied",
            Self::SignatureVersionNotSupported => "SignatureVersionNotSupported",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidAccessKeyId(_) => "InvalidAccessKeyId",
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::PolicyDecode { .. } => "InternalError",
        }
    }
}

/// Convenience result type for authorization checks.
pub type AuthResult<T> = Result<T, AuthError>;
