//! The consumed policy-evaluation contract.
//!
//! The gateway does not define a policy language. It evaluates bucket and
//! IAM policies through these traits and only consumes the tri-state
//! verdict. `Indeterminate` is preserved across pipeline layers and only
//! collapsed to a boolean at the very end of the cascade.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::S3Action;
use crate::error::AuthResult;

/// Tri-state policy evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A statement explicitly allows the request.
    Allow,
    /// A statement explicitly denies the request.
    Deny,
    /// No statement matched.
    Indeterminate,
}

/// The arguments a policy document is evaluated against.
#[derive(Debug)]
pub struct PolicyArgs<'a> {
    /// The requesting account (extern user id); empty for anonymous.
    pub account: &'a str,
    /// The requested action.
    pub action: S3Action,
    /// The bucket name; empty for bucketless actions and IAM evaluation.
    pub bucket: &'a str,
    /// The object key; empty for bucket-level actions.
    pub object: &'a str,
    /// Condition values: request headers, query parameters, and the
    /// synthetic `SourceIp`.
    pub conditions: &'a HashMap<String, Vec<String>>,
}

/// A decoded policy document.
pub trait PolicyDocument: Send + Sync {
    /// Evaluate the document against the request arguments.
    fn is_allowed(&self, args: &PolicyArgs<'_>) -> Verdict;
}

/// Decoder for serialized bucket-policy blobs.
pub trait PolicyDecoder: Send + Sync {
    /// Decode a stored policy blob. An empty blob decodes to `None`
    /// (no policy, which evaluates as `Indeterminate`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AuthError::PolicyDecode`] when the blob is
    /// present but malformed.
    fn decode(&self, blob: &[u8]) -> AuthResult<Option<Arc<dyn PolicyDocument>>>;
}

/// A policy document with a fixed verdict. Useful as a stand-in where a
/// full policy engine is not wired, and in tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicy(pub Verdict);

impl PolicyDocument for StaticPolicy {
    fn is_allowed(&self, _args: &PolicyArgs<'_>) -> Verdict {
        self.0
    }
}

/// A decoder that treats every non-empty blob as a fixed-verdict policy.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicyDecoder(pub Verdict);

impl PolicyDecoder for StaticPolicyDecoder {
    fn decode(&self, blob: &[u8]) -> AuthResult<Option<Arc<dyn PolicyDocument>>> {
        if blob.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(StaticPolicy(self.0))))
    }
}
