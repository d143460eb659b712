//! Authorization pipeline of the Stratus object gateway.
//!
//! Every S3 request passes through [`AuthPipeline::check_request_auth`]:
//! auth-type dispatch, signature verification (through the consumed
//! [`SignatureVerifier`] capability), then the policy cascade
//! (bucket policy, then IAM policy for sub-users of the bucket owner).
//! Operations apply the final bucket-ACL layer through
//! [`acl::check_bucket_access`] when no policy layer allowed the request.

pub mod acl;
pub mod action;
pub mod credential;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod request;

pub use action::S3Action;
pub use credential::Credential;
pub use error::{AuthError, AuthResult};
pub use pipeline::AuthPipeline;
pub use policy::{PolicyArgs, PolicyDecoder, PolicyDocument, Verdict};
pub use request::{AuthRequest, AuthType, SignatureVerifier};
