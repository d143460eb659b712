//! The request surface the authorization pipeline consumes.
//!
//! Signature verification itself is out of scope; it is reached through the
//! [`SignatureVerifier`] capability. This module carries the auth-type
//! dispatch values, the condition-value construction, and the source-IP
//! derivation fed into policy evaluation.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::credential::Credential;
use crate::error::AuthResult;

/// How the request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// AWS signature V2 in the `Authorization` header.
    SignedV2,
    /// AWS signature V4 in the `Authorization` header.
    SignedV4,
    /// AWS signature V2 in query parameters.
    PresignedV2,
    /// AWS signature V4 in query parameters.
    PresignedV4,
    /// No signature at all.
    Anonymous,
    /// Unrecognized authentication material.
    Unknown,
}

impl AuthType {
    /// Whether the request carries a signature to verify.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::SignedV2 | Self::SignedV4 | Self::PresignedV2 | Self::PresignedV4
        )
    }
}

/// Matches the first `for=` element of an RFC 7239 `Forwarded` header.
static FORWARDED_FOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)for=([^;,\s]+)").expect("forwarded regex"));

/// The authorization-relevant view of an HTTP request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// How the request was authenticated.
    pub auth_type: AuthType,
    /// Request headers, keys lowercased.
    pub headers: HashMap<String, Vec<String>>,
    /// Query parameters.
    pub query: HashMap<String, Vec<String>>,
    /// The peer address, `host:port` or bare host.
    pub remote_addr: String,
}

impl AuthRequest {
    /// An anonymous request with no headers, for internal callers.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            auth_type: AuthType::Anonymous,
            headers: HashMap::new(),
            query: HashMap::new(),
            remote_addr: String::new(),
        }
    }

    /// First value of a header, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// The client IP: `X-Forwarded-For` first element, else `X-Real-IP`,
    /// else the first `Forwarded: for=` element (quoted IPv6 brackets
    /// stripped), else the remote address.
    #[must_use]
    pub fn source_ip(&self) -> String {
        if let Some(fwd) = self.header("x-forwarded-for") {
            // Only the first (client) address; later entries are proxies.
            let first = fwd.split(", ").next().unwrap_or(fwd);
            if !first.is_empty() {
                return first.to_owned();
            }
        }
        if let Some(real) = self.header("x-real-ip") {
            if !real.is_empty() {
                return real.to_owned();
            }
        }
        if let Some(fwd) = self.header("forwarded") {
            if let Some(captures) = FORWARDED_FOR.captures(fwd) {
                if let Some(m) = captures.get(1) {
                    // IPv6 addresses arrive as quoted strings.
                    return m.as_str().trim_matches('"').to_owned();
                }
            }
        }
        // Strip a trailing :port if one is present.
        match self.remote_addr.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !host.is_empty() => {
                host.to_owned()
            }
            _ => self.remote_addr.clone(),
        }
    }

    /// Condition values fed to policy evaluation: the union of headers and
    /// query parameters plus the synthetic `SourceIp`.
    #[must_use]
    pub fn condition_values(&self) -> HashMap<String, Vec<String>> {
        let mut args: HashMap<String, Vec<String>> = HashMap::new();
        for (key, values) in &self.headers {
            args.entry(key.clone()).or_default().extend(values.clone());
        }
        for (key, values) in &self.query {
            args.entry(key.clone()).or_default().extend(values.clone());
        }
        args.insert("SourceIp".to_owned(), vec![self.source_ip()]);
        args
    }
}

/// The consumed signature-verification capability.
pub trait SignatureVerifier: Send + Sync {
    /// Verify the request signature and resolve the signing credential.
    ///
    /// # Errors
    ///
    /// The verifier's error is surfaced to the client verbatim.
    fn verify(&self, request: &AuthRequest) -> AuthResult<Credential>;
}
