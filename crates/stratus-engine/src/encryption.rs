//! Server-side-encryption state for the write and read paths.
//!
//! Object data is encrypted with AES-256-CTR using a per-object (or
//! per-part) random IV. For SSE-S3 the data key is generated at create time
//! and stored sealed under the process master key (AES-256-GCM, nonce
//! prepended). SSE-C keys are supplied per request and never stored.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::anyhow;
use rand::Rng;

use crate::config::MASTER_KEY_LEN;
use crate::error::{EngineError, EngineResult};
use stratus_meta::types::SseType;

/// Length of a data key.
pub const DATA_KEY_LEN: usize = 32;

/// Length of a streaming-cipher initialization vector.
pub const IV_LEN: usize = 16;

/// Length of the GCM nonce prepended to a sealed key.
const SEAL_NONCE_LEN: usize = 12;

/// The encryption settings carried by a request.
#[derive(Debug, Clone, Default)]
pub struct SseRequest {
    /// Requested variant.
    pub sse_type: SseType,
    /// SSE-C algorithm header (`AES256`).
    pub customer_algorithm: String,
    /// SSE-C key material.
    pub customer_key: Vec<u8>,
    /// SSE-C key MD5 header, for echo in responses.
    pub customer_key_md5: String,
    /// SSE-KMS key id.
    pub kms_key_id: String,
}

impl SseRequest {
    /// No encryption requested.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// SSE-S3: system-managed key.
    #[must_use]
    pub fn s3() -> Self {
        Self {
            sse_type: SseType::S3,
            ..Self::default()
        }
    }

    /// SSE-C with a customer-provided key.
    #[must_use]
    pub fn customer(key: Vec<u8>) -> Self {
        Self {
            sse_type: SseType::SseC,
            customer_algorithm: "AES256".to_owned(),
            customer_key: key,
            ..Self::default()
        }
    }
}

/// A fresh random IV for the streaming cipher.
#[must_use]
pub fn new_initialization_vector() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv);
    iv.to_vec()
}

/// A fresh random data key.
#[must_use]
pub fn generate_data_key() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut key = [0u8; DATA_KEY_LEN];
    rng.fill(&mut key);
    key.to_vec()
}

/// Seal a data key under the master key. The GCM nonce is prepended to the
/// ciphertext.
///
/// # Errors
///
/// Returns an internal error when the cipher rejects the key material.
pub fn seal_data_key(master: &[u8; MASTER_KEY_LEN], plaintext: &[u8]) -> EngineResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(master)
        .map_err(|e| EngineError::Internal(anyhow!("master key: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| EngineError::Internal(anyhow!("seal data key: {e}")))?;
    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Unseal a data key sealed by [`seal_data_key`].
///
/// # Errors
///
/// Returns an internal error for truncated or tampered sealed keys.
pub fn unseal_data_key(master: &[u8; MASTER_KEY_LEN], sealed: &[u8]) -> EngineResult<Vec<u8>> {
    if sealed.len() < SEAL_NONCE_LEN {
        return Err(EngineError::Internal(anyhow!("sealed key too short")));
    }
    let cipher = Aes256Gcm::new_from_slice(master)
        .map_err(|e| EngineError::Internal(anyhow!("master key: {e}")))?;
    let (nonce, ciphertext) = sealed.split_at(SEAL_NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| EngineError::Internal(anyhow!("unseal data key: {e}")))
}

/// Resolve the (plaintext, sealed) key pair for a new single-part write or a
/// multipart create.
///
/// # Errors
///
/// - [`EngineError::InvalidSseHeader`] for malformed SSE-C key material.
/// - [`EngineError::NotImplemented`] for SSE-KMS.
pub fn encryption_keys_from_sse_request(
    master: &[u8; MASTER_KEY_LEN],
    sse: &SseRequest,
) -> EngineResult<(Vec<u8>, Vec<u8>)> {
    match sse.sse_type {
        SseType::None => Ok((Vec::new(), Vec::new())),
        SseType::S3 => {
            let data_key = generate_data_key();
            let sealed = seal_data_key(master, &data_key)?;
            Ok((data_key, sealed))
        }
        SseType::SseC => {
            if sse.customer_key.len() != DATA_KEY_LEN {
                return Err(EngineError::InvalidSseHeader);
            }
            Ok((sse.customer_key.clone(), Vec::new()))
        }
        SseType::S3Kms => Err(EngineError::NotImplemented),
    }
}

/// Resolve the key used to encrypt one part, given the upload's declared
/// encryption state and the per-part request headers.
///
/// SSE-C uploads must re-present matching SSE-C headers on every part.
///
/// # Errors
///
/// - [`EngineError::InvalidSseHeader`] when the per-part headers do not match
///   the upload's declared type.
/// - [`EngineError::NotImplemented`] for SSE-KMS uploads.
pub fn resolve_part_key(
    upload_sse_type: SseType,
    upload_data_key: &[u8],
    request: &SseRequest,
) -> EngineResult<Vec<u8>> {
    match upload_sse_type {
        SseType::None => Ok(Vec::new()),
        SseType::SseC => {
            if request.sse_type != SseType::SseC
                || request.customer_key.len() != DATA_KEY_LEN
            {
                return Err(EngineError::InvalidSseHeader);
            }
            Ok(request.customer_key.clone())
        }
        SseType::S3 => Ok(upload_data_key.to_vec()),
        SseType::S3Kms => Err(EngineError::NotImplemented),
    }
}

/// Resolve the key needed to read an object back.
///
/// # Errors
///
/// - [`EngineError::InvalidSseHeader`] when an SSE-C object is read without
///   matching key material.
/// - [`EngineError::NotImplemented`] for SSE-KMS objects.
pub fn resolve_read_key(
    master: &[u8; MASTER_KEY_LEN],
    object_sse_type: SseType,
    sealed_key: &[u8],
    request: &SseRequest,
) -> EngineResult<Vec<u8>> {
    match object_sse_type {
        SseType::None => Ok(Vec::new()),
        SseType::S3 => unseal_data_key(master, sealed_key),
        SseType::SseC => {
            if request.sse_type != SseType::SseC
                || request.customer_key.len() != DATA_KEY_LEN
            {
                return Err(EngineError::InvalidSseHeader);
            }
            Ok(request.customer_key.clone())
        }
        SseType::S3Kms => Err(EngineError::NotImplemented),
    }
}
