//! The streaming write/read pipeline.
//!
//! The write path composes, in order: a bounded reader (`AsyncReadExt::take`),
//! an MD5 tee ([`Md5Reader`]), optional AES-256-CTR encryption
//! ([`CtrCipherReader`]), and a QoS throttle ([`ThrottleReader`]). Every
//! stage is a lazy pull: nothing is buffered beyond the chunk in flight.
//! CTR is symmetric and seekable, so the same cipher reader serves decrypting
//! ranged reads.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use ctr::Ctr128BE;
use digest::Digest;
use md5::Md5;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{sleep_until, Instant, Sleep};

use crate::error::{EngineError, EngineResult};
use stratus_auth::AuthError;

type Aes256Ctr = Ctr128BE<Aes256>;

// ---------------------------------------------------------------------------
// Md5Reader
// ---------------------------------------------------------------------------

/// Handle onto the MD5 accumulator of an [`Md5Reader`], usable after the
/// reader has been consumed by the backend write.
#[derive(Clone)]
pub struct Md5Handle {
    hasher: Arc<Mutex<Md5>>,
}

impl Md5Handle {
    /// Hex digest of everything read so far.
    #[must_use]
    pub fn hex_digest(&self) -> String {
        hex::encode(self.hasher.lock().clone().finalize())
    }
}

/// Tees all bytes read through it into an MD5 accumulator.
pub struct Md5Reader<R> {
    inner: R,
    hasher: Arc<Mutex<Md5>>,
}

impl<R> Md5Reader<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Arc::new(Mutex::new(<Md5 as Digest>::new())),
        }
    }

    /// A handle that stays valid after the reader is consumed.
    #[must_use]
    pub fn handle(&self) -> Md5Handle {
        Md5Handle {
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Md5Reader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let filled = &buf.filled()[before..];
                if !filled.is_empty() {
                    Digest::update(&mut *this.hasher.lock(), filled);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// CtrCipherReader
// ---------------------------------------------------------------------------

/// Applies an AES-256-CTR keystream to the bytes flowing through it.
///
/// Encryption and decryption are the same operation; construct with
/// [`CtrCipherReader::with_offset`] to start the keystream mid-object for
/// ranged reads.
pub struct CtrCipherReader<R> {
    inner: R,
    cipher: Aes256Ctr,
}

impl<R> CtrCipherReader<R> {
    /// Wrap a reader with a keystream starting at offset zero.
    ///
    /// # Errors
    ///
    /// Returns an internal error for key or IV material of the wrong length.
    pub fn new(inner: R, key: &[u8], iv: &[u8]) -> EngineResult<Self> {
        let cipher = Aes256Ctr::new_from_slices(key, iv)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("ctr cipher init: {e}")))?;
        Ok(Self { inner, cipher })
    }

    /// Wrap a reader with the keystream seeked to `offset` plaintext bytes.
    ///
    /// # Errors
    ///
    /// Same as [`CtrCipherReader::new`].
    pub fn with_offset(inner: R, key: &[u8], iv: &[u8], offset: u64) -> EngineResult<Self> {
        let mut reader = Self::new(inner, key, iv)?;
        reader.cipher.seek(offset);
        Ok(reader)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CtrCipherReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let filled = &mut buf.filled_mut()[before..];
                if !filled.is_empty() {
                    this.cipher.apply_keystream(filled);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// ThrottleReader
// ---------------------------------------------------------------------------

/// Token-bucket throttle over an inner reader: at most `rate` bytes per
/// one-second window. A rate of zero passes everything through untouched.
pub struct ThrottleReader<R> {
    inner: R,
    rate: u64,
    window_start: Instant,
    consumed: u64,
    delay: Option<Pin<Box<Sleep>>>,
}

impl<R> ThrottleReader<R> {
    /// Wrap a reader with the given bytes-per-second budget.
    pub fn new(inner: R, rate: u64) -> Self {
        Self {
            inner,
            rate,
            window_start: Instant::now(),
            consumed: 0,
            delay: None,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottleReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.rate == 0 {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        }

        if let Some(delay) = this.delay.as_mut() {
            match delay.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(()) => {
                    this.delay = None;
                    this.window_start = Instant::now();
                    this.consumed = 0;
                }
            }
        }

        let now = Instant::now();
        if now.duration_since(this.window_start) >= Duration::from_secs(1) {
            this.window_start = now;
            this.consumed = 0;
        }

        if this.consumed >= this.rate {
            let mut delay = Box::pin(sleep_until(this.window_start + Duration::from_secs(1)));
            match delay.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    this.window_start = Instant::now();
                    this.consumed = 0;
                }
                Poll::Pending => {
                    this.delay = Some(delay);
                    return Poll::Pending;
                }
            }
        }

        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.consumed += (buf.filled().len() - before) as u64;
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamVerifier
// ---------------------------------------------------------------------------

/// Final verification hook for streaming-signed request bodies.
///
/// The write path calls [`StreamVerifier::verify`] once the body has been
/// fully consumed; a failure recycles the freshly written blob.
pub trait StreamVerifier: Send + Sync {
    /// Verify the fully consumed stream.
    ///
    /// # Errors
    ///
    /// The verifier's error is surfaced to the client verbatim.
    fn verify(&self) -> Result<(), AuthError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
