//! Binding between a message's content protection and its protected content.
//!
//! A [`SecureReadable`] holds the content-protection algorithm of a message
//! together with the still-protected content. Once a recipient entry has
//! recovered the content key, [`SecureReadable::open`] turns the content into
//! a [`ContentStream`] that decrypts, MACs or digests while it is read.
//!
//! Streaming sources can be opened only once: the second attempt fails with
//! [`Error::AlreadyConsumed`]. Buffered sources can be opened any number of
//! times.

use core::fmt;
use std::cell::RefCell;
use std::io::{self, Cursor, Read};
use std::rc::Rc;

use digest::DynDigest;
use spki::AlgorithmIdentifierOwned;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::backend::{BackendError, ContentDecryptor, MacState};
use crate::errors::{Error, Result};
use crate::key::SymmetricKey;
use crate::resolver::Resolver;

const CHUNK_SIZE: usize = 4096;

/// How the content is protected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProtectionKind {
    /// Content is encrypted with the content key (EnvelopedData).
    Encipher,
    /// Content is in the clear and MACed with the content key (AuthenticatedData
    /// without authenticated attributes).
    Mac,
    /// Content is in the clear and digested; the MAC covers authenticated
    /// attributes carrying the digest (AuthenticatedData with authenticated
    /// attributes).
    DigestThenMac {
        /// Digest algorithm applied to the content.
        digest_algorithm: AlgorithmIdentifierOwned,
    },
}

/// Lifecycle of the content bound to a recipient entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ContentState {
    /// No content stream has been opened.
    #[default]
    Unopened,
    /// A content stream is open and has not been drained.
    Opened,
    /// The stream was read to the end; MAC and digest results are available.
    Consumed,
    /// Unprotecting the content failed; every further read repeats the error.
    Failed,
}

/// Results of a content stream, shared between the stream and the entry
/// that opened it.
#[derive(Debug, Default)]
pub(crate) struct ContentOutcome {
    pub(crate) state: ContentState,
    pub(crate) mac: Option<Vec<u8>>,
    pub(crate) digest: Option<Vec<u8>>,
}

pub(crate) type SharedOutcome = Rc<RefCell<ContentOutcome>>;

enum Source {
    Buffered(Rc<[u8]>),
    Streaming(RefCell<Option<Box<dyn Read>>>),
}

/// Content-protection algorithm plus the protected content of one message.
pub struct SecureReadable {
    algorithm: AlgorithmIdentifierOwned,
    kind: ProtectionKind,
    source: Source,
}

impl SecureReadable {
    /// Content held in memory; it can be opened repeatedly.
    pub fn buffered(
        algorithm: AlgorithmIdentifierOwned,
        kind: ProtectionKind,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            algorithm,
            kind,
            source: Source::Buffered(Rc::from(content)),
        }
    }

    /// Content read from a stream; it can be opened once.
    pub fn streaming(
        algorithm: AlgorithmIdentifierOwned,
        kind: ProtectionKind,
        reader: impl Read + 'static,
    ) -> Self {
        Self {
            algorithm,
            kind,
            source: Source::Streaming(RefCell::new(Some(Box::new(reader)))),
        }
    }

    /// Content encryption or MAC algorithm of the message.
    pub fn algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.algorithm
    }

    /// How the content is protected.
    pub fn kind(&self) -> &ProtectionKind {
        &self.kind
    }

    /// Whether the content comes from a read-once stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self.source, Source::Streaming(_))
    }

    /// Whether a streaming source has already been handed out.
    pub fn is_consumed(&self) -> bool {
        match &self.source {
            Source::Buffered(_) => false,
            Source::Streaming(reader) => reader.borrow().is_none(),
        }
    }

    /// Open the content under a recovered content key.
    ///
    /// The protection transform is set up before a streaming source is
    /// taken, so a key that does not fit the algorithm leaves the source
    /// available.
    pub fn open(
        &self,
        resolver: &Resolver,
        key: &SymmetricKey,
        backend: Option<&str>,
    ) -> Result<ContentStream> {
        if self.is_consumed() {
            return Err(Error::AlreadyConsumed);
        }

        let transform = match &self.kind {
            ProtectionKind::Encipher => {
                let cipher = resolver.resolve_cipher(&self.algorithm.oid, backend)?;
                let iv = resolver.content_iv(&self.algorithm, backend)?;
                Transform::Decrypt(cipher.decryptor(key, &iv)?)
            }
            ProtectionKind::Mac => {
                let mac = resolver.resolve_mac(&self.algorithm.oid, backend)?;
                Transform::Mac(mac.start(key)?)
            }
            ProtectionKind::DigestThenMac { digest_algorithm } => {
                Transform::Digest(resolver.resolve_digest(&digest_algorithm.oid, backend)?)
            }
        };

        let inner: Box<dyn Read> = match &self.source {
            Source::Buffered(bytes) => Box::new(Cursor::new(Rc::clone(bytes))),
            Source::Streaming(reader) => reader.borrow_mut().take().ok_or(Error::AlreadyConsumed)?,
        };
        debug!("opened content protected with {}", self.algorithm.oid);

        let outcome = SharedOutcome::default();
        outcome.borrow_mut().state = ContentState::Opened;
        Ok(ContentStream {
            inner,
            transform,
            out: Vec::new(),
            pos: 0,
            outcome,
        })
    }

    /// MAC over `data` with the message's MAC algorithm, as needed to check
    /// authenticated attributes.
    pub fn compute_mac(
        &self,
        resolver: &Resolver,
        key: &SymmetricKey,
        data: &[u8],
        backend: Option<&str>,
    ) -> Result<Vec<u8>> {
        let mac = resolver.resolve_mac(&self.algorithm.oid, backend)?;
        let mut state = mac.start(key)?;
        state.update(data);
        Ok(state.finalize())
    }
}

impl fmt::Debug for SecureReadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureReadable")
            .field("algorithm", &self.algorithm.oid)
            .field("kind", &self.kind)
            .field("streaming", &self.is_streaming())
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

enum Transform {
    Decrypt(Box<dyn ContentDecryptor>),
    Mac(Box<dyn MacState>),
    Digest(Box<dyn DynDigest>),
    Finished,
    Failed(BackendError),
}

/// Readable view of the content, unprotected on the fly.
///
/// For encrypted content, padding is checked when the underlying source is
/// exhausted; a failure surfaces as an [`io::ErrorKind::InvalidData`] error
/// wrapping the crate [`Error`] and is returned again by every later read.
/// MAC and digest results become available once the stream has been read to
/// the end.
pub struct ContentStream {
    inner: Box<dyn Read>,
    transform: Transform,
    out: Vec<u8>,
    pos: usize,
    outcome: SharedOutcome,
}

impl ContentStream {
    pub(crate) fn outcome(&self) -> SharedOutcome {
        Rc::clone(&self.outcome)
    }

    /// Lifecycle state of this stream.
    pub fn state(&self) -> ContentState {
        self.outcome.borrow().state
    }

    /// Computed MAC, once the stream is drained.
    pub fn mac(&self) -> Option<Vec<u8>> {
        self.outcome.borrow().mac.clone()
    }

    /// Computed content digest, once the stream is drained.
    pub fn digest(&self) -> Option<Vec<u8>> {
        self.outcome.borrow().digest.clone()
    }

    /// Read the remaining content into memory.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.read_to_end(&mut content).map_err(from_io)?;
        Ok(content)
    }

    /// Pull the next chunk from the source through the transform.
    fn fill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.pos = 0;

        let mut chunk = [0u8; CHUNK_SIZE];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            return self.finish();
        }

        let chunk = &chunk[..n];
        let result = match &mut self.transform {
            Transform::Decrypt(decryptor) => decryptor.update(chunk, &mut self.out),
            Transform::Mac(state) => {
                state.update(chunk);
                self.out.extend_from_slice(chunk);
                Ok(())
            }
            Transform::Digest(digest) => {
                digest.update(chunk);
                self.out.extend_from_slice(chunk);
                Ok(())
            }
            Transform::Finished | Transform::Failed(_) => Ok(()),
        };
        result.map_err(|err| self.fail(err))
    }

    fn finish(&mut self) -> io::Result<()> {
        match core::mem::replace(&mut self.transform, Transform::Finished) {
            Transform::Decrypt(decryptor) => {
                if let Err(err) = decryptor.finish(&mut self.out) {
                    return Err(self.fail(err));
                }
            }
            Transform::Mac(state) => self.outcome.borrow_mut().mac = Some(state.finalize()),
            Transform::Digest(mut digest) => {
                self.outcome.borrow_mut().digest = Some(digest.finalize_reset().to_vec())
            }
            Transform::Finished => {}
            Transform::Failed(err) => {
                self.transform = Transform::Failed(err.clone());
                return Err(to_io(err.into()));
            }
        }
        self.outcome.borrow_mut().state = ContentState::Consumed;
        Ok(())
    }

    /// Poison the stream: drop any plaintext not yet handed out and keep
    /// the error for later reads.
    fn fail(&mut self, err: BackendError) -> io::Error {
        self.out.clear();
        self.pos = 0;
        self.transform = Transform::Failed(err.clone());
        self.outcome.borrow_mut().state = ContentState::Failed;
        to_io(err.into())
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.out.len() {
            match &self.transform {
                Transform::Finished => return Ok(0),
                Transform::Failed(err) => return Err(to_io(err.clone().into())),
                _ => self.fill()?,
            }
        }

        let n = buf.len().min(self.out.len() - self.pos);
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Compare a computed MAC with an expected one in constant time.
pub(crate) fn check_mac(computed: Option<&[u8]>, expected: &[u8]) -> Result<()> {
    match computed {
        Some(computed) if bool::from(computed.ct_eq(expected)) => Ok(()),
        _ => Err(Error::Verification),
    }
}

fn to_io(err: Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Unwrap a crate error carried through `io::Error`.
pub(crate) fn from_io(err: io::Error) -> Error {
    if err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
        if let Some(inner) = err.into_inner() {
            if let Ok(err) = inner.downcast::<Error>() {
                return *err;
            }
        }
        return Error::Verification;
    }
    Error::MalformedRecord(format!("content read failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oids;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn encrypted(resolver: &Resolver, key: &SymmetricKey) -> (AlgorithmIdentifierOwned, Vec<u8>) {
        let mut rng = ChaCha8Rng::from_seed([6; 32]);
        let algorithm = resolver
            .generate_content_algorithm(&oids::AES128_CBC, None, &mut rng)
            .unwrap();
        let ciphertext = resolver
            .encrypt_content(&algorithm, key, b"hello, recipients", None)
            .unwrap();
        (algorithm, ciphertext)
    }

    #[test]
    fn test_streaming_opens_once() {
        let resolver = Resolver::new();
        let key = SymmetricKey::aes([1u8; 16]);
        let (algorithm, ciphertext) = encrypted(&resolver, &key);

        let readable =
            SecureReadable::streaming(algorithm, ProtectionKind::Encipher, Cursor::new(ciphertext));
        let stream = readable.open(&resolver, &key, None).unwrap();
        assert_eq!(stream.into_bytes().unwrap(), b"hello, recipients");
        assert!(readable.is_consumed());
        assert!(matches!(
            readable.open(&resolver, &key, None),
            Err(Error::AlreadyConsumed)
        ));
    }

    #[test]
    fn test_bad_key_leaves_stream_available() {
        let resolver = Resolver::new();
        let key = SymmetricKey::aes([1u8; 16]);
        let (algorithm, ciphertext) = encrypted(&resolver, &key);

        let readable =
            SecureReadable::streaming(algorithm, ProtectionKind::Encipher, Cursor::new(ciphertext));
        assert!(readable.open(&resolver, &SymmetricKey::aes([1u8; 5]), None).is_err());
        assert!(!readable.is_consumed());
        assert!(readable.open(&resolver, &key, None).is_ok());
    }

    #[test]
    fn test_state_transitions() {
        let resolver = Resolver::new();
        let key = SymmetricKey::aes([1u8; 16]);
        let (algorithm, ciphertext) = encrypted(&resolver, &key);

        let readable = SecureReadable::buffered(algorithm, ProtectionKind::Encipher, ciphertext);
        let mut stream = readable.open(&resolver, &key, None).unwrap();
        assert_eq!(stream.state(), ContentState::Opened);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(stream.state(), ContentState::Consumed);
        assert_eq!(out, b"hello, recipients");
    }

    #[test]
    fn test_failure_is_sticky() {
        let resolver = Resolver::new();
        let key = SymmetricKey::aes([1u8; 16]);
        let (algorithm, mut ciphertext) = encrypted(&resolver, &key);
        ciphertext.pop();

        let readable = SecureReadable::buffered(algorithm, ProtectionKind::Encipher, ciphertext);
        let mut stream = readable.open(&resolver, &key, None).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(stream.read(&mut buf).unwrap(), 16);

        for _ in 0..3 {
            let err = stream.read(&mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
            assert!(matches!(from_io(err), Error::Backend(BackendError::Failed)));
            assert_eq!(stream.state(), ContentState::Failed);
        }
    }

    #[test]
    fn test_check_mac() {
        assert!(check_mac(Some(&b"tag"[..]), b"tag").is_ok());
        assert!(matches!(
            check_mac(Some(&b"tag"[..]), b"tax"),
            Err(Error::Verification)
        ));
        assert!(matches!(check_mac(None, b"tag"), Err(Error::Verification)));
    }
}
