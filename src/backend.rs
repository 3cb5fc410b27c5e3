//! Pluggable cryptographic backends.
//!
//! A [`Backend`] hands out capability objects by algorithm name. Names are
//! either the dotted form of an object identifier or a registered alias such
//! as `"AES/CBC/PKCS5Padding"` (see [`AlgorithmRegistry`]). Every lookup
//! defaults to [`BackendError::Unsupported`], so a backend only implements
//! the capabilities it actually has.
//!
//! [`AlgorithmRegistry`]: crate::resolver::AlgorithmRegistry

mod ecmqv;
mod rfc3211;
mod rustcrypto;

pub use self::rustcrypto::RustCryptoBackend;

use core::fmt;

use der::asn1::ObjectIdentifier;
use der::Any;
use digest::DynDigest;
use rand_core::CryptoRngCore;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use zeroize::Zeroizing;

use crate::key::{AgreementPrivateKey, AgreementPublicKey, PrivateKey, SymmetricKey};

/// Result type of backend operations.
pub type BackendResult<T> = core::result::Result<T, BackendError>;

/// Failure reported by a backend.
///
/// [`BackendError::Unsupported`] is the capability class: the backend does
/// not offer the operation at all, and callers may fall back to another
/// strategy. Every other variant is the key or operation class and is
/// always propagated.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum BackendError {
    /// The operation is not available for this algorithm.
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
        /// Algorithm name it was requested for.
        algorithm: String,
    },
    /// The key is malformed or of the wrong type or size.
    InvalidKey,
    /// Algorithm parameters are malformed or unsupported.
    InvalidParameters,
    /// The operation ran and failed, e.g. an integrity or padding check.
    Failed,
}

impl BackendError {
    /// Shorthand for [`BackendError::Unsupported`].
    pub fn unsupported(operation: &'static str, algorithm: impl Into<String>) -> Self {
        BackendError::Unsupported {
            operation,
            algorithm: algorithm.into(),
        }
    }

    /// Whether this error means the capability is missing rather than
    /// that the operation failed.
    pub fn is_capability_gap(&self) -> bool {
        matches!(self, BackendError::Unsupported { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unsupported {
                operation,
                algorithm,
            } => write!(f, "{} not supported for {}", operation, algorithm),
            BackendError::InvalidKey => write!(f, "invalid key"),
            BackendError::InvalidParameters => write!(f, "invalid algorithm parameters"),
            BackendError::Failed => write!(f, "operation failed"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<der::Error> for BackendError {
    fn from(_: der::Error) -> Self {
        BackendError::InvalidParameters
    }
}

/// Capabilities the resolver can look up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    /// Content encryption cipher.
    ContentCipher,
    /// Message authentication code.
    Mac,
    /// Symmetric key generator.
    KeyGenerator,
    /// Algorithm parameter codec.
    Parameters,
    /// Symmetric key wrap.
    KeyWrap,
    /// RFC 3211 password key wrap.
    PasswordWrap,
    /// Public-key encryption.
    AsymmetricCipher,
    /// Key agreement.
    KeyAgreement,
    /// Asymmetric key pair generator.
    KeyPairGenerator,
    /// Password-based key derivation.
    PasswordKdf,
    /// Message digest.
    Digest,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ContentCipher => "content cipher",
            Capability::Mac => "MAC",
            Capability::KeyGenerator => "key generator",
            Capability::Parameters => "parameter codec",
            Capability::KeyWrap => "key wrapper",
            Capability::PasswordWrap => "password key wrapper",
            Capability::AsymmetricCipher => "asymmetric cipher",
            Capability::KeyAgreement => "key agreement",
            Capability::KeyPairGenerator => "key pair generator",
            Capability::PasswordKdf => "password KDF",
            Capability::Digest => "digest",
        };
        f.write_str(name)
    }
}

/// Source of capability objects, addressed by algorithm name.
pub trait Backend: Send + Sync {
    /// Name used as a backend hint.
    fn name(&self) -> &str;

    /// Content encryption cipher.
    fn content_cipher(&self, algorithm: &str) -> BackendResult<Box<dyn ContentCipher>> {
        Err(BackendError::unsupported("content cipher", algorithm))
    }

    /// Message authentication code.
    fn mac(&self, algorithm: &str) -> BackendResult<Box<dyn MacAlgorithm>> {
        Err(BackendError::unsupported("MAC", algorithm))
    }

    /// Symmetric key generator.
    fn key_generator(&self, algorithm: &str) -> BackendResult<Box<dyn KeyGenerator>> {
        Err(BackendError::unsupported("key generator", algorithm))
    }

    /// Codec for the parameters of a cipher algorithm identifier.
    fn parameters(&self, algorithm: &str) -> BackendResult<Box<dyn ParameterCodec>> {
        Err(BackendError::unsupported("parameters", algorithm))
    }

    /// Symmetric key wrap.
    fn key_wrapper(&self, algorithm: &str) -> BackendResult<Box<dyn KeyWrapper>> {
        Err(BackendError::unsupported("key wrap", algorithm))
    }

    /// RFC 3211 key wrap over the named block cipher.
    fn password_wrapper(&self, algorithm: &str) -> BackendResult<Box<dyn PasswordWrapper>> {
        Err(BackendError::unsupported("password key wrap", algorithm))
    }

    /// Public-key encryption.
    fn asymmetric_cipher(&self, algorithm: &str) -> BackendResult<Box<dyn AsymmetricCipher>> {
        Err(BackendError::unsupported("asymmetric cipher", algorithm))
    }

    /// Key agreement.
    fn key_agreement(&self, algorithm: &str) -> BackendResult<Box<dyn KeyAgreement>> {
        Err(BackendError::unsupported("key agreement", algorithm))
    }

    /// Asymmetric key pair generator.
    fn key_pair_generator(&self, algorithm: &str) -> BackendResult<Box<dyn KeyPairGenerator>> {
        Err(BackendError::unsupported("key pair generator", algorithm))
    }

    /// Password-based key derivation.
    fn password_kdf(&self, algorithm: &str) -> BackendResult<Box<dyn PasswordKdf>> {
        Err(BackendError::unsupported("password KDF", algorithm))
    }

    /// Message digest.
    fn digest(&self, algorithm: &str) -> BackendResult<Box<dyn DynDigest>> {
        Err(BackendError::unsupported("digest", algorithm))
    }
}

/// Content encryption cipher.
pub trait ContentCipher {
    /// Block size in bytes; also the IV length.
    fn block_size(&self) -> usize;

    /// Encrypt and pad `plaintext` in one call.
    fn encrypt(&self, key: &SymmetricKey, iv: &[u8], plaintext: &[u8]) -> BackendResult<Vec<u8>>;

    /// Start an incremental decryption.
    fn decryptor(&self, key: &SymmetricKey, iv: &[u8]) -> BackendResult<Box<dyn ContentDecryptor>>;
}

/// Incremental decryption of content.
pub trait ContentDecryptor {
    /// Decrypt `input`, appending available plaintext to `output`.
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> BackendResult<()>;

    /// Check and strip padding, appending the remaining plaintext to `output`.
    fn finish(self: Box<Self>, output: &mut Vec<u8>) -> BackendResult<()>;
}

/// Message authentication code.
pub trait MacAlgorithm {
    /// Tag length in bytes.
    fn output_size(&self) -> usize;

    /// Start a MAC computation under `key`.
    fn start(&self, key: &SymmetricKey) -> BackendResult<Box<dyn MacState>>;
}

/// Running MAC computation.
pub trait MacState {
    /// Absorb data.
    fn update(&mut self, data: &[u8]);

    /// Produce the tag.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Symmetric key generator.
pub trait KeyGenerator {
    /// Generate a key of `bits` length, or of the algorithm's default length.
    fn generate(&self, bits: Option<usize>, rng: &mut dyn CryptoRngCore)
        -> BackendResult<SymmetricKey>;
}

/// Codec for cipher parameters carrying an initialization vector.
pub trait ParameterCodec {
    /// IV length in bytes.
    fn iv_len(&self) -> usize;

    /// Fresh random IV.
    fn generate_iv(&self, rng: &mut dyn CryptoRngCore) -> BackendResult<Vec<u8>>;

    /// Encode an IV as algorithm identifier parameters.
    fn encode(&self, iv: &[u8]) -> BackendResult<Any>;

    /// Extract the IV from algorithm identifier parameters.
    fn decode(&self, params: &Any) -> BackendResult<Vec<u8>>;
}

/// Symmetric key wrap such as RFC 3394.
pub trait KeyWrapper {
    /// Wrap `key` under `kek`.
    fn wrap(&self, kek: &SymmetricKey, key: &[u8]) -> BackendResult<Vec<u8>>;

    /// Unwrap `wrapped` under `kek`, verifying its integrity.
    fn unwrap(&self, kek: &SymmetricKey, wrapped: &[u8]) -> BackendResult<Zeroizing<Vec<u8>>>;
}

/// RFC 3211 key wrap, keyed by a password-derived key.
pub trait PasswordWrapper {
    /// Block size of the underlying cipher; also the IV length.
    fn block_size(&self) -> usize;

    /// Wrap `key` under `kek` with the given IV.
    fn wrap(
        &self,
        kek: &SymmetricKey,
        iv: &[u8],
        key: &[u8],
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<Vec<u8>>;

    /// Unwrap `wrapped` under `kek` with the given IV, checking length and check bytes.
    fn unwrap(&self, kek: &SymmetricKey, iv: &[u8], wrapped: &[u8])
        -> BackendResult<Zeroizing<Vec<u8>>>;
}

/// Public-key encryption used for key transport.
///
/// Backends with a dedicated key wrap operation override
/// [`AsymmetricCipher::wrap`] and [`AsymmetricCipher::unwrap`]; others only
/// implement raw encryption.
pub trait AsymmetricCipher {
    /// Wrap a symmetric key for `recipient`.
    fn wrap(
        &self,
        recipient: &SubjectPublicKeyInfoOwned,
        key: &SymmetricKey,
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<Vec<u8>> {
        let _ = (recipient, key, rng);
        Err(BackendError::unsupported("key wrap", "asymmetric cipher"))
    }

    /// Unwrap a symmetric key with `private_key`.
    fn unwrap(
        &self,
        private_key: &PrivateKey,
        wrapped: &[u8],
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        let _ = (private_key, wrapped);
        Err(BackendError::unsupported("key unwrap", "asymmetric cipher"))
    }

    /// Encrypt raw bytes for `recipient`.
    fn encrypt(
        &self,
        recipient: &SubjectPublicKeyInfoOwned,
        plaintext: &[u8],
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<Vec<u8>>;

    /// Decrypt raw bytes with `private_key`.
    fn decrypt(&self, private_key: &PrivateKey, ciphertext: &[u8])
        -> BackendResult<Zeroizing<Vec<u8>>>;
}

/// Raw key agreement producing the shared secret `Z`.
pub trait KeyAgreement {
    /// Compute the shared secret between `private_key` and `public_key`.
    fn agree(
        &self,
        private_key: &AgreementPrivateKey,
        public_key: &AgreementPublicKey,
    ) -> BackendResult<Zeroizing<Vec<u8>>>;
}

/// Asymmetric key pair generator.
pub trait KeyPairGenerator {
    /// Generate a key pair for the domain named by `parameters`, e.g.
    /// `id-ecPublicKey` with a named curve.
    fn generate(
        &self,
        parameters: &AlgorithmIdentifierOwned,
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<(PrivateKey, SubjectPublicKeyInfoOwned)>;
}

/// Password-based key derivation.
pub trait PasswordKdf {
    /// Derive `key_len` bytes from `password`.
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        prf: &ObjectIdentifier,
        key_len: usize,
    ) -> BackendResult<Zeroizing<Vec<u8>>>;
}
