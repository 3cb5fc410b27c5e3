//! Algorithm identifier resolution against pluggable backends.
//!
//! Every capability lookup runs the same strategy list:
//!
//! 1. the identifier's dotted form against the requested backend, or the
//!    default backend when none was requested;
//! 2. the registry name for the identifier against that same backend;
//! 3. when a specific backend was requested, steps 1 and 2 again against the
//!    default backend.
//!
//! Only [`BackendError::Unsupported`] advances to the next step. Any other
//! backend error ends resolution immediately.

mod registry;

pub use self::registry::{AlgorithmRegistry, RegistryBuilder};

use core::fmt;
use std::sync::Arc;

use der::asn1::ObjectIdentifier;
use der::{Any, Tag, Tagged};
use digest::DynDigest;
use rand_core::CryptoRngCore;
use spki::AlgorithmIdentifierOwned;
use tracing::debug;

use crate::asn1::is_absent_or_null;
use crate::backend::{
    AsymmetricCipher, Backend, BackendResult, Capability, ContentCipher, KeyAgreement,
    KeyGenerator, KeyPairGenerator, KeyWrapper, MacAlgorithm, ParameterCodec, PasswordKdf,
    PasswordWrapper, RustCryptoBackend,
};
use crate::errors::{Error, Result};
use crate::key::SymmetricKey;

/// Maps algorithm identifiers to backend capabilities.
///
/// Cloning is cheap; backends and the registry are shared.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<AlgorithmRegistry>,
    default_backend: Arc<dyn Backend>,
    backends: Vec<Arc<dyn Backend>>,
}

impl Resolver {
    /// Resolver over [`RustCryptoBackend`] with the standard registry.
    pub fn new() -> Self {
        ResolverBuilder::new().build()
    }

    /// Start configuring a resolver.
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    /// The registry in use.
    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// The backend used when no hint is given and as the final fallback.
    pub fn default_backend(&self) -> &dyn Backend {
        self.default_backend.as_ref()
    }

    /// Find a backend by name. `None` selects the default backend.
    pub fn backend(&self, hint: Option<&str>) -> Result<&dyn Backend> {
        match hint {
            None => Ok(self.default_backend.as_ref()),
            Some(name) if name == self.default_backend.name() => Ok(self.default_backend.as_ref()),
            Some(name) => self
                .backends
                .iter()
                .find(|backend| backend.name() == name)
                .map(|backend| backend.as_ref())
                .ok_or_else(|| Error::UnknownBackend(name.to_string())),
        }
    }

    fn try_backend<T>(
        &self,
        backend: &dyn Backend,
        oid: &ObjectIdentifier,
        alias: Option<&str>,
        lookup: &dyn Fn(&dyn Backend, &str) -> BackendResult<T>,
    ) -> Result<Option<T>> {
        match lookup(backend, &oid.to_string()) {
            Ok(found) => return Ok(Some(found)),
            Err(err) if err.is_capability_gap() => {}
            Err(err) => return Err(err.into()),
        }

        let Some(alias) = alias else {
            return Ok(None);
        };
        match lookup(backend, alias) {
            Ok(found) => {
                debug!(
                    "resolved {} as {} on backend {}",
                    oid,
                    alias,
                    backend.name()
                );
                Ok(Some(found))
            }
            Err(err) if err.is_capability_gap() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Run the resolution order for one capability.
    fn resolve_with<T>(
        &self,
        capability: Capability,
        oid: &ObjectIdentifier,
        alias: Option<&str>,
        hint: Option<&str>,
        lookup: &dyn Fn(&dyn Backend, &str) -> BackendResult<T>,
    ) -> Result<T> {
        let requested = self.backend(hint)?;
        if let Some(found) = self.try_backend(requested, oid, alias, lookup)? {
            return Ok(found);
        }

        if hint.is_some() && requested.name() != self.default_backend.name() {
            debug!(
                "{} for {} unavailable on backend {}, falling back to {}",
                capability,
                oid,
                requested.name(),
                self.default_backend.name()
            );
            if let Some(found) =
                self.try_backend(self.default_backend.as_ref(), oid, alias, lookup)?
            {
                return Ok(found);
            }
        }

        Err(Error::AlgorithmUnavailable {
            capability,
            algorithm: *oid,
        })
    }

    /// Content encryption cipher.
    pub fn resolve_cipher(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn ContentCipher>> {
        let alias = self.registry.cipher_name(oid);
        self.resolve_with(Capability::ContentCipher, oid, alias, backend, &|b, name| {
            b.content_cipher(name)
        })
    }

    /// Message authentication code.
    pub fn resolve_mac(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn MacAlgorithm>> {
        let alias = self.registry.mac_name(oid);
        self.resolve_with(Capability::Mac, oid, alias, backend, &|b, name| b.mac(name))
    }

    /// Symmetric key generator.
    pub fn resolve_key_generator(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn KeyGenerator>> {
        let alias = self.registry.base_name(oid);
        self.resolve_with(Capability::KeyGenerator, oid, alias, backend, &|b, name| {
            b.key_generator(name)
        })
    }

    /// Parameter codec for a cipher.
    pub fn resolve_params(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn ParameterCodec>> {
        let alias = self.registry.base_name(oid);
        self.resolve_with(Capability::Parameters, oid, alias, backend, &|b, name| {
            b.parameters(name)
        })
    }

    /// Symmetric key wrap.
    pub fn resolve_key_wrapper(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn KeyWrapper>> {
        let alias = self.registry.wrap_name(oid);
        self.resolve_with(Capability::KeyWrap, oid, alias, backend, &|b, name| {
            b.key_wrapper(name)
        })
    }

    /// RFC 3211 key wrap over the block cipher named by `oid`.
    pub fn resolve_password_wrapper(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn PasswordWrapper>> {
        let alias = self.registry.password_wrap_name(oid);
        self.resolve_with(
            Capability::PasswordWrap,
            oid,
            alias.as_deref(),
            backend,
            &|b, name| b.password_wrapper(name),
        )
    }

    /// Public-key encryption.
    pub fn resolve_asymmetric_cipher(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn AsymmetricCipher>> {
        let alias = self.registry.cipher_name(oid);
        self.resolve_with(Capability::AsymmetricCipher, oid, alias, backend, &|b, name| {
            b.asymmetric_cipher(name)
        })
    }

    /// Key agreement.
    pub fn resolve_key_agreement(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn KeyAgreement>> {
        let alias = self.registry.base_name(oid);
        self.resolve_with(Capability::KeyAgreement, oid, alias, backend, &|b, name| {
            b.key_agreement(name)
        })
    }

    /// Asymmetric key pair generator.
    pub fn resolve_key_pair_generator(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn KeyPairGenerator>> {
        let alias = self.registry.base_name(oid);
        self.resolve_with(Capability::KeyPairGenerator, oid, alias, backend, &|b, name| {
            b.key_pair_generator(name)
        })
    }

    /// Password-based key derivation.
    pub fn resolve_password_kdf(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn PasswordKdf>> {
        let alias = self.registry.base_name(oid);
        self.resolve_with(Capability::PasswordKdf, oid, alias, backend, &|b, name| {
            b.password_kdf(name)
        })
    }

    /// Message digest.
    pub fn resolve_digest(
        &self,
        oid: &ObjectIdentifier,
        backend: Option<&str>,
    ) -> Result<Box<dyn DynDigest>> {
        let alias = self.registry.digest_name(oid);
        self.resolve_with(Capability::Digest, oid, alias, backend, &|b, name| {
            b.digest(name)
        })
    }

    /// Generate a content key for `algorithm`, sized from the registry.
    pub fn generate_content_key(
        &self,
        algorithm: &ObjectIdentifier,
        backend: Option<&str>,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<SymmetricKey> {
        let generator = self.resolve_key_generator(algorithm, backend)?;
        Ok(generator.generate(self.registry.key_size(algorithm), rng)?)
    }

    /// Algorithm identifier for `algorithm` with a freshly generated IV.
    pub fn generate_content_algorithm(
        &self,
        algorithm: &ObjectIdentifier,
        backend: Option<&str>,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<AlgorithmIdentifierOwned> {
        let codec = self.resolve_params(algorithm, backend)?;
        let iv = codec.generate_iv(rng)?;
        Ok(AlgorithmIdentifierOwned {
            oid: *algorithm,
            parameters: Some(codec.encode(&iv)?),
        })
    }

    /// IV carried in the parameters of a content encryption algorithm.
    ///
    /// When no parameter codec resolves, parameters that are a bare
    /// OCTET STRING are taken as the IV.
    pub fn content_iv(
        &self,
        algorithm: &AlgorithmIdentifierOwned,
        backend: Option<&str>,
    ) -> Result<Vec<u8>> {
        let params = match &algorithm.parameters {
            Some(params) if !is_absent_or_null(Some(params)) => params,
            _ => {
                return Err(Error::MalformedRecord(format!(
                    "content algorithm {} has no IV",
                    algorithm.oid
                )))
            }
        };

        match self.resolve_params(&algorithm.oid, backend) {
            Ok(codec) => Ok(codec.decode(params)?),
            Err(Error::AlgorithmUnavailable { .. }) if params.tag() == Tag::OctetString => {
                debug!("no parameter codec for {}, reading IV as OCTET STRING", algorithm.oid);
                Ok(params.value().to_vec())
            }
            Err(err) => Err(err),
        }
    }

    /// Encrypt `plaintext` under `key` with the cipher and IV of `algorithm`.
    pub fn encrypt_content(
        &self,
        algorithm: &AlgorithmIdentifierOwned,
        key: &SymmetricKey,
        plaintext: &[u8],
        backend: Option<&str>,
    ) -> Result<Vec<u8>> {
        let cipher = self.resolve_cipher(&algorithm.oid, backend)?;
        let iv = self.content_iv(algorithm, backend)?;
        Ok(cipher.encrypt(key, &iv, plaintext)?)
    }

    /// Encoded parameters of a content encryption algorithm for a given IV.
    pub fn encode_iv(
        &self,
        algorithm: &ObjectIdentifier,
        iv: &[u8],
        backend: Option<&str>,
    ) -> Result<Any> {
        let codec = self.resolve_params(algorithm, backend)?;
        Ok(codec.encode(iv)?)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("default_backend", &self.default_backend.name())
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Resolver`].
pub struct ResolverBuilder {
    registry: AlgorithmRegistry,
    default_backend: Arc<dyn Backend>,
    backends: Vec<Arc<dyn Backend>>,
}

impl ResolverBuilder {
    /// [`RustCryptoBackend`] as default, standard registry, no other backends.
    pub fn new() -> Self {
        Self {
            registry: AlgorithmRegistry::default(),
            default_backend: Arc::new(RustCryptoBackend::new()),
            backends: Vec::new(),
        }
    }

    /// Replace the default backend.
    pub fn default_backend(mut self, backend: impl Backend + 'static) -> Self {
        self.default_backend = Arc::new(backend);
        self
    }

    /// Add a backend selectable by name through a hint.
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    /// Add a shared backend selectable by name through a hint.
    pub fn shared_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Replace the registry.
    pub fn registry(mut self, registry: AlgorithmRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Finish the resolver.
    pub fn build(self) -> Resolver {
        Resolver {
            registry: Arc::new(self.registry),
            default_backend: self.default_backend,
            backends: self.backends,
        }
    }
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
