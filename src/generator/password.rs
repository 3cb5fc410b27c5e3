use cms::content_info::CmsVersion;
use cms::enveloped_data::{PasswordRecipientInfo, RecipientInfo};
use der::asn1::{ObjectIdentifier, OctetString};
use rand_core::CryptoRngCore;
use spki::AlgorithmIdentifierOwned;

use super::{establishment, RecipientInfoGenerator};
use crate::asn1::{algorithm_with_null, encode_any, Pbkdf2Parameters};
use crate::backend::Capability;
use crate::errors::{Error, Result};
use crate::key::{KeyFamily, Password, SymmetricKey};
use crate::oids;
use crate::resolver::Resolver;

/// Password recipient (`pwri`), [RFC 3211]: PBKDF2 derives a key-encryption
/// key from the password, which wraps the content key with the RFC 3211
/// key wrap over `wrap_cipher` in CBC mode.
///
/// [RFC 3211]: https://www.rfc-editor.org/rfc/rfc3211
#[derive(Clone, Debug)]
pub struct PasswordRecipientInfoGenerator {
    resolver: Resolver,
    backend: Option<String>,
    wrap_cipher: ObjectIdentifier,
    password: Password,
    salt: Vec<u8>,
    iterations: u32,
    prf: AlgorithmIdentifierOwned,
}

impl PasswordRecipientInfoGenerator {
    /// Generator wrapping with the CBC cipher `wrap_cipher`, e.g. `aes128-CBC`.
    pub fn new(
        resolver: &Resolver,
        wrap_cipher: ObjectIdentifier,
        password: Password,
        salt: impl Into<Vec<u8>>,
        iterations: u32,
    ) -> Self {
        Self {
            resolver: resolver.clone(),
            backend: None,
            wrap_cipher,
            password,
            salt: salt.into(),
            iterations,
            prf: Pbkdf2Parameters::default_prf(),
        }
    }

    /// PBKDF2 pseudorandom function, e.g. `hmacWithSHA256`.
    pub fn with_prf(mut self, prf: ObjectIdentifier) -> Self {
        self.prf = algorithm_with_null(prf);
        self
    }

    /// Prefer the named backend.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    fn key_derivation_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        let params = Pbkdf2Parameters {
            salt: OctetString::new(self.salt.clone())?,
            iteration_count: self.iterations,
            key_length: None,
            prf: self.prf.clone(),
        };
        Ok(AlgorithmIdentifierOwned {
            oid: oids::PBKDF2,
            parameters: Some(encode_any(&params)?),
        })
    }
}

impl RecipientInfoGenerator for PasswordRecipientInfoGenerator {
    fn generate(
        &self,
        content_key: &SymmetricKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RecipientInfo> {
        let backend = self.backend.as_deref();
        let registry = self.resolver.registry();
        let bits = registry
            .key_size(&self.wrap_cipher)
            .ok_or(Error::AlgorithmUnavailable {
                capability: Capability::PasswordWrap,
                algorithm: self.wrap_cipher,
            })?;

        let kdf = self.resolver.resolve_password_kdf(&oids::PBKDF2, backend)?;
        let derived = kdf
            .derive(
                &self.password.to_bytes(),
                &self.salt,
                self.iterations,
                &self.prf.oid,
                bits / 8,
            )
            .map_err(establishment(oids::PBKDF2))?;
        let family = registry
            .family(&self.wrap_cipher)
            .unwrap_or(KeyFamily::Generic);
        let kek = SymmetricKey::new(family, derived.as_slice());

        let wrapper = self
            .resolver
            .resolve_password_wrapper(&self.wrap_cipher, backend)?;
        let mut iv = vec![0u8; wrapper.block_size()];
        rng.fill_bytes(&mut iv);
        let wrapped = wrapper
            .wrap(&kek, &iv, content_key.as_bytes(), rng)
            .map_err(establishment(oids::PWRI_KEK))?;

        let wrap_algorithm = AlgorithmIdentifierOwned {
            oid: self.wrap_cipher,
            parameters: Some(encode_any(&OctetString::new(iv)?)?),
        };
        Ok(RecipientInfo::Pwri(PasswordRecipientInfo {
            version: CmsVersion::V0,
            key_derivation_alg: Some(self.key_derivation_algorithm()?),
            key_enc_alg: AlgorithmIdentifierOwned {
                oid: oids::PWRI_KEK,
                parameters: Some(encode_any(&wrap_algorithm)?),
            },
            enc_key: OctetString::new(wrapped)?,
        }))
    }
}
