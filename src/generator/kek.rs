use cms::content_info::CmsVersion;
use cms::enveloped_data::{KekIdentifier, KekRecipientInfo, RecipientInfo};
use der::asn1::{GeneralizedTime, OctetString};
use rand_core::CryptoRngCore;
use x509_cert::attr::Attribute;

use super::{establishment, RecipientInfoGenerator};
use crate::asn1::wrap_algorithm;
use crate::errors::{Error, Result};
use crate::key::SymmetricKey;
use crate::resolver::Resolver;

/// Pre-shared key-encryption key (`kekri`).
///
/// The wrap algorithm follows from the KEK: AES, Camellia and SEED keys
/// select the matching RFC 3394 style wrap of the same size, a triple-DES
/// key selects the CMS triple-DES wrap.
#[derive(Clone, Debug)]
pub struct KekRecipientInfoGenerator {
    resolver: Resolver,
    backend: Option<String>,
    key_identifier: Vec<u8>,
    date: Option<GeneralizedTime>,
    other: Option<Attribute>,
    kek: SymmetricKey,
}

impl KekRecipientInfoGenerator {
    /// Recipient holding `kek` under `key_identifier`.
    pub fn new(resolver: &Resolver, key_identifier: impl Into<Vec<u8>>, kek: SymmetricKey) -> Self {
        Self {
            resolver: resolver.clone(),
            backend: None,
            key_identifier: key_identifier.into(),
            date: None,
            other: None,
            kek,
        }
    }

    /// Date field of the KEK identifier.
    pub fn with_date(mut self, date: GeneralizedTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Other-attribute field of the KEK identifier.
    pub fn with_other(mut self, other: Attribute) -> Self {
        self.other = Some(other);
        self
    }

    /// Prefer the named backend.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }
}

impl RecipientInfoGenerator for KekRecipientInfoGenerator {
    fn generate(
        &self,
        content_key: &SymmetricKey,
        _rng: &mut dyn CryptoRngCore,
    ) -> Result<RecipientInfo> {
        let wrap = self
            .resolver
            .registry()
            .kek_wrap_algorithm(self.kek.family(), self.kek.bits())
            .ok_or(Error::UnsupportedKeySize {
                family: self.kek.family(),
                bits: self.kek.bits(),
            })?;

        let wrapper = self
            .resolver
            .resolve_key_wrapper(&wrap, self.backend.as_deref())?;
        let wrapped = wrapper
            .wrap(&self.kek, content_key.as_bytes())
            .map_err(establishment(wrap))?;

        Ok(RecipientInfo::Kekri(KekRecipientInfo {
            version: CmsVersion::V4,
            kek_id: KekIdentifier {
                kek_identifier: OctetString::new(self.key_identifier.clone())?,
                date: self.date,
                other: self.other.clone(),
            },
            key_enc_alg: wrap_algorithm(wrap),
            encrypted_key: OctetString::new(wrapped)?,
        }))
    }
}
