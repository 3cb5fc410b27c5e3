use cms::content_info::CmsVersion;
use cms::enveloped_data::{KeyTransRecipientInfo, RecipientInfo};
use der::asn1::OctetString;
use der::{Any, Tag};
use rand_core::CryptoRngCore;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use tracing::debug;
use x509_cert::Certificate;

use super::{establishment, RecipientInfoGenerator};
use crate::asn1::algorithm_with_null;
use crate::errors::Result;
use crate::key::SymmetricKey;
use crate::oids;
use crate::recipient_id::CertificateId;
use crate::resolver::Resolver;

/// Key transport (`ktri`): the content key encrypted to the recipient's
/// public key.
///
/// Defaults to `rsaEncryption` (PKCS #1 v1.5). The backend's dedicated key
/// wrap is tried first; a backend that only offers raw encryption encrypts
/// the key bytes instead.
#[derive(Clone, Debug)]
pub struct KeyTransRecipientInfoGenerator {
    resolver: Resolver,
    backend: Option<String>,
    recipient: CertificateId,
    public_key: SubjectPublicKeyInfoOwned,
    algorithm: AlgorithmIdentifierOwned,
}

impl KeyTransRecipientInfoGenerator {
    /// Recipient named by an explicit id and public key.
    pub fn new(
        resolver: &Resolver,
        recipient: CertificateId,
        public_key: SubjectPublicKeyInfoOwned,
    ) -> Self {
        Self {
            resolver: resolver.clone(),
            backend: None,
            recipient,
            public_key,
            algorithm: algorithm_with_null(oids::RSA_ENCRYPTION),
        }
    }

    /// Recipient named by the issuer and serial number of its certificate.
    pub fn from_certificate(resolver: &Resolver, cert: &Certificate) -> Result<Self> {
        Ok(Self::new(
            resolver,
            CertificateId::from_certificate(cert)?,
            cert.tbs_certificate.subject_public_key_info.clone(),
        ))
    }

    /// Use RSAES-OAEP with default (SHA-1) parameters.
    pub fn with_oaep(mut self) -> Self {
        // RSAES-OAEP-params with every field at its default
        self.algorithm = AlgorithmIdentifierOwned {
            oid: oids::RSAES_OAEP,
            parameters: Any::new(Tag::Sequence, Vec::<u8>::new()).ok(),
        };
        self
    }

    /// Use an explicit key encryption algorithm.
    pub fn with_key_encryption_algorithm(mut self, algorithm: AlgorithmIdentifierOwned) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Prefer the named backend.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }
}

impl RecipientInfoGenerator for KeyTransRecipientInfoGenerator {
    fn generate(
        &self,
        content_key: &SymmetricKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RecipientInfo> {
        let oid = self.algorithm.oid;
        let cipher = self
            .resolver
            .resolve_asymmetric_cipher(&oid, self.backend.as_deref())?;

        let encrypted = match cipher.wrap(&self.public_key, content_key, rng) {
            Ok(wrapped) => wrapped,
            Err(err) if err.is_capability_gap() => {
                debug!("no key wrap for {}, encrypting key bytes", oid);
                cipher
                    .encrypt(&self.public_key, content_key.as_bytes(), rng)
                    .map_err(establishment(oid))?
            }
            Err(err) => return Err(establishment(oid)(err)),
        };

        let version = match self.recipient {
            CertificateId::IssuerSerial { .. } => CmsVersion::V0,
            CertificateId::SubjectKeyId(_) => CmsVersion::V2,
        };
        Ok(RecipientInfo::Ktri(KeyTransRecipientInfo {
            version,
            rid: self.recipient.to_recipient_identifier()?,
            key_enc_alg: self.algorithm.clone(),
            enc_key: OctetString::new(encrypted)?,
        }))
    }
}
