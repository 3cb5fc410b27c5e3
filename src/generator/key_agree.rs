use cms::content_info::CmsVersion;
use cms::enveloped_data::{
    KeyAgreeRecipientInfo, OriginatorIdentifierOrKey, OriginatorPublicKey, RecipientEncryptedKey,
    RecipientInfo,
};
use der::asn1::{ObjectIdentifier, OctetString};
use der::Encode;
use rand_core::CryptoRngCore;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::Certificate;

use super::{establishment, RecipientInfoGenerator};
use crate::algorithms::kdf::agreed_wrap_key;
use crate::asn1::{algorithm_with_null, encode_any, MqvUserKeyingMaterial};
use crate::errors::Result;
use crate::key::{AgreementKeyMaterial, PrivateKey, SymmetricKey};
use crate::recipient_id::CertificateId;
use crate::resolver::Resolver;

/// Key agreement (`kari`): a wrap key per recipient derived from an
/// agreement between the sender's key and the recipient's public key.
///
/// All recipients added to one generator share a single record and the
/// same originator key. With an ECMQV scheme a fresh ephemeral key pair is
/// generated for each record and carried in its user keying material.
#[derive(Clone, Debug)]
pub struct KeyAgreeRecipientInfoGenerator {
    resolver: Resolver,
    backend: Option<String>,
    agreement: ObjectIdentifier,
    wrap: ObjectIdentifier,
    sender_private: PrivateKey,
    sender_public: SubjectPublicKeyInfoOwned,
    ukm: Option<Vec<u8>>,
    recipients: Vec<(CertificateId, SubjectPublicKeyInfoOwned)>,
}

impl KeyAgreeRecipientInfoGenerator {
    /// Generator for the agreement scheme `agreement` (e.g.
    /// `dhSinglePass-stdDH-sha256kdf-scheme`) wrapping with `wrap`.
    pub fn new(
        resolver: &Resolver,
        agreement: ObjectIdentifier,
        wrap: ObjectIdentifier,
        sender_private: PrivateKey,
        sender_public: SubjectPublicKeyInfoOwned,
    ) -> Self {
        Self {
            resolver: resolver.clone(),
            backend: None,
            agreement,
            wrap,
            sender_private,
            sender_public,
            ukm: None,
            recipients: Vec::new(),
        }
    }

    /// Add a recipient by id and public key.
    pub fn add_recipient(mut self, id: CertificateId, public_key: SubjectPublicKeyInfoOwned) -> Self {
        self.recipients.push((id, public_key));
        self
    }

    /// Add a recipient named by the issuer and serial number of its certificate.
    pub fn add_recipient_certificate(self, cert: &Certificate) -> Result<Self> {
        let id = CertificateId::from_certificate(cert)?;
        Ok(self.add_recipient(id, cert.tbs_certificate.subject_public_key_info.clone()))
    }

    /// User keying material mixed into the KDF.
    pub fn with_ukm(mut self, ukm: impl Into<Vec<u8>>) -> Self {
        self.ukm = Some(ukm.into());
        self
    }

    /// Prefer the named backend.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    fn is_mqv(&self) -> bool {
        self.resolver.registry().is_mqv(&self.agreement)
    }
}

impl RecipientInfoGenerator for KeyAgreeRecipientInfoGenerator {
    fn generate(
        &self,
        content_key: &SymmetricKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RecipientInfo> {
        let backend = self.backend.as_deref();
        let agreement = self.resolver.resolve_key_agreement(&self.agreement, backend)?;

        let (private_key, record_ukm) = if self.is_mqv() {
            let generator = self
                .resolver
                .resolve_key_pair_generator(&self.sender_public.algorithm.oid, backend)?;
            let (ephemeral_private, ephemeral_public) = generator
                .generate(&self.sender_public.algorithm, rng)
                .map_err(establishment(self.agreement))?;

            let ukm = MqvUserKeyingMaterial {
                ephemeral_public_key: originator_public_key(&ephemeral_public),
                added_ukm: self.ukm.clone().map(OctetString::new).transpose()?,
            };
            let private_key = AgreementKeyMaterial::StaticPlusEphemeral {
                static_key: self.sender_private.clone(),
                ephemeral_key: ephemeral_private,
            };
            (private_key, Some(ukm.to_der()?))
        } else {
            (
                AgreementKeyMaterial::Static(self.sender_private.clone()),
                self.ukm.clone(),
            )
        };

        let wrapper = self.resolver.resolve_key_wrapper(&self.wrap, backend)?;
        let mut recipient_enc_keys = Vec::with_capacity(self.recipients.len());
        for (id, public_key) in &self.recipients {
            let public_key = if self.is_mqv() {
                AgreementKeyMaterial::lift(public_key)
            } else {
                AgreementKeyMaterial::Static(public_key.clone())
            };
            let z = agreement
                .agree(&private_key, &public_key)
                .map_err(establishment(self.agreement))?;
            let kek = agreed_wrap_key(
                &self.resolver,
                backend,
                &self.agreement,
                &self.wrap,
                &z,
                record_ukm.as_deref(),
            )?;
            let wrapped = wrapper
                .wrap(&kek, content_key.as_bytes())
                .map_err(establishment(self.wrap))?;

            recipient_enc_keys.push(RecipientEncryptedKey {
                rid: id.to_key_agree_recipient_identifier()?,
                enc_key: OctetString::new(wrapped)?,
            });
        }

        Ok(RecipientInfo::Kari(KeyAgreeRecipientInfo {
            version: CmsVersion::V3,
            originator: OriginatorIdentifierOrKey::OriginatorKey(originator_public_key(
                &self.sender_public,
            )),
            ukm: record_ukm.map(OctetString::new).transpose()?,
            key_enc_alg: AlgorithmIdentifierOwned {
                oid: self.agreement,
                parameters: Some(encode_any(&algorithm_with_null(self.wrap))?),
            },
            recipient_enc_keys,
        }))
    }
}

/// Originator key as written on the wire: the bare key algorithm, with the
/// domain parameters left to the recipient's own key.
fn originator_public_key(public_key: &SubjectPublicKeyInfoOwned) -> OriginatorPublicKey {
    OriginatorPublicKey {
        algorithm: AlgorithmIdentifierOwned {
            oid: public_key.algorithm.oid,
            parameters: None,
        },
        public_key: public_key.subject_public_key.clone(),
    }
}
