use cms::enveloped_data::{KeyAgreeRecipientInfo, OriginatorIdentifierOrKey, OriginatorPublicKey};
use der::Decode;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use zeroize::Zeroizing;

use super::{RecipientEntry, RecoveryContext};
use crate::algorithms::kdf::agreed_wrap_key;
use crate::asn1::{decode_any, is_absent_or_null, MqvUserKeyingMaterial};
use crate::errors::{Error, RecoveryErrorKind, Result};
use crate::key::{AgreementKeyMaterial, PrivateKey, SymmetricKey};
use crate::recipient_id::{CertificateId, RecipientId};

/// Key agreement entry for one recipient encrypted key of a record.
#[derive(Debug)]
pub struct KeyAgreeRecipientInformation {
    entry: RecipientEntry,
    originator: OriginatorIdentifierOrKey,
    ukm: Option<Vec<u8>>,
    encrypted_key: Vec<u8>,
}

impl KeyAgreeRecipientInformation {
    pub(super) fn parse(info: &KeyAgreeRecipientInfo, context: &RecoveryContext) -> Result<Vec<Self>> {
        info.recipient_enc_keys
            .iter()
            .map(|rek| {
                let rid = RecipientId::key_agree(CertificateId::try_from(&rek.rid)?);
                Ok(Self {
                    entry: RecipientEntry::new(rid, info.key_enc_alg.clone(), context),
                    originator: info.originator.clone(),
                    ukm: info.ukm.as_ref().map(|ukm| ukm.as_bytes().to_vec()),
                    encrypted_key: rek.enc_key.as_bytes().to_vec(),
                })
            })
            .collect()
    }

    /// State common to every variant.
    pub fn entry(&self) -> &RecipientEntry {
        &self.entry
    }

    /// Originator field of the record.
    pub fn originator(&self) -> &OriginatorIdentifierOrKey {
        &self.originator
    }

    /// User keying material of the record.
    pub fn ukm(&self) -> Option<&[u8]> {
        self.ukm.as_deref()
    }

    /// Wrapped content key for this recipient.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Key wrap algorithm nested in the key-encryption algorithm parameters.
    pub fn wrap_algorithm(&self) -> Result<AlgorithmIdentifierOwned> {
        let params = self
            .entry
            .key_encryption_algorithm()
            .parameters
            .as_ref()
            .ok_or_else(|| {
                Error::MalformedRecord("key agreement record without key wrap algorithm".into())
            })?;
        Ok(decode_any(params)?)
    }

    /// Agree with the originator using the recipient's private key and
    /// unwrap the content key.
    pub fn recover_with_private_key(&self, private_key: &PrivateKey) -> Result<SymmetricKey> {
        self.entry.recover(|| self.unwrap_key(private_key))
    }

    fn unwrap_key(&self, private_key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>> {
        let context = self.entry.context();
        let resolver = context.resolver();
        let backend = context.backend();
        let agreement_oid = self.entry.key_encryption_algorithm().oid;
        let wrap = self.wrap_algorithm()?;

        let sender = match &self.originator {
            OriginatorIdentifierOrKey::OriginatorKey(key) => {
                sender_public_key(key, private_key).ok_or_else(|| {
                    Error::recovery(agreement_oid, RecoveryErrorKind::InvalidCredential)
                })?
            }
            _ => {
                return Err(Error::recovery(
                    agreement_oid,
                    RecoveryErrorKind::UnsupportedOriginator,
                ))
            }
        };

        let (private_key, public_key) = if resolver.registry().is_mqv(&agreement_oid) {
            let ukm = self.ukm.as_deref().ok_or_else(|| {
                Error::MalformedRecord("MQV record without user keying material".into())
            })?;
            let mqv = MqvUserKeyingMaterial::from_der(ukm)?;
            let ephemeral = sender_public_key(&mqv.ephemeral_public_key, private_key)
                .ok_or_else(|| Error::recovery(agreement_oid, RecoveryErrorKind::InvalidCredential))?;
            (
                AgreementKeyMaterial::lift(private_key),
                AgreementKeyMaterial::StaticPlusEphemeral {
                    static_key: sender,
                    ephemeral_key: ephemeral,
                },
            )
        } else {
            (
                AgreementKeyMaterial::Static(private_key.clone()),
                AgreementKeyMaterial::Static(sender),
            )
        };

        let agreement = resolver.resolve_key_agreement(&agreement_oid, backend)?;
        let z = agreement.agree(&private_key, &public_key)?;
        let kek = agreed_wrap_key(
            resolver,
            backend,
            &agreement_oid,
            &wrap.oid,
            &z,
            self.ukm.as_deref(),
        )?;

        let wrapper = resolver.resolve_key_wrapper(&wrap.oid, backend)?;
        Ok(wrapper.unwrap(&kek, &self.encrypted_key)?)
    }
}

/// Rebuild an originator public key as a full SPKI. Absent or `NULL` domain
/// parameters are taken from the recipient's key, which must be of the same
/// algorithm.
fn sender_public_key(
    key: &OriginatorPublicKey,
    private_key: &PrivateKey,
) -> Option<SubjectPublicKeyInfoOwned> {
    let own = private_key.algorithm();
    if key.algorithm.oid != own.oid {
        return None;
    }
    let algorithm = if is_absent_or_null(key.algorithm.parameters.as_ref()) {
        own.clone()
    } else {
        key.algorithm.clone()
    };
    Some(SubjectPublicKeyInfoOwned {
        algorithm,
        subject_public_key: key.public_key.clone(),
    })
}
