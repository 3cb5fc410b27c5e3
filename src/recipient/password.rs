use cms::enveloped_data::PasswordRecipientInfo;
use der::asn1::OctetString;
use spki::AlgorithmIdentifierOwned;
use zeroize::Zeroizing;

use super::{RecipientEntry, RecoveryContext};
use crate::asn1::{decode_any, Pbkdf2Parameters};
use crate::errors::{Error, RecoveryErrorKind, Result};
use crate::key::{KeyFamily, Password, SymmetricKey};
use crate::oids;
use crate::recipient_id::RecipientId;

/// Password entry.
///
/// The password converter of the supplied [`Password`] must be the one
/// the sender used; otherwise a password with non-ASCII characters derives
/// a different key and the unwrap fails.
#[derive(Debug)]
pub struct PasswordRecipientInformation {
    entry: RecipientEntry,
    key_derivation_alg: AlgorithmIdentifierOwned,
    wrap_cipher: AlgorithmIdentifierOwned,
    iv: Vec<u8>,
    encrypted_key: Vec<u8>,
}

impl PasswordRecipientInformation {
    pub(super) fn parse(info: &PasswordRecipientInfo, context: &RecoveryContext) -> Result<Self> {
        let key_derivation_alg = info.key_derivation_alg.clone().ok_or_else(|| {
            Error::MalformedRecord("password record without key derivation algorithm".into())
        })?;

        let params = info.key_enc_alg.parameters.as_ref().ok_or_else(|| {
            Error::MalformedRecord("password record without key wrap parameters".into())
        })?;
        let wrap_cipher: AlgorithmIdentifierOwned = decode_any(params)
            .map_err(|err| Error::MalformedRecord(format!("password key wrap parameters: {}", err)))?;
        let iv = wrap_cipher
            .parameters
            .as_ref()
            .map(decode_any::<OctetString>)
            .transpose()
            .map_err(|err| Error::MalformedRecord(format!("password key wrap IV: {}", err)))?
            .ok_or_else(|| Error::MalformedRecord("password key wrap without IV".into()))?;

        Ok(Self {
            entry: RecipientEntry::new(RecipientId::password(), info.key_enc_alg.clone(), context),
            key_derivation_alg,
            wrap_cipher,
            iv: iv.as_bytes().to_vec(),
            encrypted_key: info.enc_key.as_bytes().to_vec(),
        })
    }

    /// State common to every variant.
    pub fn entry(&self) -> &RecipientEntry {
        &self.entry
    }

    /// Key derivation algorithm of the record.
    pub fn key_derivation_algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.key_derivation_alg
    }

    /// Block cipher of the RFC 3211 key wrap.
    pub fn wrap_cipher(&self) -> &AlgorithmIdentifierOwned {
        &self.wrap_cipher
    }

    /// Re-derive the key-encryption key from `password` and unwrap the
    /// content key.
    pub fn recover_with_password(&self, password: &Password) -> Result<SymmetricKey> {
        self.entry.recover(|| self.unwrap_key(password))
    }

    fn unwrap_key(&self, password: &Password) -> Result<Zeroizing<Vec<u8>>> {
        let context = self.entry.context();
        let resolver = context.resolver();
        let backend = context.backend();
        let algorithm = self.entry.key_encryption_algorithm().oid;

        if self.key_derivation_alg.oid != oids::PBKDF2 {
            return Err(Error::recovery(
                algorithm,
                RecoveryErrorKind::UnsupportedAlgorithm,
            ));
        }
        let params = self
            .key_derivation_alg
            .parameters
            .as_ref()
            .ok_or_else(|| Error::MalformedRecord("PBKDF2 without parameters".into()))?;
        let params: Pbkdf2Parameters = decode_any(params)?;

        let registry = resolver.registry();
        let key_len = match params.key_length {
            Some(len) => usize::from(len),
            None => registry
                .key_size(&self.wrap_cipher.oid)
                .map(|bits| bits / 8)
                .ok_or_else(|| Error::recovery(algorithm, RecoveryErrorKind::UnsupportedAlgorithm))?,
        };

        let kdf = resolver.resolve_password_kdf(&oids::PBKDF2, backend)?;
        let derived = kdf.derive(
            &password.to_bytes(),
            params.salt.as_bytes(),
            params.iteration_count,
            &params.prf.oid,
            key_len,
        )?;
        let family = registry
            .family(&self.wrap_cipher.oid)
            .unwrap_or(KeyFamily::Generic);
        let kek = SymmetricKey::new(family, derived.as_slice());

        let wrapper = resolver.resolve_password_wrapper(&self.wrap_cipher.oid, backend)?;
        Ok(wrapper.unwrap(&kek, &self.iv, &self.encrypted_key)?)
    }
}
