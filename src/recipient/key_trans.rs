use cms::enveloped_data::KeyTransRecipientInfo;
use tracing::debug;
use zeroize::Zeroizing;

use super::{RecipientEntry, RecoveryContext};
use crate::errors::Result;
use crate::key::{PrivateKey, SymmetricKey};
use crate::recipient_id::{CertificateId, RecipientId};

/// Key transport entry.
#[derive(Debug)]
pub struct KeyTransRecipientInformation {
    entry: RecipientEntry,
    encrypted_key: Vec<u8>,
}

impl KeyTransRecipientInformation {
    pub(super) fn parse(info: &KeyTransRecipientInfo, context: &RecoveryContext) -> Result<Self> {
        let rid = RecipientId::key_trans(CertificateId::try_from(&info.rid)?);
        Ok(Self {
            entry: RecipientEntry::new(rid, info.key_enc_alg.clone(), context),
            encrypted_key: info.enc_key.as_bytes().to_vec(),
        })
    }

    /// State common to every variant.
    pub fn entry(&self) -> &RecipientEntry {
        &self.entry
    }

    /// Encrypted content key.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Decrypt the content key with the recipient's private key.
    pub fn recover_with_private_key(&self, private_key: &PrivateKey) -> Result<SymmetricKey> {
        self.entry.recover(|| self.unwrap_key(private_key))
    }

    fn unwrap_key(&self, private_key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>> {
        let context = self.entry.context();
        let oid = self.entry.key_encryption_algorithm().oid;
        let cipher = context
            .resolver()
            .resolve_asymmetric_cipher(&oid, context.backend())?;

        match cipher.unwrap(private_key, &self.encrypted_key) {
            Ok(key) => Ok(key),
            Err(err) if err.is_capability_gap() => {
                debug!("no key unwrap for {}, decrypting key bytes", oid);
                Ok(cipher.decrypt(private_key, &self.encrypted_key)?)
            }
            Err(err) => Err(err.into()),
        }
    }
}
