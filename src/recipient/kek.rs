use cms::enveloped_data::{KekIdentifier, KekRecipientInfo};
use zeroize::Zeroizing;

use super::{RecipientEntry, RecoveryContext};
use crate::errors::Result;
use crate::key::SymmetricKey;
use crate::recipient_id::RecipientId;

/// KEK entry.
///
/// The key identifier only names the KEK; the caller is responsible for
/// supplying the right one, and a wrong KEK shows up as a failed unwrap.
#[derive(Debug)]
pub struct KekRecipientInformation {
    entry: RecipientEntry,
    kek_id: KekIdentifier,
    encrypted_key: Vec<u8>,
}

impl KekRecipientInformation {
    pub(super) fn parse(info: &KekRecipientInfo, context: &RecoveryContext) -> Result<Self> {
        let rid = RecipientId::kek(info.kek_id.kek_identifier.as_bytes());
        Ok(Self {
            entry: RecipientEntry::new(rid, info.key_enc_alg.clone(), context),
            kek_id: info.kek_id.clone(),
            encrypted_key: info.encrypted_key.as_bytes().to_vec(),
        })
    }

    /// State common to every variant.
    pub fn entry(&self) -> &RecipientEntry {
        &self.entry
    }

    /// Full KEK identifier, including the optional date and attribute.
    pub fn kek_identifier(&self) -> &KekIdentifier {
        &self.kek_id
    }

    /// Wrapped content key.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Unwrap the content key with `kek`.
    pub fn recover_with_kek(&self, kek: &SymmetricKey) -> Result<SymmetricKey> {
        self.entry.recover(|| self.unwrap_key(kek))
    }

    fn unwrap_key(&self, kek: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>> {
        let context = self.entry.context();
        let oid = self.entry.key_encryption_algorithm().oid;
        let wrapper = context
            .resolver()
            .resolve_key_wrapper(&oid, context.backend())?;
        Ok(wrapper.unwrap(kek, &self.encrypted_key)?)
    }
}
