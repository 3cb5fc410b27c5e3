//! Indexed collection of the recipient entries of one message.

use std::collections::HashMap;

use cms::enveloped_data::RecipientInfos;
use der::Decode;
use tracing::debug;

use crate::errors::Result;
use crate::recipient::{RecipientInformation, RecoveryContext};
use crate::recipient_id::RecipientId;

/// Recipient entries in message order, indexed by [`RecipientId`].
///
/// `size()` always equals the number of entries, and every entry sits in
/// exactly one id bucket.
#[derive(Debug, Default)]
pub struct RecipientInformationStore {
    all: Vec<RecipientInformation>,
    index: HashMap<RecipientId, Vec<usize>>,
}

impl RecipientInformationStore {
    /// Build a store over entries, keeping their order.
    pub fn from_entries(entries: impl IntoIterator<Item = RecipientInformation>) -> Self {
        let all: Vec<_> = entries.into_iter().collect();
        let mut index: HashMap<RecipientId, Vec<usize>> = HashMap::new();
        for (i, entry) in all.iter().enumerate() {
            index.entry(entry.rid().clone()).or_default().push(i);
        }
        debug!(
            "recipient store with {} entries under {} ids",
            all.len(),
            index.len()
        );
        Self { all, index }
    }

    /// Parse every record of a `SET OF RecipientInfo`.
    pub fn from_recipient_infos(
        infos: &RecipientInfos,
        context: &RecoveryContext,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(infos.0.len());
        for info in infos.0.iter() {
            entries.extend(RecipientInformation::from_recipient_info(info, context)?);
        }
        Ok(Self::from_entries(entries))
    }

    /// Parse a DER-encoded `SET OF RecipientInfo`.
    pub fn from_der(bytes: &[u8], context: &RecoveryContext) -> Result<Self> {
        Self::from_recipient_infos(&RecipientInfos::from_der(bytes)?, context)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.all.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// First entry for `rid`.
    pub fn get(&self, rid: &RecipientId) -> Option<&RecipientInformation> {
        self.index
            .get(rid)
            .and_then(|bucket| bucket.first())
            .map(|&i| &self.all[i])
    }

    /// Every entry for `rid`, in message order.
    pub fn get_all(&self, rid: &RecipientId) -> Vec<&RecipientInformation> {
        self.index
            .get(rid)
            .map(|bucket| bucket.iter().map(|&i| &self.all[i]).collect())
            .unwrap_or_default()
    }

    /// All entries in message order.
    pub fn all(&self) -> &[RecipientInformation] {
        &self.all
    }

    /// Distinct recipient ids.
    pub fn ids(&self) -> impl Iterator<Item = &RecipientId> {
        self.index.keys()
    }

    /// Iterate over the entries in message order.
    pub fn iter(&self) -> core::slice::Iter<'_, RecipientInformation> {
        self.all.iter()
    }
}

impl<'a> IntoIterator for &'a RecipientInformationStore {
    type Item = &'a RecipientInformation;
    type IntoIter = core::slice::Iter<'a, RecipientInformation>;

    fn into_iter(self) -> Self::IntoIter {
        self.all.iter()
    }
}

impl IntoIterator for RecipientInformationStore {
    type Item = RecipientInformation;
    type IntoIter = std::vec::IntoIter<RecipientInformation>;

    fn into_iter(self) -> Self::IntoIter {
        self.all.into_iter()
    }
}
