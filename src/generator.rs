//! Protect side: producing `RecipientInfo` records for a content key.
//!
//! Each generator delivers the content key to one recipient (or, for key
//! agreement, one group of recipients sharing an originator key) and emits
//! the matching wire record. Generators consume randomness from the caller's
//! RNG and have no other side effects.

mod kek;
mod key_agree;
mod key_trans;
mod password;

pub use self::kek::KekRecipientInfoGenerator;
pub use self::key_agree::KeyAgreeRecipientInfoGenerator;
pub use self::key_trans::KeyTransRecipientInfoGenerator;
pub use self::password::PasswordRecipientInfoGenerator;

use cms::enveloped_data::{RecipientInfo, RecipientInfos};
use der::asn1::ObjectIdentifier;
use rand_core::CryptoRngCore;

use crate::backend::BackendError;
use crate::errors::{Error, Result};
use crate::key::SymmetricKey;
use crate::resolver::Resolver;

/// Producer of one `RecipientInfo` record.
pub trait RecipientInfoGenerator {
    /// Protect `content_key` for this generator's recipient(s).
    fn generate(
        &self,
        content_key: &SymmetricKey,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<RecipientInfo>;
}

/// Run every generator over the same content key and collect the records
/// into a DER `SET OF RecipientInfo`.
pub fn generate_recipient_infos(
    generators: &[&dyn RecipientInfoGenerator],
    content_key: &SymmetricKey,
    rng: &mut dyn CryptoRngCore,
) -> Result<RecipientInfos> {
    let infos = generators
        .iter()
        .map(|generator| generator.generate(content_key, rng))
        .collect::<Result<Vec<_>>>()?;
    Ok(RecipientInfos::try_from(infos)?)
}

/// Generate a content key for `algorithm`; see [`Resolver::generate_content_key`].
pub fn generate_content_key(
    resolver: &Resolver,
    algorithm: &ObjectIdentifier,
    backend: Option<&str>,
    rng: &mut dyn CryptoRngCore,
) -> Result<SymmetricKey> {
    resolver.generate_content_key(algorithm, backend, rng)
}

/// Attach the algorithm being applied to a backend failure.
pub(crate) fn establishment(algorithm: ObjectIdentifier) -> impl Fn(BackendError) -> Error {
    move |source| Error::KeyEstablishment { algorithm, source }
}
