//! Recovery side: parsed recipient records and content-key recovery.
//!
//! Every `RecipientInfo` of a message becomes one [`RecipientInformation`]
//! (key agreement records become one per encrypted key). An entry recovers
//! the content key from a matching [`Credential`] and then opens the
//! message content through the shared [`SecureReadable`].

mod kek;
mod key_agree;
mod key_trans;
mod password;

pub use self::kek::KekRecipientInformation;
pub use self::key_agree::KeyAgreeRecipientInformation;
pub use self::key_trans::KeyTransRecipientInformation;
pub use self::password::PasswordRecipientInformation;

use core::cell::RefCell;
use std::rc::Rc;

use cms::enveloped_data::RecipientInfo;
use der::asn1::ObjectIdentifier;
use spki::AlgorithmIdentifierOwned;
use tracing::debug;
use zeroize::Zeroizing;

use crate::backend::BackendError;
use crate::errors::{Error, RecoveryErrorKind, Result};
use crate::key::{Credential, KeyFamily, SymmetricKey};
use crate::recipient_id::RecipientId;
use crate::resolver::Resolver;
use crate::secure_readable::{check_mac, ContentState, ContentStream, SecureReadable, SharedOutcome};

/// What every entry of one message shares: the resolver, the protected
/// content and an optional backend hint.
#[derive(Clone, Debug)]
pub struct RecoveryContext {
    resolver: Resolver,
    content: Rc<SecureReadable>,
    backend: Option<String>,
}

impl RecoveryContext {
    /// Context for a message whose protected content is `content`.
    pub fn new(resolver: &Resolver, content: SecureReadable) -> Self {
        Self {
            resolver: resolver.clone(),
            content: Rc::new(content),
            backend: None,
        }
    }

    /// Prefer the named backend for recovery and content processing.
    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    /// Resolver used by the entries.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The protected content.
    pub fn content(&self) -> &SecureReadable {
        &self.content
    }

    /// Backend hint, if any.
    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }
}

/// State common to every recipient entry.
#[derive(Debug)]
pub struct RecipientEntry {
    rid: RecipientId,
    key_enc_alg: AlgorithmIdentifierOwned,
    context: RecoveryContext,
    recovered: RefCell<Option<SymmetricKey>>,
    outcome: RefCell<Option<SharedOutcome>>,
}

impl RecipientEntry {
    pub(crate) fn new(
        rid: RecipientId,
        key_enc_alg: AlgorithmIdentifierOwned,
        context: &RecoveryContext,
    ) -> Self {
        Self {
            rid,
            key_enc_alg,
            context: context.clone(),
            recovered: RefCell::new(None),
            outcome: RefCell::new(None),
        }
    }

    /// Recipient this entry was produced for.
    pub fn rid(&self) -> &RecipientId {
        &self.rid
    }

    /// Key-encryption algorithm of the record.
    pub fn key_encryption_algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.key_enc_alg
    }

    /// Content-protection algorithm of the enclosing message.
    pub fn content_algorithm(&self) -> &AlgorithmIdentifierOwned {
        self.context.content.algorithm()
    }

    pub(crate) fn context(&self) -> &RecoveryContext {
        &self.context
    }

    /// Content key from the last successful recovery.
    pub fn recovered_key(&self) -> Option<SymmetricKey> {
        self.recovered.borrow().clone()
    }

    /// Run one recovery attempt. The cached key is cleared first, so a
    /// failed attempt never leaves an older key behind.
    pub(crate) fn recover(
        &self,
        unwrap: impl FnOnce() -> Result<Zeroizing<Vec<u8>>>,
    ) -> Result<SymmetricKey> {
        self.recovered.replace(None);

        let algorithm = self.key_enc_alg.oid;
        let bytes = unwrap()
            .map_err(|err| classify(algorithm, err))
            .map_err(|err| err.for_recipient(&self.rid))?;
        let key = self.content_key(&bytes)?;

        debug!("recovered content key for {}", self.rid);
        self.recovered.replace(Some(key.clone()));
        Ok(key)
    }

    /// Type the recovered bytes for the content algorithm, rejecting a
    /// length the algorithm cannot use.
    fn content_key(&self, bytes: &[u8]) -> Result<SymmetricKey> {
        let registry = self.context.resolver.registry();
        let content_oid = self.content_algorithm().oid;
        let family = registry.family(&content_oid).unwrap_or(KeyFamily::Generic);

        if family != KeyFamily::Generic {
            if let Some(bits) = registry.key_size(&content_oid) {
                if bytes.len() * 8 != bits {
                    return Err(
                        Error::recovery(self.key_enc_alg.oid, RecoveryErrorKind::UnwrapFailed)
                            .for_recipient(&self.rid),
                    );
                }
            }
        }
        Ok(SymmetricKey::new(family, bytes))
    }

    /// Error for a credential of the wrong kind.
    pub(crate) fn invalid_credential(&self) -> Error {
        Error::recovery(self.key_enc_alg.oid, RecoveryErrorKind::InvalidCredential)
            .for_recipient(&self.rid)
    }

    /// Open the message content under the recovered key.
    pub fn open_content(&self) -> Result<ContentStream> {
        let key = self.recovered_key().ok_or(Error::NotRecovered)?;
        let context = &self.context;
        let stream = context
            .content
            .open(&context.resolver, &key, context.backend())?;
        self.outcome.replace(Some(stream.outcome()));
        Ok(stream)
    }

    /// Lifecycle of the content opened through this entry.
    pub fn state(&self) -> ContentState {
        self.outcome
            .borrow()
            .as_ref()
            .map_or(ContentState::Unopened, |outcome| outcome.borrow().state)
    }

    /// MAC computed over the content, once the stream is drained.
    pub fn mac(&self) -> Option<Vec<u8>> {
        self.outcome
            .borrow()
            .as_ref()
            .and_then(|outcome| outcome.borrow().mac.clone())
    }

    /// Content digest, once the stream is drained.
    pub fn digest(&self) -> Option<Vec<u8>> {
        self.outcome
            .borrow()
            .as_ref()
            .and_then(|outcome| outcome.borrow().digest.clone())
    }

    /// Compare the computed MAC with `expected` in constant time. Fails
    /// with [`Error::Verification`] until the stream has been drained.
    pub fn verify_mac(&self, expected: &[u8]) -> Result<()> {
        check_mac(self.mac().as_deref(), expected)
    }

    /// MAC over `data` under the recovered key, e.g. over authenticated
    /// attributes.
    pub fn compute_mac(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.recovered_key().ok_or(Error::NotRecovered)?;
        let context = &self.context;
        context
            .content
            .compute_mac(&context.resolver, &key, data, context.backend())
    }
}

/// Map a failure inside a recovery attempt onto [`Error::KeyRecovery`].
fn classify(algorithm: ObjectIdentifier, err: Error) -> Error {
    let kind = match &err {
        Error::AlgorithmUnavailable { .. } => RecoveryErrorKind::UnsupportedAlgorithm,
        Error::Backend(BackendError::Unsupported { .. }) => RecoveryErrorKind::UnsupportedAlgorithm,
        Error::Backend(BackendError::InvalidKey) => RecoveryErrorKind::InvalidCredential,
        Error::Backend(BackendError::InvalidParameters | BackendError::Failed) => {
            RecoveryErrorKind::UnwrapFailed
        }
        _ => return err,
    };
    Error::recovery(algorithm, kind)
}

/// A parsed recipient record.
#[derive(Debug)]
pub enum RecipientInformation {
    /// Key transport.
    KeyTrans(KeyTransRecipientInformation),
    /// Pre-shared key-encryption key.
    Kek(KekRecipientInformation),
    /// Key agreement; one entry per encrypted key of the record.
    KeyAgree(KeyAgreeRecipientInformation),
    /// Password.
    Password(PasswordRecipientInformation),
}

impl RecipientInformation {
    /// Parse one wire record into its entries.
    ///
    /// Key agreement records yield one entry per recipient encrypted key;
    /// `OtherRecipientInfo` records yield none.
    pub fn from_recipient_info(
        info: &RecipientInfo,
        context: &RecoveryContext,
    ) -> Result<Vec<RecipientInformation>> {
        Ok(match info {
            RecipientInfo::Ktri(ktri) => vec![RecipientInformation::KeyTrans(
                KeyTransRecipientInformation::parse(ktri, context)?,
            )],
            RecipientInfo::Kekri(kekri) => vec![RecipientInformation::Kek(
                KekRecipientInformation::parse(kekri, context)?,
            )],
            RecipientInfo::Kari(kari) => KeyAgreeRecipientInformation::parse(kari, context)?
                .into_iter()
                .map(RecipientInformation::KeyAgree)
                .collect(),
            RecipientInfo::Pwri(pwri) => vec![RecipientInformation::Password(
                PasswordRecipientInformation::parse(pwri, context)?,
            )],
            RecipientInfo::Ori(ori) => {
                debug!("skipping other recipient info of type {}", ori.ori_type);
                Vec::new()
            }
        })
    }

    /// State common to every variant.
    pub fn entry(&self) -> &RecipientEntry {
        match self {
            RecipientInformation::KeyTrans(info) => info.entry(),
            RecipientInformation::Kek(info) => info.entry(),
            RecipientInformation::KeyAgree(info) => info.entry(),
            RecipientInformation::Password(info) => info.entry(),
        }
    }

    /// Recipient this entry was produced for.
    pub fn rid(&self) -> &RecipientId {
        self.entry().rid()
    }

    /// Key-encryption algorithm of the record.
    pub fn key_encryption_algorithm(&self) -> &AlgorithmIdentifierOwned {
        self.entry().key_encryption_algorithm()
    }

    /// Recover the content key with `credential`.
    ///
    /// A credential of the wrong kind for this entry fails with
    /// [`RecoveryErrorKind::InvalidCredential`].
    pub fn recover<'a>(&self, credential: impl Into<Credential<'a>>) -> Result<SymmetricKey> {
        match (self, credential.into()) {
            (RecipientInformation::KeyTrans(info), Credential::PrivateKey(key)) => {
                info.recover_with_private_key(key)
            }
            (RecipientInformation::KeyAgree(info), Credential::PrivateKey(key)) => {
                info.recover_with_private_key(key)
            }
            (RecipientInformation::Kek(info), Credential::Kek(kek)) => info.recover_with_kek(kek),
            (RecipientInformation::Password(info), Credential::Password(password)) => {
                info.recover_with_password(password)
            }
            _ => {
                let entry = self.entry();
                entry.recovered.replace(None);
                Err(entry.invalid_credential())
            }
        }
    }

    /// Recover the content key and open the content in one step.
    pub fn content_stream<'a>(&self, credential: impl Into<Credential<'a>>) -> Result<ContentStream> {
        self.recover(credential)?;
        self.open_content()
    }

    /// Open the content under the key from the last successful recovery.
    pub fn open_content(&self) -> Result<ContentStream> {
        self.entry().open_content()
    }

    /// See [`RecipientEntry::state`].
    pub fn state(&self) -> ContentState {
        self.entry().state()
    }

    /// See [`RecipientEntry::mac`].
    pub fn mac(&self) -> Option<Vec<u8>> {
        self.entry().mac()
    }

    /// See [`RecipientEntry::digest`].
    pub fn digest(&self) -> Option<Vec<u8>> {
        self.entry().digest()
    }

    /// See [`RecipientEntry::verify_mac`].
    pub fn verify_mac(&self, expected: &[u8]) -> Result<()> {
        self.entry().verify_mac(expected)
    }

    /// See [`RecipientEntry::compute_mac`].
    pub fn compute_mac(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.entry().compute_mac(data)
    }

    /// See [`RecipientEntry::recovered_key`].
    pub fn recovered_key(&self) -> Option<SymmetricKey> {
        self.entry().recovered_key()
    }
}
