//! Error types.

use core::fmt;
use der::oid::ObjectIdentifier;

use crate::backend::{BackendError, Capability};
use crate::key::KeyFamily;
use crate::recipient_id::RecipientId;

/// Alias for [`core::result::Result`] with the `cms-recipient` crate's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Every resolution strategy was exhausted for an algorithm identifier.
    AlgorithmUnavailable {
        /// Capability that was requested.
        capability: Capability,
        /// Algorithm identifier that could not be resolved.
        algorithm: ObjectIdentifier,
    },

    /// A backend hint named a backend the resolver does not know about.
    UnknownBackend(String),

    /// Key-encryption key of a family or length with no matching wrap algorithm.
    UnsupportedKeySize {
        /// Family of the offending key.
        family: KeyFamily,
        /// Length of the offending key in bits.
        bits: usize,
    },

    /// Backend or key incompatibility while producing a recipient record.
    KeyEstablishment {
        /// Algorithm being applied.
        algorithm: ObjectIdentifier,
        /// Backend failure.
        source: BackendError,
    },

    /// The content key could not be recovered from a recipient record.
    KeyRecovery {
        /// Recipient entry the attempt was made against.
        recipient: Option<RecipientId>,
        /// Key-encryption algorithm of the entry.
        algorithm: ObjectIdentifier,
        /// What went wrong.
        kind: RecoveryErrorKind,
    },

    /// A streaming content source was opened a second time.
    AlreadyConsumed,

    /// Content was requested from an entry before its key was recovered.
    NotRecovered,

    /// A recipient record is missing a field its variant requires.
    MalformedRecord(String),

    /// ASN.1 DER encoding or decoding error.
    Asn1(der::Error),

    /// Backend failure outside key establishment and recovery.
    Backend(BackendError),

    /// MAC or digest verification failed.
    Verification,
}

/// Classification of a [`Error::KeyRecovery`] failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RecoveryErrorKind {
    /// Credential does not fit the entry, e.g. a password for a KEK entry or
    /// a key of the wrong type.
    InvalidCredential,
    /// The wrapped key failed its integrity check; wrong credential or a
    /// corrupted record.
    UnwrapFailed,
    /// The entry uses an algorithm no backend supports.
    UnsupportedAlgorithm,
    /// The originator is identified by certificate rather than an embedded public key.
    UnsupportedOriginator,
}

impl fmt::Display for RecoveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryErrorKind::InvalidCredential => write!(f, "credential does not match recipient"),
            RecoveryErrorKind::UnwrapFailed => write!(f, "unwrap failed"),
            RecoveryErrorKind::UnsupportedAlgorithm => write!(f, "unsupported algorithm"),
            RecoveryErrorKind::UnsupportedOriginator => {
                write!(f, "originator must carry an embedded public key")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlgorithmUnavailable {
                capability,
                algorithm,
            } => write!(f, "no {} available for {}", capability, algorithm),
            Error::UnknownBackend(name) => write!(f, "unknown backend: {}", name),
            Error::UnsupportedKeySize { family, bits } => {
                write!(f, "unsupported {} key size: {} bits", family, bits)
            }
            Error::KeyEstablishment { algorithm, source } => {
                write!(f, "key establishment with {} failed: {}", algorithm, source)
            }
            Error::KeyRecovery {
                recipient: Some(recipient),
                algorithm,
                kind,
            } => write!(
                f,
                "key recovery for {} with {} failed: {}",
                recipient, algorithm, kind
            ),
            Error::KeyRecovery {
                recipient: None,
                algorithm,
                kind,
            } => write!(f, "key recovery with {} failed: {}", algorithm, kind),
            Error::AlreadyConsumed => write!(f, "content stream already consumed"),
            Error::NotRecovered => write!(f, "content key has not been recovered"),
            Error::MalformedRecord(reason) => write!(f, "malformed recipient record: {}", reason),
            Error::Asn1(err) => write!(f, "ASN.1 error: {}", err),
            Error::Backend(err) => write!(f, "backend error: {}", err),
            Error::Verification => write!(f, "verification error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::KeyEstablishment { source, .. } => Some(source),
            Error::Asn1(err) => Some(err),
            Error::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1(err)
    }
}

impl From<spki::Error> for Error {
    fn from(err: spki::Error) -> Error {
        match err {
            spki::Error::Asn1(err) => Error::Asn1(err),
            other => Error::MalformedRecord(other.to_string()),
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Error {
        Error::Backend(err)
    }
}

impl Error {
    /// Builds a [`Error::KeyRecovery`] without recipient context; entries fill
    /// it in with [`Error::for_recipient`].
    pub(crate) fn recovery(algorithm: ObjectIdentifier, kind: RecoveryErrorKind) -> Error {
        Error::KeyRecovery {
            recipient: None,
            algorithm,
            kind,
        }
    }

    /// Attaches the recipient id to a recovery error lacking one.
    pub(crate) fn for_recipient(self, rid: &RecipientId) -> Error {
        match self {
            Error::KeyRecovery {
                recipient: None,
                algorithm,
                kind,
            } => Error::KeyRecovery {
                recipient: Some(rid.clone()),
                algorithm,
                kind,
            },
            other => other,
        }
    }

    /// Returns the recovery failure classification, if this is a recovery error.
    pub fn recovery_kind(&self) -> Option<RecoveryErrorKind> {
        match self {
            Error::KeyRecovery { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
