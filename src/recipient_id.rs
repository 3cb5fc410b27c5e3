//! Recipient identities.
//!
//! A [`RecipientId`] names the credential a recipient record was produced
//! for. Ids are plain values: equality and hashing are structural over the
//! populated variant, and ids of different variants never compare equal.

use core::fmt;

use cms::cert::IssuerAndSerialNumber;
use cms::enveloped_data::{
    KeyAgreeRecipientIdentifier, RecipientIdentifier, RecipientKeyIdentifier,
};
use der::asn1::OctetString;
use der::{Decode, Encode};
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::errors::Result;

/// Reference to a certificate, as used by key transport and key agreement.
///
/// The issuer is held as its DER encoding so the id can be hashed.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum CertificateId {
    /// Issuer distinguished name and serial number.
    IssuerSerial {
        /// DER encoding of the issuer `Name`.
        issuer: Vec<u8>,
        /// Big-endian serial number with leading zeros stripped.
        serial_number: Vec<u8>,
    },
    /// Subject key identifier extension value.
    SubjectKeyId(Vec<u8>),
}

impl CertificateId {
    /// Id for an issuer and serial number pair.
    pub fn issuer_serial(issuer: &Name, serial_number: &SerialNumber) -> Result<Self> {
        Ok(CertificateId::IssuerSerial {
            issuer: issuer.to_der()?,
            serial_number: serial_number.as_bytes().to_vec(),
        })
    }

    /// Id for a subject key identifier.
    pub fn subject_key_id(ski: impl Into<Vec<u8>>) -> Self {
        CertificateId::SubjectKeyId(ski.into())
    }

    /// Id naming a certificate by its issuer and serial number.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let tbs = &cert.tbs_certificate;
        Self::issuer_serial(&tbs.issuer, &tbs.serial_number)
    }

    /// Id naming a certificate by its subject key identifier extension, if it has one.
    pub fn from_certificate_ski(cert: &Certificate) -> Result<Option<Self>> {
        Ok(certificate_ski(cert)?.map(CertificateId::SubjectKeyId))
    }

    /// Whether this id refers to `cert`.
    pub fn matches(&self, cert: &Certificate) -> bool {
        let tbs = &cert.tbs_certificate;
        match self {
            CertificateId::IssuerSerial {
                issuer,
                serial_number,
            } => {
                tbs.serial_number.as_bytes() == serial_number.as_slice()
                    && tbs.issuer.to_der().map_or(false, |der| der == *issuer)
            }
            CertificateId::SubjectKeyId(ski) => {
                matches!(certificate_ski(cert), Ok(Some(found)) if found == *ski)
            }
        }
    }

    fn to_issuer_and_serial(issuer: &[u8], serial_number: &[u8]) -> Result<IssuerAndSerialNumber> {
        Ok(IssuerAndSerialNumber {
            issuer: Name::from_der(issuer)?,
            serial_number: SerialNumber::new(serial_number)?,
        })
    }

    /// Wire form used in key transport records.
    pub fn to_recipient_identifier(&self) -> Result<RecipientIdentifier> {
        Ok(match self {
            CertificateId::IssuerSerial {
                issuer,
                serial_number,
            } => RecipientIdentifier::IssuerAndSerialNumber(Self::to_issuer_and_serial(
                issuer,
                serial_number,
            )?),
            CertificateId::SubjectKeyId(ski) => RecipientIdentifier::SubjectKeyIdentifier(
                SubjectKeyIdentifier(OctetString::new(ski.clone())?),
            ),
        })
    }

    /// Wire form used in key agreement records.
    pub fn to_key_agree_recipient_identifier(&self) -> Result<KeyAgreeRecipientIdentifier> {
        Ok(match self {
            CertificateId::IssuerSerial {
                issuer,
                serial_number,
            } => KeyAgreeRecipientIdentifier::IssuerAndSerialNumber(Self::to_issuer_and_serial(
                issuer,
                serial_number,
            )?),
            CertificateId::SubjectKeyId(ski) => {
                KeyAgreeRecipientIdentifier::RKeyId(RecipientKeyIdentifier {
                    subject_key_identifier: SubjectKeyIdentifier(OctetString::new(ski.clone())?),
                    date: None,
                    other: None,
                })
            }
        })
    }
}

impl TryFrom<&IssuerAndSerialNumber> for CertificateId {
    type Error = crate::Error;

    fn try_from(value: &IssuerAndSerialNumber) -> Result<Self> {
        Self::issuer_serial(&value.issuer, &value.serial_number)
    }
}

impl TryFrom<&RecipientIdentifier> for CertificateId {
    type Error = crate::Error;

    fn try_from(value: &RecipientIdentifier) -> Result<Self> {
        match value {
            RecipientIdentifier::IssuerAndSerialNumber(ias) => Self::try_from(ias),
            RecipientIdentifier::SubjectKeyIdentifier(ski) => {
                Ok(CertificateId::SubjectKeyId(ski.0.as_bytes().to_vec()))
            }
        }
    }
}

impl TryFrom<&KeyAgreeRecipientIdentifier> for CertificateId {
    type Error = crate::Error;

    fn try_from(value: &KeyAgreeRecipientIdentifier) -> Result<Self> {
        match value {
            KeyAgreeRecipientIdentifier::IssuerAndSerialNumber(ias) => Self::try_from(ias),
            KeyAgreeRecipientIdentifier::RKeyId(rkey) => Ok(CertificateId::SubjectKeyId(
                rkey.subject_key_identifier.0.as_bytes().to_vec(),
            )),
        }
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateId::IssuerSerial {
                issuer,
                serial_number,
            } => {
                match Name::from_der(issuer) {
                    Ok(name) => write!(f, "issuer \"{}\"", name)?,
                    Err(_) => write!(f, "issuer <{} bytes>", issuer.len())?,
                }
                write!(f, ", serial ")?;
                write_hex(f, serial_number)
            }
            CertificateId::SubjectKeyId(ski) => {
                write!(f, "subject key id ")?;
                write_hex(f, ski)
            }
        }
    }
}

/// Id of a key transport recipient.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyTransRecipientId(pub CertificateId);

/// Id of a KEK recipient: the identifier of the pre-shared key.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KekRecipientId {
    /// Opaque key identifier.
    pub key_identifier: Vec<u8>,
}

/// Id of a key agreement recipient.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyAgreeRecipientId(pub CertificateId);

/// Id of a password recipient.
///
/// Password recipients are anonymous; every password entry carries this same
/// id and is matched by attempting recovery.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PasswordRecipientId;

/// Identity of a recipient record.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum RecipientId {
    /// Key transport (`ktri`).
    KeyTrans(KeyTransRecipientId),
    /// Pre-shared key-encryption key (`kekri`).
    Kek(KekRecipientId),
    /// Key agreement (`kari`).
    KeyAgree(KeyAgreeRecipientId),
    /// Password (`pwri`).
    Password(PasswordRecipientId),
}

impl RecipientId {
    /// Key transport id for a certificate reference.
    pub fn key_trans(id: CertificateId) -> Self {
        RecipientId::KeyTrans(KeyTransRecipientId(id))
    }

    /// KEK id for a key identifier.
    pub fn kek(key_identifier: impl Into<Vec<u8>>) -> Self {
        RecipientId::Kek(KekRecipientId {
            key_identifier: key_identifier.into(),
        })
    }

    /// Key agreement id for a certificate reference.
    pub fn key_agree(id: CertificateId) -> Self {
        RecipientId::KeyAgree(KeyAgreeRecipientId(id))
    }

    /// The shared password recipient id.
    pub fn password() -> Self {
        RecipientId::Password(PasswordRecipientId)
    }

    /// Certificate reference for key transport and key agreement ids.
    pub fn certificate_id(&self) -> Option<&CertificateId> {
        match self {
            RecipientId::KeyTrans(KeyTransRecipientId(id))
            | RecipientId::KeyAgree(KeyAgreeRecipientId(id)) => Some(id),
            RecipientId::Kek(_) | RecipientId::Password(_) => None,
        }
    }

    /// Whether this id refers to `cert`. Always false for KEK and password ids.
    pub fn matches_certificate(&self, cert: &Certificate) -> bool {
        self.certificate_id().map_or(false, |id| id.matches(cert))
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientId::KeyTrans(KeyTransRecipientId(id)) => {
                write!(f, "key transport recipient ({})", id)
            }
            RecipientId::Kek(KekRecipientId { key_identifier }) => {
                write!(f, "KEK recipient (key id ")?;
                write_hex(f, key_identifier)?;
                write!(f, ")")
            }
            RecipientId::KeyAgree(KeyAgreeRecipientId(id)) => {
                write!(f, "key agreement recipient ({})", id)
            }
            RecipientId::Password(_) => write!(f, "password recipient"),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

fn certificate_ski(cert: &Certificate) -> Result<Option<Vec<u8>>> {
    let ski = cert.tbs_certificate.get::<SubjectKeyIdentifier>()?;
    Ok(ski.map(|(_critical, ski)| ski.0.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use std::collections::HashSet;

    fn issuer_serial(cn: &str, serial: &[u8]) -> CertificateId {
        let name = Name::from_str(&format!("CN={}", cn)).unwrap();
        CertificateId::issuer_serial(&name, &SerialNumber::new(serial).unwrap()).unwrap()
    }

    #[test]
    fn test_structural_equality() {
        let a = RecipientId::key_trans(issuer_serial("alice", &[1, 2, 3]));
        let b = RecipientId::key_trans(issuer_serial("alice", &[1, 2, 3]));
        let c = RecipientId::key_trans(issuer_serial("alice", &[1, 2, 4]));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn test_variants_never_equal() {
        let cert_id = CertificateId::subject_key_id(vec![9u8; 20]);
        let trans = RecipientId::key_trans(cert_id.clone());
        let agree = RecipientId::key_agree(cert_id);
        assert_ne!(trans, agree);
        assert_ne!(RecipientId::kek(vec![9u8; 20]), trans);
        assert_eq!(RecipientId::password(), RecipientId::password());
    }

    #[test]
    fn test_wire_conversion() {
        let id = issuer_serial("bob", &[0x7f, 0x01]);
        let wire = id.to_recipient_identifier().unwrap();
        assert_eq!(CertificateId::try_from(&wire).unwrap(), id);

        let wire = id.to_key_agree_recipient_identifier().unwrap();
        assert_eq!(CertificateId::try_from(&wire).unwrap(), id);

        let ski = CertificateId::subject_key_id(b"key-id".to_vec());
        let wire = ski.to_key_agree_recipient_identifier().unwrap();
        assert!(matches!(wire, KeyAgreeRecipientIdentifier::RKeyId(_)));
        assert_eq!(CertificateId::try_from(&wire).unwrap(), ski);
    }

    #[test]
    fn test_display() {
        let id = RecipientId::kek(b"kek-1".to_vec());
        assert_eq!(id.to_string(), "KEK recipient (key id 6b656b2d31)");
        let id = RecipientId::key_trans(issuer_serial("carol", &[0x01]));
        assert_eq!(
            id.to_string(),
            "key transport recipient (issuer \"CN=carol\", serial 01)"
        );
    }
}
