//! ASN.1 structures not provided by the `cms` crate, plus small helpers for
//! moving values in and out of `ANY`.

use cms::enveloped_data::{OriginatorPublicKey, UserKeyingMaterial};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{
    Any, AnyRef, Decode, DecodeOwned, DecodeValue, Encode, EncodeValue, Header, Length, Reader,
    Sequence, Tag, Tagged, Writer,
};
use spki::AlgorithmIdentifierOwned;

use crate::oids;

/// Re-decode an `ANY` as a concrete type.
pub(crate) fn decode_any<T: DecodeOwned>(any: &Any) -> der::Result<T> {
    T::from_der(&any.to_der()?)
}

/// Encode a value as an `ANY`.
pub(crate) fn encode_any<T: Encode>(value: &T) -> der::Result<Any> {
    Any::from_der(&value.to_der()?)
}

/// An ASN.1 `NULL` as `ANY`.
pub(crate) fn null_any() -> Any {
    Any::from(AnyRef::NULL)
}

/// Whether algorithm parameters are absent or `NULL`.
pub(crate) fn is_absent_or_null(params: Option<&Any>) -> bool {
    params.map_or(true, |any| any.tag() == Tag::Null)
}

/// Algorithm identifier with `NULL` parameters.
pub(crate) fn algorithm_with_null(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid,
        parameters: Some(null_any()),
    }
}

/// Algorithm identifier of a key wrap as carried in recipient records:
/// `NULL` parameters for the triple-DES wrap, none otherwise.
pub(crate) fn wrap_algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid,
        parameters: (oid == oids::DES_EDE3_WRAP).then(null_any),
    }
}

/// KDF input for ECC key agreement in CMS, [RFC 5753 Section 7.2].
///
/// ```text
/// ECC-CMS-SharedInfo ::= SEQUENCE {
///     keyInfo      AlgorithmIdentifier,
///     entityUInfo  [0] EXPLICIT OCTET STRING OPTIONAL,
///     suppPubInfo  [2] EXPLICIT OCTET STRING }
/// ```
///
/// [RFC 5753 Section 7.2]: https://www.rfc-editor.org/rfc/rfc5753#section-7.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EccCmsSharedInfo {
    /// Key wrap algorithm, with `NULL` parameters.
    pub key_info: AlgorithmIdentifierOwned,
    /// User keying material, if any.
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub entity_u_info: Option<OctetString>,
    /// Length of the derived key in bits, as a four byte big-endian integer.
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT")]
    pub supp_pub_info: OctetString,
}

impl EccCmsSharedInfo {
    /// Shared info for a wrap key of `key_bits` bits.
    pub fn new(
        wrap_algorithm: ObjectIdentifier,
        ukm: Option<&[u8]>,
        key_bits: u32,
    ) -> der::Result<Self> {
        Ok(Self {
            key_info: algorithm_with_null(wrap_algorithm),
            entity_u_info: ukm.map(OctetString::new).transpose()?,
            supp_pub_info: OctetString::new(key_bits.to_be_bytes().to_vec())?,
        })
    }
}

/// User keying material of a one-pass ECMQV record, [RFC 5753 Section 7.2].
///
/// ```text
/// MQVuserKeyingMaterial ::= SEQUENCE {
///     ephemeralPublicKey  OriginatorPublicKey,
///     addedukm            [0] EXPLICIT UserKeyingMaterial OPTIONAL }
/// ```
///
/// [RFC 5753 Section 7.2]: https://www.rfc-editor.org/rfc/rfc5753#section-7.2
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MqvUserKeyingMaterial {
    /// Sender's ephemeral public key.
    pub ephemeral_public_key: OriginatorPublicKey,
    /// Additional user keying material.
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub added_ukm: Option<UserKeyingMaterial>,
}

fn default_prf() -> AlgorithmIdentifierOwned {
    algorithm_with_null(oids::HMAC_WITH_SHA1)
}

/// PBKDF2 parameters, [RFC 8018 Appendix A.2], restricted to an explicit salt.
///
/// ```text
/// PBKDF2-params ::= SEQUENCE {
///     salt            CHOICE { specified OCTET STRING, ... },
///     iterationCount  INTEGER (1..MAX),
///     keyLength       INTEGER (1..MAX) OPTIONAL,
///     prf             AlgorithmIdentifier DEFAULT algid-hmacWithSHA1 }
/// ```
///
/// [RFC 8018 Appendix A.2]: https://www.rfc-editor.org/rfc/rfc8018#appendix-A.2
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pbkdf2Parameters {
    /// Salt.
    pub salt: OctetString,
    /// Iteration count.
    pub iteration_count: u32,
    /// Length of the derived key in bytes.
    pub key_length: Option<u16>,
    /// Pseudorandom function; left out of the encoding when it is the default.
    pub prf: AlgorithmIdentifierOwned,
}

impl Pbkdf2Parameters {
    /// The default PRF, `hmacWithSHA1`.
    pub fn default_prf() -> AlgorithmIdentifierOwned {
        default_prf()
    }

    /// PRF as written on the wire.
    fn encoded_prf(&self) -> Option<&AlgorithmIdentifierOwned> {
        (self.prf != default_prf()).then_some(&self.prf)
    }
}

impl<'a> DecodeValue<'a> for Pbkdf2Parameters {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        reader.read_nested(header.length, |reader| {
            Ok(Self {
                salt: OctetString::decode(reader)?,
                iteration_count: u32::decode(reader)?,
                key_length: Option::<u16>::decode(reader)?,
                prf: Option::<AlgorithmIdentifierOwned>::decode(reader)?
                    .unwrap_or_else(default_prf),
            })
        })
    }
}

impl EncodeValue for Pbkdf2Parameters {
    fn value_len(&self) -> der::Result<Length> {
        let key_length = match self.key_length {
            Some(len) => len.encoded_len()?,
            None => Length::ZERO,
        };
        let prf = match self.encoded_prf() {
            Some(prf) => prf.encoded_len()?,
            None => Length::ZERO,
        };
        [
            self.salt.encoded_len()?,
            self.iteration_count.encoded_len()?,
            key_length,
            prf,
        ]
        .into_iter()
        .try_fold(Length::ZERO, |acc, len| acc + len)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.salt.encode(writer)?;
        self.iteration_count.encode(writer)?;
        if let Some(len) = self.key_length {
            len.encode(writer)?;
        }
        if let Some(prf) = self.encoded_prf() {
            prf.encode(writer)?;
        }
        Ok(())
    }
}

impl<'a> Sequence<'a> for Pbkdf2Parameters {}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_default_prf_omitted() {
        let params = Pbkdf2Parameters {
            salt: OctetString::new(hex!("0102030405060708").to_vec()).unwrap(),
            iteration_count: 1024,
            key_length: None,
            prf: Pbkdf2Parameters::default_prf(),
        };
        let der = params.to_der().unwrap();
        // SEQUENCE { OCTET STRING (8), INTEGER 1024 }
        assert_eq!(der, hex!("300e04080102030405060708020204 00").to_vec());
        assert_eq!(Pbkdf2Parameters::from_der(&der).unwrap(), params);
    }

    #[test]
    fn test_explicit_prf_kept() {
        let params = Pbkdf2Parameters {
            salt: OctetString::new(vec![0xaa; 16]).unwrap(),
            iteration_count: 2048,
            key_length: Some(16),
            prf: algorithm_with_null(oids::HMAC_WITH_SHA256),
        };
        let decoded = Pbkdf2Parameters::from_der(&params.to_der().unwrap()).unwrap();
        assert_eq!(decoded.prf.oid, oids::HMAC_WITH_SHA256);
        assert_eq!(decoded.key_length, Some(16));
    }

    #[test]
    fn test_shared_info_encoding() {
        let info = EccCmsSharedInfo::new(oids::AES128_WRAP, None, 128).unwrap();
        assert_eq!(
            info.to_der().unwrap(),
            hex!("3017300d060960864801650304010505 00a20604040000 0080").to_vec()
        );
    }
}
