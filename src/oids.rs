//! Object identifiers for the algorithms recipient records refer to.

use const_oid::ObjectIdentifier;

/// `rsaEncryption` (PKCS #1 v1.5 key transport)
pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// `id-RSAES-OAEP`
pub const RSAES_OAEP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.7");

/// `des-ede3-cbc`
pub const DES_EDE3_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.7");
/// `rc2-cbc`
pub const RC2_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.2");
/// `id-aes128-CBC`
pub const AES128_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.2");
/// `id-aes192-CBC`
pub const AES192_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.22");
/// `id-aes256-CBC`
pub const AES256_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.42");
/// `camellia128-cbc`
pub const CAMELLIA128_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.1.2");
/// `camellia192-cbc`
pub const CAMELLIA192_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.1.3");
/// `camellia256-cbc`
pub const CAMELLIA256_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.1.4");
/// `id-seedCBC`
pub const SEED_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.410.200004.1.4");

/// `id-aes128-wrap`
pub const AES128_WRAP: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.5");
/// `id-aes192-wrap`
pub const AES192_WRAP: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.25");
/// `id-aes256-wrap`
pub const AES256_WRAP: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.45");
/// `id-camellia128-wrap`
pub const CAMELLIA128_WRAP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.3.2");
/// `id-camellia192-wrap`
pub const CAMELLIA192_WRAP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.3.3");
/// `id-camellia256-wrap`
pub const CAMELLIA256_WRAP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.392.200011.61.1.1.3.4");
/// `id-npki-app-cmsSeed-wrap`
pub const SEED_WRAP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.410.200004.7.1.1.1");
/// `id-alg-CMS3DESwrap`
pub const DES_EDE3_WRAP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.3.6");
/// `id-alg-PWRI-KEK` (RFC 3211 password key wrap)
pub const PWRI_KEK: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.3.9");

/// `id-PBKDF2`
pub const PBKDF2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.12");

/// `hmacWithSHA1`
pub const HMAC_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.7");
/// `hmacWithSHA224`
pub const HMAC_WITH_SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.8");
/// `hmacWithSHA256`
pub const HMAC_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.9");
/// `hmacWithSHA384`
pub const HMAC_WITH_SHA384: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.2.10");
/// `hmacWithSHA512`
pub const HMAC_WITH_SHA512: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.2.11");
/// `hMAC-SHA1` from the IETF IPsec arc.
pub const HMAC_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.8.1.2");

/// `dhSinglePass-stdDH-sha1kdf-scheme`
pub const ECDH_STD_SHA1_KDF: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.133.16.840.63.0.2");
/// `dhSinglePass-cofactorDH-sha1kdf-scheme`
pub const ECDH_COFACTOR_SHA1_KDF: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.133.16.840.63.0.3");
/// `mqvSinglePass-sha1kdf-scheme`
pub const ECMQV_SHA1_KDF: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.133.16.840.63.0.16");
/// `dhSinglePass-stdDH-sha224kdf-scheme`
pub const ECDH_STD_SHA224_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.11.0");
/// `dhSinglePass-stdDH-sha256kdf-scheme`
pub const ECDH_STD_SHA256_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.11.1");
/// `dhSinglePass-stdDH-sha384kdf-scheme`
pub const ECDH_STD_SHA384_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.11.2");
/// `dhSinglePass-stdDH-sha512kdf-scheme`
pub const ECDH_STD_SHA512_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.11.3");
/// `dhSinglePass-cofactorDH-sha256kdf-scheme`
pub const ECDH_COFACTOR_SHA256_KDF: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.132.1.14.1");
/// `mqvSinglePass-sha224kdf-scheme`
pub const ECMQV_SHA224_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.15.0");
/// `mqvSinglePass-sha256kdf-scheme`
pub const ECMQV_SHA256_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.15.1");
/// `mqvSinglePass-sha384kdf-scheme`
pub const ECMQV_SHA384_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.15.2");
/// `mqvSinglePass-sha512kdf-scheme`
pub const ECMQV_SHA512_KDF: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.1.15.3");

/// `id-ecPublicKey`
pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
/// `secp256r1`
pub const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
/// `secp384r1`
pub const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// `id-sha1`
pub const SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
/// `id-sha224`
pub const SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.4");
/// `id-sha256`
pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
/// `id-sha384`
pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
/// `id-sha512`
pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

/// `id-ce-subjectKeyIdentifier`
pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");

#[cfg(test)]
mod tests {
    use super::*;
    use const_oid::AssociatedOid;

    #[test]
    fn test_digest_oids_match_hash_crates() {
        assert_eq!(SHA1, sha1::Sha1::OID);
        assert_eq!(SHA224, sha2::Sha224::OID);
        assert_eq!(SHA256, sha2::Sha256::OID);
        assert_eq!(SHA384, sha2::Sha384::OID);
        assert_eq!(SHA512, sha2::Sha512::OID);
    }
}
