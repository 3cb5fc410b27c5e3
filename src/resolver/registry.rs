//! Object identifier to algorithm name tables.

use std::collections::HashMap;

use der::asn1::ObjectIdentifier;

use crate::key::KeyFamily;
use crate::oids;

/// Immutable lookup tables consulted by the [`Resolver`].
///
/// A registry maps algorithm identifiers to the names backends know them
/// by, to key sizes and families, and to the digests used by key agreement
/// KDFs. [`AlgorithmRegistry::default`] carries the standard tables; use
/// [`AlgorithmRegistry::builder`] to extend them or
/// [`RegistryBuilder::empty`] to start from scratch.
///
/// [`Resolver`]: super::Resolver
#[derive(Clone, Debug)]
pub struct AlgorithmRegistry {
    base_names: HashMap<ObjectIdentifier, String>,
    cipher_names: HashMap<ObjectIdentifier, String>,
    mac_names: HashMap<ObjectIdentifier, String>,
    wrap_names: HashMap<ObjectIdentifier, String>,
    digest_names: HashMap<ObjectIdentifier, String>,
    key_sizes: HashMap<ObjectIdentifier, usize>,
    kdf_digests: HashMap<ObjectIdentifier, ObjectIdentifier>,
    families: HashMap<ObjectIdentifier, KeyFamily>,
    kek_wraps: HashMap<(KeyFamily, usize), ObjectIdentifier>,
}

impl AlgorithmRegistry {
    /// Builder seeded with the standard tables.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::standard()
    }

    /// Bare algorithm family name, e.g. `AES` for `aes128-CBC`.
    pub fn base_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.base_names.get(oid).map(String::as_str)
    }

    /// Cipher transformation name, e.g. `AES/CBC/PKCS5Padding`.
    pub fn cipher_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.cipher_names.get(oid).map(String::as_str)
    }

    /// MAC algorithm name, e.g. `HmacSHA256`.
    pub fn mac_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.mac_names.get(oid).map(String::as_str)
    }

    /// Key wrap algorithm name, e.g. `AESWrap`.
    pub fn wrap_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.wrap_names.get(oid).map(String::as_str)
    }

    /// Digest algorithm name, e.g. `SHA256`.
    pub fn digest_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.digest_names.get(oid).map(String::as_str)
    }

    /// Name of the RFC 3211 wrapper over a block cipher, e.g. `AESRFC3211Wrap`
    /// for `aes128-CBC`.
    pub fn password_wrap_name(&self, oid: &ObjectIdentifier) -> Option<String> {
        self.base_name(oid).map(|base| format!("{}RFC3211Wrap", base))
    }

    /// Key size in bits of a cipher or key wrap algorithm.
    pub fn key_size(&self, oid: &ObjectIdentifier) -> Option<usize> {
        self.key_sizes.get(oid).copied()
    }

    /// Key family of a cipher or key wrap algorithm.
    pub fn family(&self, oid: &ObjectIdentifier) -> Option<KeyFamily> {
        self.families.get(oid).copied()
    }

    /// Digest of the X9.63 KDF used by a key agreement scheme.
    pub fn kdf_digest(&self, agreement: &ObjectIdentifier) -> Option<ObjectIdentifier> {
        self.kdf_digests.get(agreement).copied()
    }

    /// Whether a key agreement scheme is one-pass ECMQV.
    pub fn is_mqv(&self, agreement: &ObjectIdentifier) -> bool {
        self.base_name(agreement) == Some("ECMQV")
    }

    /// Key wrap algorithm for a key-encryption key of the given family and length.
    pub fn kek_wrap_algorithm(&self, family: KeyFamily, bits: usize) -> Option<ObjectIdentifier> {
        self.kek_wraps.get(&(family, bits)).copied()
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        RegistryBuilder::standard().build()
    }
}

/// Builder for an [`AlgorithmRegistry`]. Later entries replace earlier ones.
#[derive(Clone, Debug)]
pub struct RegistryBuilder {
    registry: AlgorithmRegistry,
}

impl RegistryBuilder {
    /// Builder with no entries.
    pub fn empty() -> Self {
        Self {
            registry: AlgorithmRegistry {
                base_names: HashMap::new(),
                cipher_names: HashMap::new(),
                mac_names: HashMap::new(),
                wrap_names: HashMap::new(),
                digest_names: HashMap::new(),
                key_sizes: HashMap::new(),
                kdf_digests: HashMap::new(),
                families: HashMap::new(),
                kek_wraps: HashMap::new(),
            },
        }
    }

    /// Builder seeded with the standard tables.
    pub fn standard() -> Self {
        let mut builder = Self::empty();

        for (oid, bits, family, base, cipher) in [
            (oids::AES128_CBC, 128, KeyFamily::Aes, "AES", "AES/CBC/PKCS5Padding"),
            (oids::AES192_CBC, 192, KeyFamily::Aes, "AES", "AES/CBC/PKCS5Padding"),
            (oids::AES256_CBC, 256, KeyFamily::Aes, "AES", "AES/CBC/PKCS5Padding"),
            (oids::DES_EDE3_CBC, 192, KeyFamily::DesEde, "DESEDE", "DESEDE/CBC/PKCS5Padding"),
            (oids::CAMELLIA128_CBC, 128, KeyFamily::Camellia, "Camellia", "Camellia/CBC/PKCS5Padding"),
            (oids::CAMELLIA192_CBC, 192, KeyFamily::Camellia, "Camellia", "Camellia/CBC/PKCS5Padding"),
            (oids::CAMELLIA256_CBC, 256, KeyFamily::Camellia, "Camellia", "Camellia/CBC/PKCS5Padding"),
            (oids::SEED_CBC, 128, KeyFamily::Seed, "SEED", "SEED/CBC/PKCS5Padding"),
        ] {
            builder = builder
                .base_name(oid, base)
                .cipher_name(oid, cipher)
                .key_size(oid, bits)
                .family(oid, family);
        }
        builder = builder
            .mac_name(oids::AES128_CBC, "AESMac")
            .mac_name(oids::AES192_CBC, "AESMac")
            .mac_name(oids::AES256_CBC, "AESMac")
            .mac_name(oids::DES_EDE3_CBC, "DESEDEMac");

        for (oid, bits, family, name) in [
            (oids::AES128_WRAP, 128, KeyFamily::Aes, "AESWrap"),
            (oids::AES192_WRAP, 192, KeyFamily::Aes, "AESWrap"),
            (oids::AES256_WRAP, 256, KeyFamily::Aes, "AESWrap"),
            (oids::CAMELLIA128_WRAP, 128, KeyFamily::Camellia, "CamelliaWrap"),
            (oids::CAMELLIA192_WRAP, 192, KeyFamily::Camellia, "CamelliaWrap"),
            (oids::CAMELLIA256_WRAP, 256, KeyFamily::Camellia, "CamelliaWrap"),
            (oids::SEED_WRAP, 128, KeyFamily::Seed, "SEEDWrap"),
            (oids::DES_EDE3_WRAP, 192, KeyFamily::DesEde, "DESedeWrap"),
        ] {
            builder = builder
                .wrap_name(oid, name)
                .key_size(oid, bits)
                .family(oid, family)
                .kek_wrap(family, bits, oid);
        }

        for (oid, bits, name) in [
            (oids::HMAC_WITH_SHA1, 160, "HmacSHA1"),
            (oids::HMAC_SHA1, 160, "HmacSHA1"),
            (oids::HMAC_WITH_SHA224, 224, "HmacSHA224"),
            (oids::HMAC_WITH_SHA256, 256, "HmacSHA256"),
            (oids::HMAC_WITH_SHA384, 384, "HmacSHA384"),
            (oids::HMAC_WITH_SHA512, 512, "HmacSHA512"),
        ] {
            builder = builder
                .base_name(oid, name)
                .mac_name(oid, name)
                .key_size(oid, bits)
                .family(oid, KeyFamily::Generic);
        }

        for (oid, name) in [
            (oids::SHA1, "SHA1"),
            (oids::SHA224, "SHA224"),
            (oids::SHA256, "SHA256"),
            (oids::SHA384, "SHA384"),
            (oids::SHA512, "SHA512"),
        ] {
            builder = builder.digest_name(oid, name);
        }

        for (oid, base, digest) in [
            (oids::ECDH_STD_SHA1_KDF, "ECDH", oids::SHA1),
            (oids::ECDH_STD_SHA224_KDF, "ECDH", oids::SHA224),
            (oids::ECDH_STD_SHA256_KDF, "ECDH", oids::SHA256),
            (oids::ECDH_STD_SHA384_KDF, "ECDH", oids::SHA384),
            (oids::ECDH_STD_SHA512_KDF, "ECDH", oids::SHA512),
            (oids::ECDH_COFACTOR_SHA1_KDF, "ECCDH", oids::SHA1),
            (oids::ECDH_COFACTOR_SHA256_KDF, "ECCDH", oids::SHA256),
            (oids::ECMQV_SHA1_KDF, "ECMQV", oids::SHA1),
            (oids::ECMQV_SHA224_KDF, "ECMQV", oids::SHA224),
            (oids::ECMQV_SHA256_KDF, "ECMQV", oids::SHA256),
            (oids::ECMQV_SHA384_KDF, "ECMQV", oids::SHA384),
            (oids::ECMQV_SHA512_KDF, "ECMQV", oids::SHA512),
        ] {
            builder = builder.base_name(oid, base).kdf_digest(oid, digest);
        }

        builder
            .base_name(oids::EC_PUBLIC_KEY, "EC")
            .base_name(oids::RSA_ENCRYPTION, "RSA")
            .base_name(oids::PBKDF2, "PBKDF2")
            .cipher_name(oids::RSA_ENCRYPTION, "RSA/ECB/PKCS1Padding")
            .cipher_name(oids::RSAES_OAEP, "RSA/ECB/OAEPPadding")
    }

    /// Register a bare family name.
    pub fn base_name(mut self, oid: ObjectIdentifier, name: impl Into<String>) -> Self {
        self.registry.base_names.insert(oid, name.into());
        self
    }

    /// Register a cipher transformation name.
    pub fn cipher_name(mut self, oid: ObjectIdentifier, name: impl Into<String>) -> Self {
        self.registry.cipher_names.insert(oid, name.into());
        self
    }

    /// Register a MAC name.
    pub fn mac_name(mut self, oid: ObjectIdentifier, name: impl Into<String>) -> Self {
        self.registry.mac_names.insert(oid, name.into());
        self
    }

    /// Register a key wrap name.
    pub fn wrap_name(mut self, oid: ObjectIdentifier, name: impl Into<String>) -> Self {
        self.registry.wrap_names.insert(oid, name.into());
        self
    }

    /// Register a digest name.
    pub fn digest_name(mut self, oid: ObjectIdentifier, name: impl Into<String>) -> Self {
        self.registry.digest_names.insert(oid, name.into());
        self
    }

    /// Register a key size in bits.
    pub fn key_size(mut self, oid: ObjectIdentifier, bits: usize) -> Self {
        self.registry.key_sizes.insert(oid, bits);
        self
    }

    /// Register a key family.
    pub fn family(mut self, oid: ObjectIdentifier, family: KeyFamily) -> Self {
        self.registry.families.insert(oid, family);
        self
    }

    /// Register the KDF digest of a key agreement scheme.
    pub fn kdf_digest(mut self, agreement: ObjectIdentifier, digest: ObjectIdentifier) -> Self {
        self.registry.kdf_digests.insert(agreement, digest);
        self
    }

    /// Register the wrap algorithm for key-encryption keys of a family and length.
    pub fn kek_wrap(mut self, family: KeyFamily, bits: usize, wrap: ObjectIdentifier) -> Self {
        self.registry.kek_wraps.insert((family, bits), wrap);
        self
    }

    /// Finish the registry.
    pub fn build(self) -> AlgorithmRegistry {
        self.registry
    }
}
