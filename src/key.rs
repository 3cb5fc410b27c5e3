//! Key material handled by generators and recipient entries.

use core::fmt;

use der::{Decode, Encode};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

/// Algorithm family of a symmetric key.
///
/// Together with the key length this selects the wrap algorithm used for
/// KEK recipients.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum KeyFamily {
    /// AES (FIPS 197)
    Aes,
    /// Triple DES (EDE3)
    DesEde,
    /// Camellia (RFC 3713)
    Camellia,
    /// SEED (RFC 4269)
    Seed,
    /// Key with no block-cipher family, e.g. a MAC key.
    Generic,
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyFamily::Aes => "AES",
            KeyFamily::DesEde => "DESede",
            KeyFamily::Camellia => "Camellia",
            KeyFamily::Seed => "SEED",
            KeyFamily::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Symmetric key: a content-protection key or a key-encryption key.
///
/// Comparison is constant-time and the bytes are zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    family: KeyFamily,
    bytes: Zeroizing<Vec<u8>>,
}

impl SymmetricKey {
    /// Wrap raw key bytes belonging to the given family.
    pub fn new(family: KeyFamily, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            family,
            bytes: Zeroizing::new(bytes.into()),
        }
    }

    /// Shorthand for an AES key.
    pub fn aes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyFamily::Aes, bytes)
    }

    /// Algorithm family of this key.
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Key length in bits.
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }
}

impl ConstantTimeEq for SymmetricKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        // slices of different length compare unequal without inspecting contents
        self.bytes.as_slice().ct_eq(other.bytes.as_slice())
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.family == other.family && bool::from(self.ct_eq(other))
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("family", &self.family)
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Asymmetric private key held as a PKCS#8 `PrivateKeyInfo` document.
///
/// Backends parse the document into whatever key type they operate on.
#[derive(Clone)]
pub struct PrivateKey {
    algorithm: AlgorithmIdentifierOwned,
    der: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    /// Parse a DER-encoded PKCS#8 private key.
    pub fn from_pkcs8_der(bytes: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(bytes).map_err(|err| match err {
            pkcs8::Error::Asn1(err) => Error::Asn1(err),
            other => Error::MalformedRecord(other.to_string()),
        })?;
        let algorithm = AlgorithmIdentifierOwned::from_der(&info.algorithm.to_der()?)?;

        Ok(Self {
            algorithm,
            der: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// Algorithm identifier from the `PrivateKeyInfo`, e.g. `id-ecPublicKey`
    /// with the named curve as parameters.
    pub fn algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.algorithm
    }

    /// The PKCS#8 document.
    pub fn as_pkcs8_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm.oid)
            .finish_non_exhaustive()
    }
}

/// Key material for a key-agreement step.
///
/// Plain ECDH uses [`AgreementKeyMaterial::Static`] on both sides. One-pass
/// MQV pairs every static key with an ephemeral one; a party without an
/// ephemeral key uses its static key in both positions.
#[derive(Clone, Debug)]
pub enum AgreementKeyMaterial<K> {
    /// A single static key.
    Static(K),
    /// A static key combined with an ephemeral key.
    StaticPlusEphemeral {
        /// Long-term key.
        static_key: K,
        /// Per-message key.
        ephemeral_key: K,
    },
}

impl<K: Clone> AgreementKeyMaterial<K> {
    /// Lift a static key into the combined form, using it in both positions.
    pub fn lift(key: &K) -> Self {
        AgreementKeyMaterial::StaticPlusEphemeral {
            static_key: key.clone(),
            ephemeral_key: key.clone(),
        }
    }
}

impl<K> AgreementKeyMaterial<K> {
    /// The static key.
    pub fn static_key(&self) -> &K {
        match self {
            AgreementKeyMaterial::Static(key) => key,
            AgreementKeyMaterial::StaticPlusEphemeral { static_key, .. } => static_key,
        }
    }

    /// The ephemeral key, if any.
    pub fn ephemeral_key(&self) -> Option<&K> {
        match self {
            AgreementKeyMaterial::Static(_) => None,
            AgreementKeyMaterial::StaticPlusEphemeral { ephemeral_key, .. } => Some(ephemeral_key),
        }
    }
}

/// Public half of a key-agreement key.
pub type AgreementPublicKey = AgreementKeyMaterial<SubjectPublicKeyInfoOwned>;

/// Private half of a key-agreement key.
pub type AgreementPrivateKey = AgreementKeyMaterial<PrivateKey>;

/// How password characters are turned into PBKDF2 input bytes.
///
/// Both sides must agree: a password containing non-ASCII characters
/// derives a different key under each converter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PasswordConverter {
    /// PKCS #5 conversion: the low eight bits of each UTF-16 code unit.
    Ascii,
    /// UTF-8 bytes of the password.
    #[default]
    Utf8,
}

impl PasswordConverter {
    /// Convert a password to PBKDF2 input bytes.
    pub fn convert(self, password: &str) -> Zeroizing<Vec<u8>> {
        match self {
            PasswordConverter::Ascii => {
                Zeroizing::new(password.encode_utf16().map(|unit| unit as u8).collect())
            }
            PasswordConverter::Utf8 => Zeroizing::new(password.as_bytes().to_vec()),
        }
    }
}

/// Password credential for password recipients.
#[derive(Clone)]
pub struct Password {
    secret: Zeroizing<String>,
    converter: PasswordConverter,
}

impl Password {
    /// Create a password using the default UTF-8 converter.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            converter: PasswordConverter::default(),
        }
    }

    /// Select the password-to-bytes converter.
    pub fn with_converter(mut self, converter: PasswordConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Converter in use.
    pub fn converter(&self) -> PasswordConverter {
        self.converter
    }

    /// Password bytes as fed to PBKDF2.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        self.converter.convert(&self.secret)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

/// Credential supplied to recover a content key.
#[derive(Copy, Clone, Debug)]
pub enum Credential<'a> {
    /// Private key for key transport and key agreement entries.
    PrivateKey(&'a PrivateKey),
    /// Key-encryption key for KEK entries.
    Kek(&'a SymmetricKey),
    /// Password for password entries.
    Password(&'a Password),
}

impl<'a> From<&'a PrivateKey> for Credential<'a> {
    fn from(key: &'a PrivateKey) -> Self {
        Credential::PrivateKey(key)
    }
}

impl<'a> From<&'a SymmetricKey> for Credential<'a> {
    fn from(key: &'a SymmetricKey) -> Self {
        Credential::Kek(key)
    }
}

impl<'a> From<&'a Password> for Credential<'a> {
    fn from(password: &'a Password) -> Self {
        Credential::Password(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_symmetric_key_eq() {
        let a = SymmetricKey::aes(hex!("000102030405060708090a0b0c0d0e0f"));
        let b = SymmetricKey::aes(hex!("000102030405060708090a0b0c0d0e0f"));
        let c = SymmetricKey::aes(hex!("000102030405060708090a0b0c0d0e00"));
        let d = SymmetricKey::new(KeyFamily::Camellia, a.as_bytes());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.bits(), 128);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::aes([0x41u8; 16]);
        let out = format!("{:?}", key);
        assert!(!out.contains("65"));
        assert!(out.contains("bits: 128"));

        let password = Password::new("hunter2");
        assert!(!format!("{:?}", password).contains("hunter2"));
    }

    #[test]
    fn test_password_converters() {
        let ascii = Password::new("correcthorse").with_converter(PasswordConverter::Ascii);
        let utf8 = Password::new("correcthorse");
        assert_eq!(&*ascii.to_bytes(), b"correcthorse");
        assert_eq!(ascii.to_bytes(), utf8.to_bytes());

        let ascii = Password::new("caf\u{e9}").with_converter(PasswordConverter::Ascii);
        let utf8 = Password::new("caf\u{e9}");
        assert_eq!(&*ascii.to_bytes(), &hex!("636166e9"));
        assert_eq!(&*utf8.to_bytes(), &hex!("636166c3a9"));
    }

    #[test]
    fn test_lift() {
        let lifted = AgreementKeyMaterial::lift(&7u8);
        assert_eq!(*lifted.static_key(), 7);
        assert_eq!(lifted.ephemeral_key(), Some(&7));
        assert_eq!(AgreementKeyMaterial::Static(1u8).ephemeral_key(), None);
    }
}
