//! Backend built on the RustCrypto crates.

use aes::{Aes128, Aes192, Aes256};
use aes_kw::Kek;
use cbc::cipher::block_padding::{Pkcs7, RawPadding};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Any, Decode, Encode, Tag, Tagged};
use des::TdesEde3;
use digest::DynDigest;
use hmac::{Hmac, Mac};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rand_core::CryptoRngCore;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use zeroize::Zeroizing;

use super::{ecmqv, rfc3211};
use super::{
    AsymmetricCipher, Backend, BackendError, BackendResult, ContentCipher, ContentDecryptor,
    KeyAgreement, KeyGenerator, KeyPairGenerator, KeyWrapper, MacAlgorithm, MacState,
    ParameterCodec, PasswordKdf, PasswordWrapper,
};
use crate::asn1::decode_any;
use crate::key::{AgreementPrivateKey, AgreementPublicKey, KeyFamily, PrivateKey, SymmetricKey};
use crate::oids;

/// Default backend, implemented with the RustCrypto crates.
///
/// Supports AES and triple-DES CBC content encryption, HMAC-SHA1/SHA2,
/// RFC 3394 AES key wrap, RFC 3211 password key wrap, RSA PKCS #1 v1.5 and
/// OAEP key transport, ECDH and one-pass ECMQV over P-256 and P-384, and
/// PBKDF2. Some capabilities answer to their object identifiers directly,
/// others only to their registered names.
#[derive(Copy, Clone, Debug, Default)]
pub struct RustCryptoBackend;

impl RustCryptoBackend {
    /// Name of this backend.
    pub const NAME: &'static str = "RustCrypto";

    /// Create the backend.
    pub fn new() -> Self {
        RustCryptoBackend
    }
}

fn parse_oid(algorithm: &str) -> Option<ObjectIdentifier> {
    ObjectIdentifier::new(algorithm).ok()
}

impl Backend for RustCryptoBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn content_cipher(&self, algorithm: &str) -> BackendResult<Box<dyn ContentCipher>> {
        match algorithm {
            "AES/CBC/PKCS5Padding" => Ok(Box::new(CbcCipher(BlockKind::Aes))),
            "DESEDE/CBC/PKCS5Padding" => Ok(Box::new(CbcCipher(BlockKind::DesEde))),
            _ => Err(BackendError::unsupported("content cipher", algorithm)),
        }
    }

    fn mac(&self, algorithm: &str) -> BackendResult<Box<dyn MacAlgorithm>> {
        let hash = match (algorithm, parse_oid(algorithm)) {
            ("HmacSHA1", _) | (_, Some(oids::HMAC_WITH_SHA1 | oids::HMAC_SHA1)) => HashKind::Sha1,
            ("HmacSHA224", _) | (_, Some(oids::HMAC_WITH_SHA224)) => HashKind::Sha224,
            ("HmacSHA256", _) | (_, Some(oids::HMAC_WITH_SHA256)) => HashKind::Sha256,
            ("HmacSHA384", _) | (_, Some(oids::HMAC_WITH_SHA384)) => HashKind::Sha384,
            ("HmacSHA512", _) | (_, Some(oids::HMAC_WITH_SHA512)) => HashKind::Sha512,
            _ => return Err(BackendError::unsupported("MAC", algorithm)),
        };
        Ok(Box::new(HmacAlgorithm(hash)))
    }

    fn key_generator(&self, algorithm: &str) -> BackendResult<Box<dyn KeyGenerator>> {
        let generator = match algorithm {
            "AES" => RandomKeyGenerator {
                family: KeyFamily::Aes,
                default_bits: 128,
                allowed: &[128, 192, 256],
            },
            "DESEDE" => RandomKeyGenerator {
                family: KeyFamily::DesEde,
                default_bits: 192,
                allowed: &[192],
            },
            "HmacSHA1" | "HmacSHA224" | "HmacSHA256" | "HmacSHA384" | "HmacSHA512" => {
                RandomKeyGenerator {
                    family: KeyFamily::Generic,
                    default_bits: 256,
                    allowed: &[],
                }
            }
            _ => return Err(BackendError::unsupported("key generator", algorithm)),
        };
        Ok(Box::new(generator))
    }

    fn parameters(&self, algorithm: &str) -> BackendResult<Box<dyn ParameterCodec>> {
        match algorithm {
            "AES" => Ok(Box::new(IvParameters(BlockKind::Aes))),
            "DESEDE" => Ok(Box::new(IvParameters(BlockKind::DesEde))),
            _ => Err(BackendError::unsupported("parameters", algorithm)),
        }
    }

    fn key_wrapper(&self, algorithm: &str) -> BackendResult<Box<dyn KeyWrapper>> {
        match (algorithm, parse_oid(algorithm)) {
            ("AESWrap", _)
            | (_, Some(oids::AES128_WRAP | oids::AES192_WRAP | oids::AES256_WRAP)) => {
                Ok(Box::new(AesKeyWrap))
            }
            _ => Err(BackendError::unsupported("key wrap", algorithm)),
        }
    }

    fn password_wrapper(&self, algorithm: &str) -> BackendResult<Box<dyn PasswordWrapper>> {
        match algorithm {
            "AESRFC3211Wrap" => Ok(Box::new(Rfc3211Wrap(BlockKind::Aes))),
            "DESEDERFC3211Wrap" => Ok(Box::new(Rfc3211Wrap(BlockKind::DesEde))),
            _ => Err(BackendError::unsupported("password key wrap", algorithm)),
        }
    }

    fn asymmetric_cipher(&self, algorithm: &str) -> BackendResult<Box<dyn AsymmetricCipher>> {
        match (algorithm, parse_oid(algorithm)) {
            ("RSA/ECB/PKCS1Padding", _) | (_, Some(oids::RSA_ENCRYPTION)) => {
                Ok(Box::new(RsaCipher { oaep: false }))
            }
            ("RSA/ECB/OAEPPadding", _) => Ok(Box::new(RsaCipher { oaep: true })),
            _ => Err(BackendError::unsupported("asymmetric cipher", algorithm)),
        }
    }

    fn key_agreement(&self, algorithm: &str) -> BackendResult<Box<dyn KeyAgreement>> {
        match algorithm {
            // cofactor variants coincide with plain ECDH on prime-order curves
            "ECDH" | "ECCDH" => Ok(Box::new(EcdhAgreement)),
            "ECMQV" => Ok(Box::new(EcMqvAgreement)),
            _ => Err(BackendError::unsupported("key agreement", algorithm)),
        }
    }

    fn key_pair_generator(&self, algorithm: &str) -> BackendResult<Box<dyn KeyPairGenerator>> {
        match (algorithm, parse_oid(algorithm)) {
            ("EC", _) | (_, Some(oids::EC_PUBLIC_KEY)) => Ok(Box::new(EcKeyPairGenerator)),
            _ => Err(BackendError::unsupported("key pair generator", algorithm)),
        }
    }

    fn password_kdf(&self, algorithm: &str) -> BackendResult<Box<dyn PasswordKdf>> {
        match (algorithm, parse_oid(algorithm)) {
            ("PBKDF2", _) | (_, Some(oids::PBKDF2)) => Ok(Box::new(Pbkdf2Kdf)),
            _ => Err(BackendError::unsupported("password KDF", algorithm)),
        }
    }

    fn digest(&self, algorithm: &str) -> BackendResult<Box<dyn DynDigest>> {
        let hash = match (algorithm, parse_oid(algorithm)) {
            ("SHA1", _) | (_, Some(oids::SHA1)) => HashKind::Sha1,
            ("SHA224", _) | (_, Some(oids::SHA224)) => HashKind::Sha224,
            ("SHA256", _) | (_, Some(oids::SHA256)) => HashKind::Sha256,
            ("SHA384", _) | (_, Some(oids::SHA384)) => HashKind::Sha384,
            ("SHA512", _) | (_, Some(oids::SHA512)) => HashKind::Sha512,
            _ => return Err(BackendError::unsupported("digest", algorithm)),
        };
        Ok(hash.digest())
    }
}

#[derive(Copy, Clone, Debug)]
enum HashKind {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    fn digest(self) -> Box<dyn DynDigest> {
        match self {
            HashKind::Sha1 => Box::new(Sha1::default()),
            HashKind::Sha224 => Box::new(Sha224::default()),
            HashKind::Sha256 => Box::new(Sha256::default()),
            HashKind::Sha384 => Box::new(Sha384::default()),
            HashKind::Sha512 => Box::new(Sha512::default()),
        }
    }

    fn output_size(self) -> usize {
        match self {
            HashKind::Sha1 => 20,
            HashKind::Sha224 => 28,
            HashKind::Sha256 => 32,
            HashKind::Sha384 => 48,
            HashKind::Sha512 => 64,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum BlockKind {
    Aes,
    DesEde,
}

impl BlockKind {
    fn block_size(self) -> usize {
        match self {
            BlockKind::Aes => 16,
            BlockKind::DesEde => 8,
        }
    }
}

struct CbcCipher(BlockKind);

macro_rules! cbc_encrypt {
    ($cipher:ty, $key:expr, $iv:expr, $plaintext:expr) => {
        cbc::Encryptor::<$cipher>::new_from_slices($key, $iv)
            .map_err(|_| BackendError::InvalidKey)?
            .encrypt_padded_vec_mut::<Pkcs7>($plaintext)
    };
}

impl ContentCipher for CbcCipher {
    fn block_size(&self) -> usize {
        self.0.block_size()
    }

    fn encrypt(&self, key: &SymmetricKey, iv: &[u8], plaintext: &[u8]) -> BackendResult<Vec<u8>> {
        if iv.len() != self.block_size() {
            return Err(BackendError::InvalidParameters);
        }
        let key = key.as_bytes();
        Ok(match (self.0, key.len()) {
            (BlockKind::Aes, 16) => cbc_encrypt!(Aes128, key, iv, plaintext),
            (BlockKind::Aes, 24) => cbc_encrypt!(Aes192, key, iv, plaintext),
            (BlockKind::Aes, 32) => cbc_encrypt!(Aes256, key, iv, plaintext),
            (BlockKind::DesEde, 24) => cbc_encrypt!(TdesEde3, key, iv, plaintext),
            _ => return Err(BackendError::InvalidKey),
        })
    }

    fn decryptor(&self, key: &SymmetricKey, iv: &[u8]) -> BackendResult<Box<dyn ContentDecryptor>> {
        if iv.len() != self.block_size() {
            return Err(BackendError::InvalidParameters);
        }
        let key = key.as_bytes();
        let mode = match (self.0, key.len()) {
            (BlockKind::Aes, 16) => CbcMode::Aes128(new_decryptor(key, iv)?),
            (BlockKind::Aes, 24) => CbcMode::Aes192(new_decryptor(key, iv)?),
            (BlockKind::Aes, 32) => CbcMode::Aes256(new_decryptor(key, iv)?),
            (BlockKind::DesEde, 24) => CbcMode::DesEde3(new_decryptor(key, iv)?),
            _ => return Err(BackendError::InvalidKey),
        };
        Ok(Box::new(CbcDecryptor {
            mode,
            block_size: self.block_size(),
            pending: Zeroizing::new(Vec::new()),
        }))
    }
}

fn new_decryptor<C: KeyIvInit>(key: &[u8], iv: &[u8]) -> BackendResult<C> {
    C::new_from_slices(key, iv).map_err(|_| BackendError::InvalidKey)
}

enum CbcMode {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
    DesEde3(cbc::Decryptor<TdesEde3>),
}

impl CbcMode {
    fn decrypt_block(&mut self, block: &mut [u8]) {
        match self {
            CbcMode::Aes128(c) => c.decrypt_block_mut(GenericArray::from_mut_slice(block)),
            CbcMode::Aes192(c) => c.decrypt_block_mut(GenericArray::from_mut_slice(block)),
            CbcMode::Aes256(c) => c.decrypt_block_mut(GenericArray::from_mut_slice(block)),
            CbcMode::DesEde3(c) => c.decrypt_block_mut(GenericArray::from_mut_slice(block)),
        }
    }
}

/// CBC decryption that holds back the final block until `finish`, where
/// the PKCS #7 padding is checked.
struct CbcDecryptor {
    mode: CbcMode,
    block_size: usize,
    pending: Zeroizing<Vec<u8>>,
}

impl ContentDecryptor for CbcDecryptor {
    fn update(&mut self, input: &[u8], output: &mut Vec<u8>) -> BackendResult<()> {
        self.pending.extend_from_slice(input);

        let keep = match self.pending.len() % self.block_size {
            0 => self.block_size,
            rem => rem,
        };
        let ready = self.pending.len().saturating_sub(keep);
        for block in self.pending[..ready].chunks_exact_mut(self.block_size) {
            self.mode.decrypt_block(block);
        }
        output.extend_from_slice(&self.pending[..ready]);
        self.pending.drain(..ready);
        Ok(())
    }

    fn finish(mut self: Box<Self>, output: &mut Vec<u8>) -> BackendResult<()> {
        if self.pending.len() != self.block_size {
            return Err(BackendError::Failed);
        }
        let mut last = Zeroizing::new(core::mem::take(&mut *self.pending));
        self.mode.decrypt_block(&mut last);
        let unpadded = Pkcs7::raw_unpad(&last).map_err(|_| BackendError::Failed)?;
        output.extend_from_slice(unpadded);
        Ok(())
    }
}

/// CBC parameters: the IV as a bare OCTET STRING.
struct IvParameters(BlockKind);

impl ParameterCodec for IvParameters {
    fn iv_len(&self) -> usize {
        self.0.block_size()
    }

    fn generate_iv(&self, rng: &mut dyn CryptoRngCore) -> BackendResult<Vec<u8>> {
        let mut iv = vec![0u8; self.iv_len()];
        rng.fill_bytes(&mut iv);
        Ok(iv)
    }

    fn encode(&self, iv: &[u8]) -> BackendResult<Any> {
        if iv.len() != self.iv_len() {
            return Err(BackendError::InvalidParameters);
        }
        Ok(Any::from_der(&OctetString::new(iv)?.to_der()?)?)
    }

    fn decode(&self, params: &Any) -> BackendResult<Vec<u8>> {
        if params.tag() != Tag::OctetString || params.value().len() != self.iv_len() {
            return Err(BackendError::InvalidParameters);
        }
        Ok(params.value().to_vec())
    }
}

struct HmacAlgorithm(HashKind);

enum HmacState {
    Sha1(Hmac<Sha1>),
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

fn new_hmac<M: Mac + hmac::digest::KeyInit>(key: &SymmetricKey) -> BackendResult<M> {
    <M as Mac>::new_from_slice(key.as_bytes()).map_err(|_| BackendError::InvalidKey)
}

impl MacAlgorithm for HmacAlgorithm {
    fn output_size(&self) -> usize {
        self.0.output_size()
    }

    fn start(&self, key: &SymmetricKey) -> BackendResult<Box<dyn MacState>> {
        let state = match self.0 {
            HashKind::Sha1 => HmacState::Sha1(new_hmac(key)?),
            HashKind::Sha224 => HmacState::Sha224(new_hmac(key)?),
            HashKind::Sha256 => HmacState::Sha256(new_hmac(key)?),
            HashKind::Sha384 => HmacState::Sha384(new_hmac(key)?),
            HashKind::Sha512 => HmacState::Sha512(new_hmac(key)?),
        };
        Ok(Box::new(state))
    }
}

impl MacState for HmacState {
    fn update(&mut self, data: &[u8]) {
        match self {
            HmacState::Sha1(m) => m.update(data),
            HmacState::Sha224(m) => m.update(data),
            HmacState::Sha256(m) => m.update(data),
            HmacState::Sha384(m) => m.update(data),
            HmacState::Sha512(m) => m.update(data),
        }
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        match *self {
            HmacState::Sha1(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha224(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha256(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha384(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }
}

struct RandomKeyGenerator {
    family: KeyFamily,
    default_bits: usize,
    /// Permitted lengths; empty means any multiple of eight.
    allowed: &'static [usize],
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate(
        &self,
        bits: Option<usize>,
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<SymmetricKey> {
        let bits = bits.unwrap_or(self.default_bits);
        if bits == 0 || bits % 8 != 0 || !(self.allowed.is_empty() || self.allowed.contains(&bits))
        {
            return Err(BackendError::InvalidParameters);
        }
        let mut bytes = Zeroizing::new(vec![0u8; bits / 8]);
        rng.fill_bytes(&mut bytes);
        Ok(SymmetricKey::new(self.family, bytes.as_slice()))
    }
}

/// RFC 3394 AES key wrap; the KEK length selects AES-128/192/256.
struct AesKeyWrap;

macro_rules! aes_kw {
    ($kek:expr, |$wrapper:ident| $body:expr) => {{
        let kek = $kek.as_bytes();
        match kek.len() {
            16 => {
                let $wrapper = Kek::<Aes128>::new(GenericArray::from_slice(kek));
                $body
            }
            24 => {
                let $wrapper = Kek::<Aes192>::new(GenericArray::from_slice(kek));
                $body
            }
            32 => {
                let $wrapper = Kek::<Aes256>::new(GenericArray::from_slice(kek));
                $body
            }
            _ => Err(BackendError::InvalidKey),
        }
    }};
}

impl KeyWrapper for AesKeyWrap {
    fn wrap(&self, kek: &SymmetricKey, key: &[u8]) -> BackendResult<Vec<u8>> {
        aes_kw!(kek, |wrapper| wrapper
            .wrap_vec(key)
            .map_err(|_| BackendError::InvalidParameters))
    }

    fn unwrap(&self, kek: &SymmetricKey, wrapped: &[u8]) -> BackendResult<Zeroizing<Vec<u8>>> {
        aes_kw!(kek, |wrapper| wrapper
            .unwrap_vec(wrapped)
            .map(Zeroizing::new)
            .map_err(|_| BackendError::Failed))
    }
}

struct Rfc3211Wrap(BlockKind);

impl PasswordWrapper for Rfc3211Wrap {
    fn block_size(&self) -> usize {
        self.0.block_size()
    }

    fn wrap(
        &self,
        kek: &SymmetricKey,
        iv: &[u8],
        key: &[u8],
        rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<Vec<u8>> {
        let kek = kek.as_bytes();
        match (self.0, kek.len()) {
            (BlockKind::Aes, 16) => rfc3211::wrap::<Aes128>(kek, iv, key, rng),
            (BlockKind::Aes, 24) => rfc3211::wrap::<Aes192>(kek, iv, key, rng),
            (BlockKind::Aes, 32) => rfc3211::wrap::<Aes256>(kek, iv, key, rng),
            (BlockKind::DesEde, 24) => rfc3211::wrap::<TdesEde3>(kek, iv, key, rng),
            _ => Err(BackendError::InvalidKey),
        }
    }

    fn unwrap(
        &self,
        kek: &SymmetricKey,
        iv: &[u8],
        wrapped: &[u8],
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        let kek = kek.as_bytes();
        match (self.0, kek.len()) {
            (BlockKind::Aes, 16) => rfc3211::unwrap::<Aes128>(kek, iv, wrapped),
            (BlockKind::Aes, 24) => rfc3211::unwrap::<Aes192>(kek, iv, wrapped),
            (BlockKind::Aes, 32) => rfc3211::unwrap::<Aes256>(kek, iv, wrapped),
            (BlockKind::DesEde, 24) => rfc3211::unwrap::<TdesEde3>(kek, iv, wrapped),
            _ => Err(BackendError::InvalidKey),
        }
    }
}

/// RSA encryption; only the default SHA-1 parameters are supported for OAEP.
struct RsaCipher {
    oaep: bool,
}

impl AsymmetricCipher for RsaCipher {
    fn encrypt(
        &self,
        recipient: &SubjectPublicKeyInfoOwned,
        plaintext: &[u8],
        mut rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<Vec<u8>> {
        let key = RsaPublicKey::from_public_key_der(&recipient.to_der()?)
            .map_err(|_| BackendError::InvalidKey)?;
        let result = if self.oaep {
            key.encrypt(&mut rng, Oaep::new::<Sha1>(), plaintext)
        } else {
            key.encrypt(&mut rng, Pkcs1v15Encrypt, plaintext)
        };
        result.map_err(|_| BackendError::InvalidKey)
    }

    fn decrypt(
        &self,
        private_key: &PrivateKey,
        ciphertext: &[u8],
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        let key = RsaPrivateKey::from_pkcs8_der(private_key.as_pkcs8_der())
            .map_err(|_| BackendError::InvalidKey)?;
        let result = if self.oaep {
            key.decrypt(Oaep::new::<Sha1>(), ciphertext)
        } else {
            key.decrypt(Pkcs1v15Encrypt, ciphertext)
        };
        result.map(Zeroizing::new).map_err(|_| BackendError::Failed)
    }
}

/// Named curve of an EC key's algorithm identifier.
fn named_curve(algorithm: &AlgorithmIdentifierOwned) -> BackendResult<ObjectIdentifier> {
    if algorithm.oid != oids::EC_PUBLIC_KEY {
        return Err(BackendError::InvalidKey);
    }
    let params = algorithm
        .parameters
        .as_ref()
        .ok_or(BackendError::InvalidParameters)?;
    Ok(decode_any::<ObjectIdentifier>(params)?)
}

fn same_curve(
    private_key: &PrivateKey,
    public_key: &SubjectPublicKeyInfoOwned,
) -> BackendResult<ObjectIdentifier> {
    let curve = named_curve(private_key.algorithm())?;
    if named_curve(&public_key.algorithm)? != curve {
        return Err(BackendError::InvalidKey);
    }
    Ok(curve)
}

macro_rules! ec_keys {
    ($curve:ident, $private:expr, $public:expr) => {{
        let secret = $curve::SecretKey::from_pkcs8_der($private.as_pkcs8_der())
            .map_err(|_| BackendError::InvalidKey)?;
        let public = $curve::PublicKey::from_public_key_der(&$public.to_der()?)
            .map_err(|_| BackendError::InvalidKey)?;
        (secret, public)
    }};
}

struct EcdhAgreement;

impl KeyAgreement for EcdhAgreement {
    fn agree(
        &self,
        private_key: &AgreementPrivateKey,
        public_key: &AgreementPublicKey,
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        let (AgreementPrivateKey::Static(private_key), AgreementPublicKey::Static(public_key)) =
            (private_key, public_key)
        else {
            return Err(BackendError::InvalidKey);
        };

        let z = match same_curve(private_key, public_key)? {
            oids::SECP256R1 => {
                let (secret, public) = ec_keys!(p256, private_key, public_key);
                let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                shared.raw_secret_bytes().to_vec()
            }
            oids::SECP384R1 => {
                let (secret, public) = ec_keys!(p384, private_key, public_key);
                let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                shared.raw_secret_bytes().to_vec()
            }
            _ => return Err(BackendError::InvalidParameters),
        };
        Ok(Zeroizing::new(z))
    }
}

struct EcMqvAgreement;

impl KeyAgreement for EcMqvAgreement {
    fn agree(
        &self,
        private_key: &AgreementPrivateKey,
        public_key: &AgreementPublicKey,
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        let (
            AgreementPrivateKey::StaticPlusEphemeral {
                static_key: static_private,
                ephemeral_key: ephemeral_private,
            },
            AgreementPublicKey::StaticPlusEphemeral {
                static_key: static_public,
                ephemeral_key: ephemeral_public,
            },
        ) = (private_key, public_key)
        else {
            return Err(BackendError::InvalidKey);
        };

        let curve = same_curve(static_private, static_public)?;
        if same_curve(ephemeral_private, ephemeral_public)? != curve {
            return Err(BackendError::InvalidKey);
        }

        match curve {
            oids::SECP256R1 => {
                let (d1, q1) = ec_keys!(p256, static_private, static_public);
                let (d2, q2) = ec_keys!(p256, ephemeral_private, ephemeral_public);
                ecmqv::agree_p256(&d1, &d2, &q1, &q2)
            }
            oids::SECP384R1 => {
                let (d1, q1) = ec_keys!(p384, static_private, static_public);
                let (d2, q2) = ec_keys!(p384, ephemeral_private, ephemeral_public);
                ecmqv::agree_p384(&d1, &d2, &q1, &q2)
            }
            _ => Err(BackendError::InvalidParameters),
        }
    }
}

struct EcKeyPairGenerator;

macro_rules! ec_generate {
    ($curve:ident, $rng:expr) => {{
        use $curve::pkcs8::{EncodePrivateKey, EncodePublicKey};
        let secret = $curve::SecretKey::random(&mut $rng);
        let private = secret.to_pkcs8_der().map_err(|_| BackendError::Failed)?;
        let public = secret
            .public_key()
            .to_public_key_der()
            .map_err(|_| BackendError::Failed)?;
        let private =
            PrivateKey::from_pkcs8_der(private.as_bytes()).map_err(|_| BackendError::Failed)?;
        (private, SubjectPublicKeyInfoOwned::from_der(public.as_bytes())?)
    }};
}

impl KeyPairGenerator for EcKeyPairGenerator {
    fn generate(
        &self,
        parameters: &AlgorithmIdentifierOwned,
        mut rng: &mut dyn CryptoRngCore,
    ) -> BackendResult<(PrivateKey, SubjectPublicKeyInfoOwned)> {
        Ok(match named_curve(parameters)? {
            oids::SECP256R1 => ec_generate!(p256, rng),
            oids::SECP384R1 => ec_generate!(p384, rng),
            _ => return Err(BackendError::InvalidParameters),
        })
    }
}

struct Pbkdf2Kdf;

impl PasswordKdf for Pbkdf2Kdf {
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        prf: &ObjectIdentifier,
        key_len: usize,
    ) -> BackendResult<Zeroizing<Vec<u8>>> {
        if iterations == 0 || key_len == 0 {
            return Err(BackendError::InvalidParameters);
        }
        let mut out = Zeroizing::new(vec![0u8; key_len]);
        match *prf {
            oids::HMAC_WITH_SHA1 => pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out),
            oids::HMAC_WITH_SHA224 => {
                pbkdf2::pbkdf2_hmac::<Sha224>(password, salt, iterations, &mut out)
            }
            oids::HMAC_WITH_SHA256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out)
            }
            oids::HMAC_WITH_SHA384 => {
                pbkdf2::pbkdf2_hmac::<Sha384>(password, salt, iterations, &mut out)
            }
            oids::HMAC_WITH_SHA512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut out)
            }
            _ => return Err(BackendError::InvalidParameters),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use rand_chacha::ChaCha8Rng;
    use rand_core::{RngCore, SeedableRng};

    #[test]
    fn test_cbc_streaming_matches_one_shot() {
        let mut rng = ChaCha8Rng::from_seed([7; 32]);
        let key = SymmetricKey::aes([0x11u8; 16]);
        let iv = [0x22u8; 16];
        let cipher = RustCryptoBackend.content_cipher("AES/CBC/PKCS5Padding").unwrap();

        for len in [0usize, 1, 15, 16, 17, 100] {
            let mut plaintext = vec![0u8; len];
            rng.fill_bytes(&mut plaintext);
            let ciphertext = cipher.encrypt(&key, &iv, &plaintext).unwrap();

            let mut decryptor = cipher.decryptor(&key, &iv).unwrap();
            let mut out = Vec::new();
            for chunk in ciphertext.chunks(7) {
                decryptor.update(chunk, &mut out).unwrap();
            }
            decryptor.finish(&mut out).unwrap();
            assert_eq!(out, plaintext);
        }
    }

    #[test]
    fn test_cbc_rejects_truncated_ciphertext() {
        let key = SymmetricKey::aes([0x11u8; 16]);
        let iv = [0x22u8; 16];
        let cipher = RustCryptoBackend.content_cipher("AES/CBC/PKCS5Padding").unwrap();
        let ciphertext = cipher.encrypt(&key, &iv, b"attack at dawn!!").unwrap();

        let mut decryptor = cipher.decryptor(&key, &iv).unwrap();
        let mut out = Vec::new();
        decryptor.update(&ciphertext[..20], &mut out).unwrap();
        assert_eq!(decryptor.finish(&mut out), Err(BackendError::Failed));
    }

    #[test]
    fn test_aes_key_wrap_rfc3394() {
        // RFC 3394 section 4.1
        let kek = SymmetricKey::aes(hex!("000102030405060708090A0B0C0D0E0F"));
        let key = hex!("00112233445566778899AABBCCDDEEFF");
        let wrapper = RustCryptoBackend.key_wrapper("AESWrap").unwrap();

        let wrapped = wrapper.wrap(&kek, &key).unwrap();
        assert_eq!(
            wrapped,
            hex!("1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5")
        );
        assert_eq!(&*wrapper.unwrap(&kek, &wrapped).unwrap(), &key);

        let other = SymmetricKey::aes(hex!("000102030405060708090A0B0C0D0E00"));
        assert_eq!(wrapper.unwrap(&other, &wrapped), Err(BackendError::Failed));
    }

    #[test]
    fn test_oid_lookup() {
        assert!(RustCryptoBackend.key_wrapper("2.16.840.1.101.3.4.1.5").is_ok());
        assert!(RustCryptoBackend.digest("2.16.840.1.101.3.4.2.1").is_ok());
        assert!(matches!(
            RustCryptoBackend.content_cipher("2.16.840.1.101.3.4.1.2"),
            Err(err) if err.is_capability_gap()
        ));
    }

    #[test]
    fn test_pbkdf2_rfc6070() {
        // RFC 6070, two iterations
        let kdf = RustCryptoBackend.password_kdf("PBKDF2").unwrap();
        let out = kdf
            .derive(b"password", b"salt", 2, &oids::HMAC_WITH_SHA1, 20)
            .unwrap();
        assert_eq!(&*out, &hex!("ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957"));
    }

    #[test]
    fn test_hmac_sha256_rfc4231() {
        // RFC 4231 test case 2
        let mac = RustCryptoBackend.mac("HmacSHA256").unwrap();
        let mut state = mac.start(&SymmetricKey::new(KeyFamily::Generic, *b"Jefe")).unwrap();
        state.update(b"what do ya want for nothing?");
        assert_eq!(
            state.finalize(),
            hex!("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
    }

    #[test]
    fn test_ecdh_p256_symmetric() {
        let mut rng = ChaCha8Rng::from_seed([3; 32]);
        let curve = AlgorithmIdentifierOwned {
            oid: oids::EC_PUBLIC_KEY,
            parameters: Some(Any::from_der(&oids::SECP256R1.to_der().unwrap()).unwrap()),
        };
        let generator = RustCryptoBackend.key_pair_generator("EC").unwrap();
        let (a_priv, a_pub) = generator.generate(&curve, &mut rng).unwrap();
        let (b_priv, b_pub) = generator.generate(&curve, &mut rng).unwrap();

        let ecdh = RustCryptoBackend.key_agreement("ECDH").unwrap();
        let z1 = ecdh
            .agree(&AgreementPrivateKey::Static(a_priv), &AgreementPublicKey::Static(b_pub))
            .unwrap();
        let z2 = ecdh
            .agree(&AgreementPrivateKey::Static(b_priv), &AgreementPublicKey::Static(a_pub))
            .unwrap();
        assert_eq!(z1, z2);
        assert_eq!(z1.len(), 32);
    }
}
