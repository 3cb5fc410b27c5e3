//! Key agreement recipients: ECDH and one-pass ECMQV.

use std::str::FromStr;

use cms::content_info::CmsVersion;
use cms::enveloped_data::{OriginatorIdentifierOrKey, RecipientInfo, RecipientInfos};
use cms::cert::IssuerAndSerialNumber;
use cms_recipient::{
    generate_recipient_infos, oids, CertificateId, Error, KeyAgreeRecipientInfoGenerator,
    MqvUserKeyingMaterial, PrivateKey, ProtectionKind, RecipientId, RecipientInformation,
    RecipientInformationStore, RecoveryContext, RecoveryErrorKind, Resolver, SecureReadable,
    SymmetricKey,
};
use der::asn1::{BitString, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Tag, Tagged};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

const CONTENT: &[u8] = b"key agreement content";

macro_rules! ec_key_pair {
    ($curve:ident, $seed:expr) => {{
        use $curve::pkcs8::{EncodePrivateKey, EncodePublicKey};
        let mut rng = ChaCha8Rng::from_seed([$seed; 32]);
        let secret = $curve::SecretKey::random(&mut rng);
        let private = PrivateKey::from_pkcs8_der(secret.to_pkcs8_der().unwrap().as_bytes()).unwrap();
        let public = secret.public_key().to_public_key_der().unwrap();
        (
            private,
            SubjectPublicKeyInfoOwned::from_der(public.as_bytes()).unwrap(),
        )
    }};
}

fn p256_key_pair(seed: u8) -> (PrivateKey, SubjectPublicKeyInfoOwned) {
    ec_key_pair!(p256, seed)
}

fn p384_key_pair(seed: u8) -> (PrivateKey, SubjectPublicKeyInfoOwned) {
    ec_key_pair!(p384, seed)
}

fn issuer_serial(cn: &str, serial: u8) -> CertificateId {
    let name = Name::from_str(&format!("CN={}", cn)).unwrap();
    CertificateId::issuer_serial(&name, &SerialNumber::new(&[serial]).unwrap()).unwrap()
}

fn context(resolver: &Resolver, content_key: &SymmetricKey, seed: u8) -> RecoveryContext {
    let mut rng = ChaCha8Rng::from_seed([seed; 32]);
    let algorithm = resolver
        .generate_content_algorithm(&oids::AES128_CBC, None, &mut rng)
        .unwrap();
    let ciphertext = resolver
        .encrypt_content(&algorithm, content_key, CONTENT, None)
        .unwrap();
    RecoveryContext::new(
        resolver,
        SecureReadable::buffered(algorithm, ProtectionKind::Encipher, ciphertext),
    )
}

fn only_kari(infos: &RecipientInfos) -> cms::enveloped_data::KeyAgreeRecipientInfo {
    match infos.0.iter().next().unwrap() {
        RecipientInfo::Kari(kari) => kari.clone(),
        _ => panic!("expected a key agreement record"),
    }
}

#[test]
fn ecdh_two_recipients_round_trip() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([1; 32]);
    let (sender_private, sender_public) = p256_key_pair(1);
    let (alice_private, alice_public) = p256_key_pair(2);
    let (bob_private, bob_public) = p256_key_pair(3);
    let alice = CertificateId::subject_key_id(b"alice".to_vec());
    let bob = issuer_serial("bob", 3);

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECDH_STD_SHA256_KDF,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public)
    .add_recipient(bob.clone(), bob_public)
    .with_ukm(b"ukm".to_vec());

    let content_key = SymmetricKey::aes([0x31u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();
    let kari = only_kari(&infos);
    assert_eq!(kari.version, CmsVersion::V3);
    assert_eq!(kari.key_enc_alg.oid, oids::ECDH_STD_SHA256_KDF);
    assert_eq!(kari.recipient_enc_keys.len(), 2);
    assert_eq!(kari.ukm.as_ref().unwrap().as_bytes(), b"ukm");
    let OriginatorIdentifierOrKey::OriginatorKey(originator) = &kari.originator else {
        panic!("expected an embedded originator key");
    };
    assert_eq!(originator.algorithm.oid, oids::EC_PUBLIC_KEY);
    assert!(originator.algorithm.parameters.is_none());

    let store =
        RecipientInformationStore::from_recipient_infos(&infos, &context(&resolver, &content_key, 1))
            .unwrap();
    assert_eq!(store.size(), 2);

    let RecipientInformation::KeyAgree(entry) =
        store.get(&RecipientId::key_agree(alice.clone())).unwrap()
    else {
        panic!("expected a key agreement entry");
    };
    assert_eq!(entry.wrap_algorithm().unwrap().oid, oids::AES128_WRAP);
    assert_eq!(entry.ukm(), Some(&b"ukm"[..]));
    assert_eq!(entry.recover_with_private_key(&alice_private).unwrap(), content_key);

    let bob_entry = store.get(&RecipientId::key_agree(bob)).unwrap();
    assert_eq!(bob_entry.recover(&bob_private).unwrap(), content_key);
    assert_eq!(bob_entry.open_content().unwrap().into_bytes().unwrap(), CONTENT);

    // Alice's key against Bob's wrapped key.
    let err = store
        .get(&RecipientId::key_agree(alice))
        .unwrap()
        .recover(&bob_private)
        .unwrap_err();
    assert_eq!(err.recovery_kind(), Some(RecoveryErrorKind::UnwrapFailed));
}

#[test]
fn inner_wrap_algorithm_carries_null_parameters() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([11; 32]);
    let (sender_private, sender_public) = p256_key_pair(11);
    let (_, alice_public) = p256_key_pair(12);

    for wrap in [oids::AES128_WRAP, oids::AES256_WRAP] {
        let generator = KeyAgreeRecipientInfoGenerator::new(
            &resolver,
            oids::ECDH_STD_SHA256_KDF,
            wrap,
            sender_private.clone(),
            sender_public.clone(),
        )
        .add_recipient(CertificateId::subject_key_id(b"alice".to_vec()), alice_public.clone());

        let content_key = SymmetricKey::aes([0x3au8; 16]);
        let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();
        let kari = only_kari(&infos);
        let inner = AlgorithmIdentifierOwned::from_der(
            &kari.key_enc_alg.parameters.unwrap().to_der().unwrap(),
        )
        .unwrap();
        assert_eq!(inner.oid, wrap);
        assert_eq!(inner.parameters.unwrap().tag(), Tag::Null);
    }
}

#[test]
fn ecdh_key_on_other_curve_is_invalid_credential() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([4; 32]);
    let (sender_private, sender_public) = p256_key_pair(4);
    let (_, alice_public) = p256_key_pair(5);
    let (p384_private, _) = p384_key_pair(6);
    let alice = CertificateId::subject_key_id(b"alice".to_vec());

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECDH_STD_SHA1_KDF,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public);
    let content_key = SymmetricKey::aes([0x32u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();
    let store =
        RecipientInformationStore::from_recipient_infos(&infos, &context(&resolver, &content_key, 4))
            .unwrap();

    let err = store
        .get(&RecipientId::key_agree(alice))
        .unwrap()
        .recover(&p384_private)
        .unwrap_err();
    assert_eq!(err.recovery_kind(), Some(RecoveryErrorKind::InvalidCredential));
}

#[test]
fn ecmqv_p256_round_trip() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([7; 32]);
    let (sender_private, sender_public) = p256_key_pair(7);
    let (alice_private, alice_public) = p256_key_pair(8);
    let alice = issuer_serial("alice", 8);

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECMQV_SHA1_KDF,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public)
    .with_ukm(b"extra".to_vec());

    let content_key = SymmetricKey::aes([0x33u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();

    let kari = only_kari(&infos);
    let mqv = MqvUserKeyingMaterial::from_der(kari.ukm.as_ref().unwrap().as_bytes()).unwrap();
    assert_eq!(mqv.ephemeral_public_key.algorithm.oid, oids::EC_PUBLIC_KEY);
    assert_eq!(mqv.added_ukm.as_ref().unwrap().as_bytes(), b"extra");

    let store =
        RecipientInformationStore::from_recipient_infos(&infos, &context(&resolver, &content_key, 7))
            .unwrap();
    let entry = store.get(&RecipientId::key_agree(alice)).unwrap();
    assert_eq!(entry.recover(&alice_private).unwrap(), content_key);
}

#[test]
fn ecmqv_p384_round_trip() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([9; 32]);
    let (sender_private, sender_public) = p384_key_pair(9);
    let (alice_private, alice_public) = p384_key_pair(10);
    let alice = CertificateId::subject_key_id(b"alice-384".to_vec());

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECMQV_SHA256_KDF,
        oids::AES256_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public);

    let content_key = SymmetricKey::aes([0x34u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();
    let store =
        RecipientInformationStore::from_recipient_infos(&infos, &context(&resolver, &content_key, 9))
            .unwrap();
    let entry = store.get(&RecipientId::key_agree(alice)).unwrap();
    assert_eq!(entry.recover(&alice_private).unwrap(), content_key);
}

#[test]
fn tampered_ephemeral_key_fails() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([11; 32]);
    let (sender_private, sender_public) = p256_key_pair(11);
    let (alice_private, alice_public) = p256_key_pair(12);
    let alice = CertificateId::subject_key_id(b"alice".to_vec());

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECMQV_SHA1_KDF,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public);
    let content_key = SymmetricKey::aes([0x35u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();

    let mut kari = only_kari(&infos);
    let mut mqv = MqvUserKeyingMaterial::from_der(kari.ukm.as_ref().unwrap().as_bytes()).unwrap();
    let mut point = mqv.ephemeral_public_key.public_key.raw_bytes().to_vec();
    let last = point.len() - 1;
    point[last] ^= 0x01;
    mqv.ephemeral_public_key.public_key = BitString::from_bytes(&point).unwrap();
    kari.ukm = Some(OctetString::new(mqv.to_der().unwrap()).unwrap());
    let tampered = RecipientInfos::try_from(vec![RecipientInfo::Kari(kari)]).unwrap();

    let store = RecipientInformationStore::from_recipient_infos(
        &tampered,
        &context(&resolver, &content_key, 11),
    )
    .unwrap();
    let entry = store.get(&RecipientId::key_agree(alice)).unwrap();
    assert!(entry.recover(&alice_private).unwrap_err().recovery_kind().is_some());
    assert!(entry.recovered_key().is_none());
}

#[test]
fn certificate_originator_is_unsupported() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([13; 32]);
    let (sender_private, sender_public) = p256_key_pair(13);
    let (alice_private, alice_public) = p256_key_pair(14);
    let alice = CertificateId::subject_key_id(b"alice".to_vec());

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        oids::ECDH_STD_SHA256_KDF,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(alice.clone(), alice_public);
    let content_key = SymmetricKey::aes([0x36u8; 16]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();

    let mut kari = only_kari(&infos);
    kari.originator = OriginatorIdentifierOrKey::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: Name::from_str("CN=sender").unwrap(),
        serial_number: SerialNumber::new(&[13]).unwrap(),
    });
    let rewritten = RecipientInfos::try_from(vec![RecipientInfo::Kari(kari)]).unwrap();
    let store = RecipientInformationStore::from_recipient_infos(
        &rewritten,
        &context(&resolver, &content_key, 13),
    )
    .unwrap();

    let err = store
        .get(&RecipientId::key_agree(alice))
        .unwrap()
        .recover(&alice_private)
        .unwrap_err();
    assert_eq!(err.recovery_kind(), Some(RecoveryErrorKind::UnsupportedOriginator));
}

#[test]
fn unknown_agreement_is_unavailable() {
    let resolver = Resolver::new();
    let mut rng = ChaCha8Rng::from_seed([15; 32]);
    let (sender_private, sender_public) = p256_key_pair(15);
    let (_, alice_public) = p256_key_pair(16);
    let unknown = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1");

    let generator = KeyAgreeRecipientInfoGenerator::new(
        &resolver,
        unknown,
        oids::AES128_WRAP,
        sender_private,
        sender_public,
    )
    .add_recipient(CertificateId::subject_key_id(b"alice".to_vec()), alice_public);
    let err = generate_recipient_infos(&[&generator], &SymmetricKey::aes([0u8; 16]), &mut rng)
        .unwrap_err();
    assert!(matches!(err, Error::AlgorithmUnavailable { algorithm, .. } if algorithm == unknown));
}
