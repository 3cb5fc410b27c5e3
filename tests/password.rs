//! Password recipients.

use cms::enveloped_data::RecipientInfo;
use cms_recipient::{
    generate_recipient_infos, oids, Password, PasswordConverter, PasswordRecipientInfoGenerator,
    Pbkdf2Parameters, ProtectionKind, RecipientId, RecipientInformation,
    RecipientInformationStore, RecoveryContext, RecoveryErrorKind, Resolver, SecureReadable,
    SymmetricKey,
};
use der::Decode;
use hex_literal::hex;
use proptest::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

const SALT: [u8; 16] = hex!("0102030405060708090a0b0c0d0e0f10");
const CONTENT: &[u8] = b"password protected content";

fn store_for(
    resolver: &Resolver,
    generator: &PasswordRecipientInfoGenerator,
    content_key: &SymmetricKey,
    seed: u8,
) -> RecipientInformationStore {
    let mut rng = ChaCha8Rng::from_seed([seed; 32]);
    let infos = generate_recipient_infos(&[generator], content_key, &mut rng).unwrap();
    let algorithm = resolver
        .generate_content_algorithm(&oids::AES128_CBC, None, &mut rng)
        .unwrap();
    let ciphertext = resolver
        .encrypt_content(&algorithm, content_key, CONTENT, None)
        .unwrap();
    let context = RecoveryContext::new(
        resolver,
        SecureReadable::buffered(algorithm, ProtectionKind::Encipher, ciphertext),
    );
    RecipientInformationStore::from_recipient_infos(&infos, &context).unwrap()
}

#[test]
fn aes128_password_round_trip() {
    let resolver = Resolver::new();
    let password = Password::new("correcthorse");
    let generator =
        PasswordRecipientInfoGenerator::new(&resolver, oids::AES128_CBC, password.clone(), SALT, 1024);
    let content_key = SymmetricKey::aes(hex!("000102030405060708090a0b0c0d0e0f"));

    let store = store_for(&resolver, &generator, &content_key, 1);
    assert_eq!(store.size(), 1);

    let RecipientInformation::Password(entry) = store.get(&RecipientId::password()).unwrap() else {
        panic!("expected a password entry");
    };
    assert_eq!(entry.key_derivation_algorithm().oid, oids::PBKDF2);
    assert_eq!(entry.wrap_cipher().oid, oids::AES128_CBC);
    assert_eq!(entry.entry().key_encryption_algorithm().oid, oids::PWRI_KEK);

    let params = Pbkdf2Parameters::from_der(
        &der::Encode::to_der(entry.key_derivation_algorithm().parameters.as_ref().unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(params.salt.as_bytes(), SALT);
    assert_eq!(params.iteration_count, 1024);
    assert_eq!(params.prf.oid, oids::HMAC_WITH_SHA1);

    assert_eq!(entry.recover_with_password(&password).unwrap(), content_key);
    assert_eq!(
        store.all()[0].open_content().unwrap().into_bytes().unwrap(),
        CONTENT
    );
}

#[test]
fn wrong_password_fails() {
    let resolver = Resolver::new();
    let generator = PasswordRecipientInfoGenerator::new(
        &resolver,
        oids::AES256_CBC,
        Password::new("correcthorse"),
        SALT,
        1000,
    );
    let content_key = SymmetricKey::aes([0x5cu8; 16]);
    let store = store_for(&resolver, &generator, &content_key, 2);
    let entry = store.get(&RecipientId::password()).unwrap();

    let err = entry.recover(&Password::new("batterystaple")).unwrap_err();
    assert_eq!(err.recovery_kind(), Some(RecoveryErrorKind::UnwrapFailed));
    assert!(entry.recovered_key().is_none());

    let err = entry.recover(&content_key).unwrap_err();
    assert_eq!(err.recovery_kind(), Some(RecoveryErrorKind::InvalidCredential));
}

#[test]
fn hmac_sha256_prf_round_trip() {
    let resolver = Resolver::new();
    let password = Password::new("correcthorse");
    let generator =
        PasswordRecipientInfoGenerator::new(&resolver, oids::AES192_CBC, password.clone(), SALT, 2048)
            .with_prf(oids::HMAC_WITH_SHA256);
    let content_key = SymmetricKey::aes([0x77u8; 16]);

    let mut rng = ChaCha8Rng::from_seed([3; 32]);
    let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng).unwrap();
    let RecipientInfo::Pwri(record) = infos.0.iter().next().unwrap() else {
        panic!("expected a password record");
    };
    let kdf = record.key_derivation_alg.as_ref().unwrap();
    let params = Pbkdf2Parameters::from_der(&der::Encode::to_der(kdf.parameters.as_ref().unwrap()).unwrap())
        .unwrap();
    assert_eq!(params.prf.oid, oids::HMAC_WITH_SHA256);

    let store = store_for(&resolver, &generator, &content_key, 3);
    let entry = store.get(&RecipientId::password()).unwrap();
    assert_eq!(entry.recover(&password).unwrap(), content_key);
}

#[test]
fn converters_must_agree() {
    let resolver = Resolver::new();
    let sender = Password::new("pässwörd").with_converter(PasswordConverter::Ascii);
    let generator =
        PasswordRecipientInfoGenerator::new(&resolver, oids::AES128_CBC, sender.clone(), SALT, 1024);
    let content_key = SymmetricKey::aes([0x42u8; 16]);
    let store = store_for(&resolver, &generator, &content_key, 4);
    let entry = store.get(&RecipientId::password()).unwrap();

    let utf8 = Password::new("pässwörd").with_converter(PasswordConverter::Utf8);
    assert!(entry.recover(&utf8).unwrap_err().recovery_kind().is_some());
    assert_eq!(entry.recover(&sender).unwrap(), content_key);
}

#[test]
fn ascii_and_utf8_agree_on_ascii_passwords() {
    let resolver = Resolver::new();
    let generator = PasswordRecipientInfoGenerator::new(
        &resolver,
        oids::AES128_CBC,
        Password::new("plain").with_converter(PasswordConverter::Ascii),
        SALT,
        1024,
    );
    let content_key = SymmetricKey::aes([0x24u8; 16]);
    let store = store_for(&resolver, &generator, &content_key, 5);
    let entry = store.get(&RecipientId::password()).unwrap();
    assert_eq!(entry.recover(&Password::new("plain")).unwrap(), content_key);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn round_trip_over_parameters(
        secret in "[a-zA-Z0-9 ]{1,24}",
        salt in prop::collection::vec(any::<u8>(), 1..32),
        iterations in 1u32..64,
        wrap_cipher in prop::sample::select(vec![
            oids::AES128_CBC,
            oids::AES192_CBC,
            oids::AES256_CBC,
            oids::DES_EDE3_CBC,
        ]),
        key in any::<[u8; 16]>(),
    ) {
        let resolver = Resolver::new();
        let password = Password::new(secret);
        let generator =
            PasswordRecipientInfoGenerator::new(&resolver, wrap_cipher, password.clone(), salt.clone(), iterations);
        let content_key = SymmetricKey::aes(key);

        let store = store_for(&resolver, &generator, &content_key, key[0]);
        let RecipientInformation::Password(entry) = store.get(&RecipientId::password()).unwrap() else {
            panic!("expected a password entry");
        };
        prop_assert_eq!(entry.wrap_cipher().oid, wrap_cipher);

        let params = Pbkdf2Parameters::from_der(
            &der::Encode::to_der(entry.key_derivation_algorithm().parameters.as_ref().unwrap()).unwrap(),
        )
        .unwrap();
        prop_assert_eq!(params.salt.as_bytes(), &salt[..]);
        prop_assert_eq!(params.iteration_count, iterations);

        prop_assert_eq!(entry.recover_with_password(&password).unwrap(), content_key);
    }
}
