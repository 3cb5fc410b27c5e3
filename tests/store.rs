//! Recipient store indexing.

use cms::content_info::CmsVersion;
use cms::enveloped_data::{KekIdentifier, KekRecipientInfo, RecipientInfo, RecipientInfos};
use cms_recipient::{
    oids, ProtectionKind, RecipientId, RecipientInformation, RecipientInformationStore,
    RecoveryContext, Resolver, SecureReadable,
};
use der::asn1::OctetString;
use der::Encode;
use proptest::prelude::*;
use spki::AlgorithmIdentifierOwned;

fn context(resolver: &Resolver) -> RecoveryContext {
    let algorithm = AlgorithmIdentifierOwned {
        oid: oids::AES128_CBC,
        parameters: None,
    };
    RecoveryContext::new(
        resolver,
        SecureReadable::buffered(algorithm, ProtectionKind::Encipher, Vec::new()),
    )
}

/// KEK record whose wrapped key doubles as a unique marker.
fn kek_record(id: u8, marker: u16) -> RecipientInfo {
    RecipientInfo::Kekri(KekRecipientInfo {
        version: CmsVersion::V4,
        kek_id: KekIdentifier {
            kek_identifier: OctetString::new(vec![b'k', id]).unwrap(),
            date: None,
            other: None,
        },
        key_enc_alg: AlgorithmIdentifierOwned {
            oid: oids::AES128_WRAP,
            parameters: None,
        },
        encrypted_key: OctetString::new(marker.to_be_bytes().to_vec()).unwrap(),
    })
}

fn marker(info: &RecipientInformation) -> Vec<u8> {
    match info {
        RecipientInformation::Kek(kek) => kek.encrypted_key().to_vec(),
        _ => panic!("expected a KEK entry"),
    }
}

fn check_invariants(store: &RecipientInformationStore) {
    assert_eq!(store.size(), store.all().len());
    assert_eq!(store.size(), store.len());
    assert_eq!(store.is_empty(), store.size() == 0);

    let mut total = 0;
    for rid in store.ids() {
        let bucket = store.get_all(rid);
        assert!(!bucket.is_empty());
        assert!(bucket.iter().all(|entry| entry.rid() == rid));
        assert!(std::ptr::eq(store.get(rid).unwrap(), bucket[0]));
        total += bucket.len();
    }
    assert_eq!(total, store.size());
}

#[test]
fn empty_store() {
    let store = RecipientInformationStore::from_entries(Vec::new());
    check_invariants(&store);
    assert!(store.get(&RecipientId::password()).is_none());
    assert!(store.get_all(&RecipientId::kek(b"k0".to_vec())).is_empty());
    assert_eq!(store.iter().count(), 0);
}

#[test]
fn duplicate_ids_share_a_bucket_in_order() {
    let resolver = Resolver::new();
    let context = context(&resolver);
    let records = [kek_record(1, 10), kek_record(2, 20), kek_record(1, 30)];

    let entries = records.iter().flat_map(|record| {
        RecipientInformation::from_recipient_info(record, &context).unwrap()
    });
    let store = RecipientInformationStore::from_entries(entries);
    check_invariants(&store);
    assert_eq!(store.size(), 3);

    let bucket = store.get_all(&RecipientId::kek(b"k\x01".to_vec()));
    assert_eq!(
        bucket.iter().map(|entry| marker(entry)).collect::<Vec<_>>(),
        vec![10u16.to_be_bytes().to_vec(), 30u16.to_be_bytes().to_vec()]
    );
    assert_eq!(
        marker(store.get(&RecipientId::kek(b"k\x01".to_vec())).unwrap()),
        10u16.to_be_bytes()
    );
    assert_eq!(
        store.iter().map(marker).collect::<Vec<_>>(),
        [10u16, 20, 30].map(|m| m.to_be_bytes().to_vec())
    );
}

#[test]
fn other_recipient_info_is_skipped() {
    let resolver = Resolver::new();
    let context = context(&resolver);
    let ori = RecipientInfo::Ori(cms::enveloped_data::OtherRecipientInfo {
        ori_type: der::asn1::ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.2"),
        ori_value: der::Any::new(der::Tag::Null, Vec::new()).unwrap(),
    });
    let infos = RecipientInfos::try_from(vec![kek_record(1, 1), ori]).unwrap();
    let store = RecipientInformationStore::from_recipient_infos(&infos, &context).unwrap();
    check_invariants(&store);
    assert_eq!(store.size(), 1);
}

#[test]
fn store_from_der() {
    let resolver = Resolver::new();
    let infos =
        RecipientInfos::try_from(vec![kek_record(3, 1), kek_record(4, 2), kek_record(3, 3)])
            .unwrap();
    let store = RecipientInformationStore::from_der(&infos.to_der().unwrap(), &context(&resolver))
        .unwrap();
    check_invariants(&store);
    assert_eq!(store.size(), 3);
    assert_eq!(store.get_all(&RecipientId::kek(b"k\x03".to_vec())).len(), 2);
    assert_eq!(store.ids().count(), 2);
}

proptest! {
    #[test]
    fn size_matches_buckets(ids in prop::collection::vec(0u8..5, 0..24)) {
        let resolver = Resolver::new();
        let context = context(&resolver);
        let entries: Vec<_> = ids
            .iter()
            .enumerate()
            .flat_map(|(i, &id)| {
                RecipientInformation::from_recipient_info(&kek_record(id, i as u16), &context).unwrap()
            })
            .collect();
        let store = RecipientInformationStore::from_entries(entries);

        check_invariants(&store);
        prop_assert_eq!(store.size(), ids.len());
        for (i, entry) in store.iter().enumerate() {
            prop_assert_eq!(marker(entry), (i as u16).to_be_bytes().to_vec());
        }
        for id in 0u8..5 {
            let expected = ids.iter().filter(|&&x| x == id).count();
            prop_assert_eq!(store.get_all(&RecipientId::kek(vec![b'k', id])).len(), expected);
        }
    }
}
