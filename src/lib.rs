#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc(html_logo_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo_small.png")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Recipient key establishment for the Cryptographic Message Syntax
//! ([RFC 5652]).
//!
//! A CMS message protects its content under one symmetric content key and
//! carries one `RecipientInfo` record per recipient to deliver that key.
//! This crate produces those records and recovers the content key from
//! them:
//!
//! - key transport (`ktri`): RSA PKCS#1 v1.5 and RSAES-OAEP
//! - pre-shared key-encryption keys (`kekri`): AES, Camellia, SEED and
//!   triple-DES key wraps
//! - key agreement (`kari`): ECDH and one-pass ECMQV with the X9.63 KDF
//! - passwords (`pwri`): PBKDF2 and the [RFC 3211] key wrap
//!
//! Algorithms are looked up through a [`Resolver`] which maps object
//! identifiers to named capabilities of one or more [`Backend`]s. The
//! default backend, [`RustCryptoBackend`], is built on the RustCrypto
//! crates.
//!
//! # Usage
//!
//! ```
//! use cms_recipient::{
//!     generate_recipient_infos, oids, KekRecipientInfoGenerator, ProtectionKind, RecipientId,
//!     RecipientInformationStore, RecoveryContext, Resolver, SecureReadable, SymmetricKey,
//! };
//!
//! let mut rng = rand::thread_rng(); // rand@0.8
//! let resolver = Resolver::new();
//!
//! // Protect
//! let content_alg = resolver.generate_content_algorithm(&oids::AES128_CBC, None, &mut rng)?;
//! let content_key = resolver.generate_content_key(&oids::AES128_CBC, None, &mut rng)?;
//! let ciphertext = resolver.encrypt_content(&content_alg, &content_key, b"hello world", None)?;
//!
//! let kek = SymmetricKey::aes([0x2a; 16]);
//! let generator = KekRecipientInfoGenerator::new(&resolver, b"kek-1".to_vec(), kek.clone());
//! let infos = generate_recipient_infos(&[&generator], &content_key, &mut rng)?;
//!
//! // Recover
//! let content = SecureReadable::buffered(content_alg, ProtectionKind::Encipher, ciphertext);
//! let context = RecoveryContext::new(&resolver, content);
//! let store = RecipientInformationStore::from_recipient_infos(&infos, &context)?;
//!
//! let entry = store.get(&RecipientId::kek(b"kek-1".to_vec())).expect("recipient present");
//! let plaintext = entry.content_stream(&kek)?.into_bytes()?;
//! assert_eq!(plaintext, b"hello world");
//! # Ok::<(), cms_recipient::Error>(())
//! ```
//!
//! # Streaming content
//!
//! Content read from a stream through [`SecureReadable::streaming`] can be
//! opened only once; a second attempt fails with [`Error::AlreadyConsumed`].
//! Buffered content can be opened by any number of entries.
//!
//! [RFC 5652]: https://www.rfc-editor.org/rfc/rfc5652
//! [RFC 3211]: https://www.rfc-editor.org/rfc/rfc3211

pub use cms;
pub use der;
pub use rand_core;
pub use spki;

mod algorithms;
mod asn1;
pub mod backend;
pub mod errors;
pub mod generator;
mod key;
pub mod oids;
pub mod recipient;
mod recipient_id;
pub mod resolver;
mod secure_readable;
mod store;

pub use crate::{
    asn1::{EccCmsSharedInfo, MqvUserKeyingMaterial, Pbkdf2Parameters},
    backend::{Backend, BackendError, Capability, RustCryptoBackend},
    errors::{Error, RecoveryErrorKind, Result},
    generator::{
        generate_content_key, generate_recipient_infos, KekRecipientInfoGenerator,
        KeyAgreeRecipientInfoGenerator, KeyTransRecipientInfoGenerator,
        PasswordRecipientInfoGenerator, RecipientInfoGenerator,
    },
    key::{
        AgreementKeyMaterial, AgreementPrivateKey, AgreementPublicKey, Credential, KeyFamily,
        Password, PasswordConverter, PrivateKey, SymmetricKey,
    },
    recipient::{
        KekRecipientInformation, KeyAgreeRecipientInformation, KeyTransRecipientInformation,
        PasswordRecipientInformation, RecipientEntry, RecipientInformation, RecoveryContext,
    },
    recipient_id::{
        CertificateId, KekRecipientId, KeyAgreeRecipientId, KeyTransRecipientId,
        PasswordRecipientId, RecipientId,
    },
    resolver::{AlgorithmRegistry, RegistryBuilder, Resolver, ResolverBuilder},
    secure_readable::{ContentState, ContentStream, ProtectionKind, SecureReadable},
    store::RecipientInformationStore,
};
