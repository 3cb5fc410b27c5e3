//! Key derivation primitives shared by the recipient schemes.

pub(crate) mod kdf;
