//! ANSI X9.63 key derivation, as used by ECC key agreement in CMS
//! ([RFC 5753 Section 7.1.8]).
//!
//! [RFC 5753 Section 7.1.8]: https://www.rfc-editor.org/rfc/rfc5753#section-7.1.8

use der::asn1::ObjectIdentifier;
use der::Encode;
use digest::DynDigest;
use zeroize::Zeroizing;

use crate::asn1::EccCmsSharedInfo;
use crate::backend::{BackendError, BackendResult, Capability};
use crate::errors::{Error, Result};
use crate::key::{KeyFamily, SymmetricKey};
use crate::resolver::Resolver;

/// Derive the key-encryption key of a key agreement record from the shared
/// secret `z`.
///
/// The KDF digest comes from the agreement scheme and the key length from
/// the wrap algorithm; `ukm` is the record's user keying material.
pub(crate) fn agreed_wrap_key(
    resolver: &Resolver,
    backend: Option<&str>,
    agreement: &ObjectIdentifier,
    wrap: &ObjectIdentifier,
    z: &[u8],
    ukm: Option<&[u8]>,
) -> Result<SymmetricKey> {
    let registry = resolver.registry();
    let digest_oid = registry
        .kdf_digest(agreement)
        .ok_or(Error::AlgorithmUnavailable {
            capability: Capability::Digest,
            algorithm: *agreement,
        })?;
    let unusable_size = || Error::AlgorithmUnavailable {
        capability: Capability::KeyWrap,
        algorithm: *wrap,
    };
    let bits = registry.key_size(wrap).ok_or_else(unusable_size)?;
    let supp_pub_info = u32::try_from(bits).map_err(|_| unusable_size())?;

    let mut digest = resolver.resolve_digest(&digest_oid, backend)?;
    if bits == 0 || bits % 8 != 0 || !x963_len_fits(bits / 8, digest.output_size()) {
        return Err(unusable_size());
    }

    let shared_info = EccCmsSharedInfo::new(*wrap, ukm, supp_pub_info)?.to_der()?;
    let mut kek = Zeroizing::new(vec![0u8; bits / 8]);
    x963_kdf(&mut kek, digest.as_mut(), z, &shared_info).map_err(|_| unusable_size())?;

    let family = registry.family(wrap).unwrap_or(KeyFamily::Generic);
    Ok(SymmetricKey::new(family, kek.as_slice()))
}

/// Whether `len` output bytes need fewer than 2**32 - 1 hash blocks.
fn x963_len_fits(len: usize, output_size: usize) -> bool {
    output_size != 0 && (len.div_ceil(output_size) as u64) < u64::from(u32::MAX)
}

/// Derive `out.len()` bytes as `Hash(Z || counter || shared_info)` blocks,
/// with a big-endian 32-bit counter starting at one.
///
/// Fails with [`BackendError::InvalidParameters`] if `out` needs 2**32 - 1 or
/// more hash blocks.
pub(crate) fn x963_kdf(
    out: &mut [u8],
    digest: &mut dyn DynDigest,
    z: &[u8],
    shared_info: &[u8],
) -> BackendResult<()> {
    if !x963_len_fits(out.len(), digest.output_size()) {
        return Err(BackendError::InvalidParameters);
    }
    let mut counter = [0u8, 0, 0, 1];

    for chunk in out.chunks_mut(digest.output_size()) {
        digest.update(z);
        digest.update(&counter);
        digest.update(shared_info);

        let block = Zeroizing::new(digest.finalize_reset());
        chunk.copy_from_slice(&block[..chunk.len()]);
        inc_counter(&mut counter);
    }
    Ok(())
}

fn inc_counter(counter: &mut [u8; 4]) {
    for i in (0..4).rev() {
        counter[i] = counter[i].wrapping_add(1);
        if counter[i] != 0 {
            // No overflow
            return;
        }
    }
}
