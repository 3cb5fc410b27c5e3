//! RFC 3211 key wrap: two chained CBC passes over a length- and
//! check-byte-prefixed key block.

use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use rand_core::CryptoRngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{BackendError, BackendResult};

fn xor_in_place(block: &mut [u8], mask: &[u8]) {
    block.iter_mut().zip(mask).for_each(|(b, m)| *b ^= m);
}

/// One CBC encryption pass; `chain` carries over into the next pass.
fn encrypt_pass<C: BlockEncrypt>(cipher: &C, chain: &mut [u8], data: &mut [u8]) {
    for block in data.chunks_exact_mut(chain.len()) {
        xor_in_place(block, chain);
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        chain.copy_from_slice(block);
    }
}

/// Decrypt `block` in place and XOR it with `prev`, the ciphertext block preceding it.
fn decrypt_block<C: BlockDecrypt>(cipher: &C, block: &mut [u8], prev: &[u8]) {
    cipher.decrypt_block(GenericArray::from_mut_slice(block));
    xor_in_place(block, prev);
}

pub(super) fn wrap<C>(
    kek: &[u8],
    iv: &[u8],
    key: &[u8],
    rng: &mut dyn CryptoRngCore,
) -> BackendResult<Vec<u8>>
where
    C: KeyInit + BlockEncrypt,
{
    let bs = C::block_size();
    if iv.len() != bs || key.len() < 3 || key.len() > 255 {
        return Err(BackendError::InvalidParameters);
    }
    let cipher = C::new_from_slice(kek).map_err(|_| BackendError::InvalidKey)?;

    let len = (key.len() + 4).max(2 * bs).div_ceil(bs) * bs;
    let mut block = vec![0u8; len];
    block[0] = key.len() as u8;
    block[1] = !key[0];
    block[2] = !key[1];
    block[3] = !key[2];
    block[4..4 + key.len()].copy_from_slice(key);
    rng.fill_bytes(&mut block[4 + key.len()..]);

    let mut chain = iv.to_vec();
    encrypt_pass(&cipher, &mut chain, &mut block);
    encrypt_pass(&cipher, &mut chain, &mut block);
    Ok(block)
}

pub(super) fn unwrap<C>(kek: &[u8], iv: &[u8], wrapped: &[u8]) -> BackendResult<Zeroizing<Vec<u8>>>
where
    C: KeyInit + BlockDecrypt,
{
    let bs = C::block_size();
    if iv.len() != bs {
        return Err(BackendError::InvalidParameters);
    }
    if wrapped.len() < 2 * bs || wrapped.len() % bs != 0 {
        return Err(BackendError::Failed);
    }
    let cipher = C::new_from_slice(kek).map_err(|_| BackendError::InvalidKey)?;
    let n = wrapped.len() / bs;
    let at = |i: usize| i * bs..(i + 1) * bs;

    // Undo the second pass. Its chain started from the last block of the
    // first pass, which is recovered first.
    let mut inner = Zeroizing::new(wrapped.to_vec());
    for i in 1..n {
        decrypt_block(&cipher, &mut inner[at(i)], &wrapped[at(i - 1)]);
    }
    let last = inner[at(n - 1)].to_vec();
    decrypt_block(&cipher, &mut inner[at(0)], &last);

    // Undo the first pass.
    let mut plain = Zeroizing::new(inner.to_vec());
    decrypt_block(&cipher, &mut plain[at(0)], iv);
    for i in 1..n {
        decrypt_block(&cipher, &mut plain[at(i)], &inner[at(i - 1)]);
    }

    let key_len = plain[0] as usize;
    if key_len < 3 || key_len > plain.len() - 4 {
        return Err(BackendError::Failed);
    }
    let check = [!plain[1], !plain[2], !plain[3]];
    if !bool::from(check[..].ct_eq(&plain[4..7])) {
        return Err(BackendError::Failed);
    }
    Ok(Zeroizing::new(plain[4..4 + key_len].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::Aes128;
    use des::TdesEde3;
    use hex_literal::hex;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    const KEK: [u8; 16] = hex!("8bb0dbd8f3f7f0a7c2c7cc2c7bcd83a5");
    const IV: [u8; 16] = hex!("00112233445566778899aabbccddeeff");

    #[test]
    fn test_roundtrip_aes() {
        let mut rng = ChaCha8Rng::from_seed([1; 32]);
        for key_len in [16usize, 24, 32, 40] {
            let key = vec![0x5au8; key_len];
            let wrapped = wrap::<Aes128>(&KEK, &IV, &key, &mut rng).unwrap();
            assert_eq!(wrapped.len() % 16, 0);
            assert!(wrapped.len() >= 32);
            assert_eq!(&*unwrap::<Aes128>(&KEK, &IV, &wrapped).unwrap(), &key);
        }
    }

    #[test]
    fn test_roundtrip_des_ede3() {
        let mut rng = ChaCha8Rng::from_seed([2; 32]);
        let kek = [0x3cu8; 24];
        let iv = [0x01u8; 8];
        let key = hex!("0123456789abcdeffedcba9876543210");
        let wrapped = wrap::<TdesEde3>(&kek, &iv, &key, &mut rng).unwrap();
        assert_eq!(wrapped.len(), 24);
        assert_eq!(&*unwrap::<TdesEde3>(&kek, &iv, &wrapped).unwrap(), &key);
    }

    #[test]
    fn test_wrong_kek_fails() {
        let mut rng = ChaCha8Rng::from_seed([3; 32]);
        let key = [0xa5u8; 16];
        let wrapped = wrap::<Aes128>(&KEK, &IV, &key, &mut rng).unwrap();

        let mut other = KEK;
        other[0] ^= 1;
        assert_eq!(
            unwrap::<Aes128>(&other, &IV, &wrapped),
            Err(BackendError::Failed)
        );
    }

    #[test]
    fn test_short_input_fails() {
        assert_eq!(
            unwrap::<Aes128>(&KEK, &IV, &[0u8; 16]),
            Err(BackendError::Failed)
        );
    }
}
