//! One-pass ECMQV primitive (SEC 1 section 3.4) for the prime-order NIST curves.
//!
//! The caller's side is `U` with static key `d1` and ephemeral key `d2`; the
//! peer is `V` with public keys `Q1V` (static) and `Q2V` (ephemeral).
//!
//! ```text
//! s = d2 + avf(Q2U) * d1
//! P = s * (Q2V + avf(Q2V) * Q1V)
//! Z = x(P)
//! ```

use elliptic_curve::bigint::{U256, U384};
use elliptic_curve::group::{Curve as _, Group};
use elliptic_curve::ops::Reduce;
use elliptic_curve::point::AffineCoordinates;
use zeroize::Zeroizing;

use super::{BackendError, BackendResult};

macro_rules! impl_agree {
    ($name:ident, $avf:ident, $curve:ident, $uint:ty) => {
        /// Associate value function: the low half of the x coordinate with
        /// the next bit set.
        fn $avf(x: $curve::FieldBytes) -> $curve::Scalar {
            let mut bytes = x;
            let half = bytes.len() / 2;
            bytes[..half].fill(0);
            bytes[half - 1] = 1;
            <$curve::Scalar as Reduce<$uint>>::reduce_bytes(&bytes)
        }

        pub(super) fn $name(
            static_secret: &$curve::SecretKey,
            ephemeral_secret: &$curve::SecretKey,
            static_public: &$curve::PublicKey,
            ephemeral_public: &$curve::PublicKey,
        ) -> BackendResult<Zeroizing<Vec<u8>>> {
            let d1 = *static_secret.to_nonzero_scalar();
            let d2 = *ephemeral_secret.to_nonzero_scalar();
            let q2u = ephemeral_secret.public_key();

            let s = d2 + $avf(q2u.as_affine().x()) * d1;
            let q2v_bar = $avf(ephemeral_public.as_affine().x());
            let p = (ephemeral_public.to_projective() + static_public.to_projective() * q2v_bar) * s;

            if bool::from(p.is_identity()) {
                return Err(BackendError::Failed);
            }
            Ok(Zeroizing::new(p.to_affine().x().to_vec()))
        }
    };
}

impl_agree!(agree_p256, avf_p256, p256, U256);
impl_agree!(agree_p384, avf_p384, p384, U384);
