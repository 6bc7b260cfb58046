//! Round 1 - Nonces commitments
//!
//! Each signer samples a pair of secret nonces `(d, e)` and publishes commitments `(D, E) = (dG, eG)`.
//! Nonces must be used for signing only once: [`PrivateNoncePair`] is consumed by value when
//! producing a partial signature and zeroized when dropped.
//!
//! For more details, refer to [Section 5.1] of the draft.
//!
//! [Section 5.1]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-round-one-commitment

use core::fmt;

use generic_ec::{Curve, Point, SecretScalar};
use rand_core::{CryptoRng, RngCore};

use crate::{
    ciphersuite::{generate_nonce, AdditionalEntropy},
    Ciphersuite,
};

/// Secret nonces of a signer
///
/// Not `Clone`: a nonce pair can be consumed only once.
pub struct PrivateNoncePair<E: Curve> {
    pub(crate) d: SecretScalar<E>,
    pub(crate) e: SecretScalar<E>,
}

/// Public commitments to the nonces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct NonceCommitments<E: Curve> {
    /// Commitment to hiding nonce `D = dG`
    pub d: Point<E>,
    /// Commitment to binding nonce `E = eG`
    pub e: Point<E>,
}

impl<E: Curve> PrivateNoncePair<E> {
    /// Commitments to the nonces
    pub fn commitments(&self) -> NonceCommitments<E> {
        NonceCommitments {
            d: Point::generator() * self.d.as_ref(),
            e: Point::generator() * self.e.as_ref(),
        }
    }
}

impl<E: Curve> fmt::Debug for PrivateNoncePair<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateNoncePair(<redacted>)")
    }
}

impl<E: Curve> NonceCommitments<E> {
    /// Indicates that neither of commitments is the identity point
    pub fn is_valid(&self) -> bool {
        !self.d.is_zero() && !self.e.is_zero()
    }
}

/// Samples nonces and commits to them
///
/// `additional_entropy` hedges against weak randomness, signing key share is a good choice.
pub fn commit<C: Ciphersuite>(
    rng: &mut (impl RngCore + CryptoRng),
    additional_entropy: impl AdditionalEntropy<C>,
) -> (PrivateNoncePair<C::Curve>, NonceCommitments<C::Curve>) {
    let nonces = PrivateNoncePair {
        d: generate_nonce::<C>(rng, &additional_entropy),
        e: generate_nonce::<C>(rng, &additional_entropy),
    };
    let commitments = nonces.commitments();
    (nonces, commitments)
}
