//! Shamir secret sharing and Feldman commitments
//!
//! Polynomial arithmetic used by the [DKG](crate::keygen), and Lagrange interpolation
//! used by the signing and by key reconstruction.

use alloc::{collections::BTreeMap, vec::Vec};
use core::iter;

use generic_ec::{Curve, NonZero, Point, Scalar, SecretScalar};
use rand_core::{CryptoRng, RngCore};

use crate::ShamirId;

/// Maps a Shamir id onto the scalar it's evaluated at
pub fn id_to_scalar<E: Curve>(id: ShamirId) -> Scalar<E> {
    Scalar::from_be_bytes_mod_order(id.to_be_bytes())
}

/// Secret polynomial `f(x) = a_0 + a_1 x + ... + a_{t-1} x^{t-1}`
///
/// Coefficients are zeroized on drop.
pub struct Polynomial<E: Curve> {
    coefs: Vec<SecretScalar<E>>,
}

impl<E: Curve> Polynomial<E> {
    /// Samples a random polynomial with `t` coefficients (degree `t - 1`)
    pub fn sample(rng: &mut (impl RngCore + CryptoRng), t: u16) -> Self {
        let coefs = iter::repeat_with(|| SecretScalar::random(rng))
            .take(usize::from(t))
            .collect();
        Self { coefs }
    }

    /// Constant term `f(0)`
    pub fn constant_term(&self) -> Option<&SecretScalar<E>> {
        self.coefs.first()
    }

    /// Evaluates `f(x)`
    pub fn evaluate(&self, x: &Scalar<E>) -> SecretScalar<E> {
        let mut acc = self
            .coefs
            .iter()
            .rev()
            .fold(Scalar::zero(), |acc, coef| acc * x + coef.as_ref());
        SecretScalar::new(&mut acc)
    }

    /// Feldman commitments `a_k G` to every coefficient
    pub fn commit(&self) -> Vec<Point<E>> {
        self.coefs
            .iter()
            .map(|coef| Point::generator() * coef.as_ref())
            .collect()
    }
}

/// Evaluates committed polynomial "in the exponent": `f(x) G = sum_k x^k (a_k G)`
pub fn evaluate_commitments<E: Curve>(commitments: &[Point<E>], x: &Scalar<E>) -> Point<E> {
    commitments
        .iter()
        .rev()
        .fold(Point::zero(), |acc, commitment| acc * x + commitment)
}

/// Computes a Lagrange coefficient of `x_i` for interpolation at zero
///
/// `signers` must be sorted and must not contain duplicates, otherwise `None` is returned.
/// `None` is also returned if `x_i` is not in the list.
pub fn lagrange_coefficient<E: Curve>(signers: &[ShamirId], x_i: ShamirId) -> Option<Scalar<E>> {
    if !signers.windows(2).all(|w| w[0] < w[1]) {
        return None;
    }
    let signers_list = signers
        .iter()
        .map(|j| NonZero::from_scalar(id_to_scalar::<E>(*j)))
        .collect::<Option<Vec<_>>>()?;
    let x_i = NonZero::from_scalar(id_to_scalar::<E>(x_i))?;
    derive_interpolating_value(&signers_list, &x_i)
}

/// Lagrange coefficients of every signer for interpolation at zero
///
/// Returns `None` if `signers` isn't sorted or contains duplicates
pub fn lagrange_coefficients<E: Curve>(
    signers: &[ShamirId],
) -> Option<BTreeMap<ShamirId, Scalar<E>>> {
    signers
        .iter()
        .map(|i| Some((*i, lagrange_coefficient(signers, *i)?)))
        .collect()
}

/// Interpolates shares at zero, recovering the shared secret
///
/// Intended for tests and key export. Shares must be sorted by Shamir id.
pub fn interpolate<E: Curve>(shares: &[(ShamirId, Scalar<E>)]) -> Option<Scalar<E>> {
    let ids = shares.iter().map(|(i, _)| *i).collect::<Vec<_>>();
    let coefs = lagrange_coefficients::<E>(&ids)?;
    shares
        .iter()
        .map(|(i, share)| Some(*coefs.get(i)? * share))
        .sum()
}

/// Computes an interpolation value as described in [Section 4.2]
///
/// [Section 4.2]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-polynomials
///
/// Differences compared to the draft:
/// * List of signers **must be** free of duplicates, which is checked by the caller
/// * Iterates over list of signers only once
fn derive_interpolating_value<E: Curve>(
    signers_list: &[NonZero<Scalar<E>>],
    x_i: &NonZero<Scalar<E>>,
) -> Option<Scalar<E>> {
    let mut x_i_observed = false;

    let mut num = Scalar::one();
    let mut denom = NonZero::<Scalar<E>>::one();

    for x_j in signers_list {
        let Some(substraction) = NonZero::from_scalar(x_j - x_i) else {
            // x_i equals to x_j
            x_i_observed = true;
            continue;
        };
        num *= x_j.as_ref();
        denom = denom * substraction;
    }

    if !x_i_observed {
        return None;
    }

    Some(num * denom.invert())
}
