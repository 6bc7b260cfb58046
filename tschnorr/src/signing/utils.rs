use alloc::{collections::BTreeMap, vec::Vec};

use digest::{FixedOutput, Update};
use generic_ec::{NonZero, Point, Scalar};

use crate::{ciphersuite::Ciphersuite, sharing, ShamirId};

use super::round1::NonceCommitments;

/// Everything derived from the nonce commitments of a signing session
pub struct SessionContext<C: Ciphersuite> {
    /// Binding factors `rho_j`
    pub binding_factors: BTreeMap<ShamirId, Scalar<C::Curve>>,
    /// Per-signer commitments `R_j = D_j + rho_j E_j`
    pub r_js: BTreeMap<ShamirId, Point<C::Curve>>,
    /// Group commitment `R = sum_j R_j`
    pub group_commitment: Point<C::Curve>,
    /// Challenge `c = H2(R, Y, msg)`
    pub challenge: Scalar<C::Curve>,
}

/// Session cannot be carried out on given commitments
#[derive(Debug, Clone, Copy)]
pub enum ContextError {
    /// Binding factor of the signer is zero
    ZeroBindingFactor(ShamirId),
    /// Group commitment is identity point
    IdentityGroupCommitment,
}

impl<C: Ciphersuite> SessionContext<C> {
    /// Derives the context of signing `msg` under `group_public_key` by signers who published
    /// `commitments`
    pub fn new(
        group_public_key: &NonZero<Point<C::Curve>>,
        commitments: &BTreeMap<ShamirId, NonceCommitments<C::Curve>>,
        msg: &[u8],
    ) -> Result<Self, ContextError> {
        let binding_factors = compute_binding_factors::<C>(group_public_key, commitments, msg);
        if let Some((j, _)) = binding_factors
            .iter()
            .find(|(_, rho)| **rho == Scalar::zero())
        {
            return Err(ContextError::ZeroBindingFactor(*j));
        }

        let r_js = commitments
            .iter()
            .zip(binding_factors.values())
            .map(|((j, comm), rho)| (*j, comm.d + comm.e * rho))
            .collect::<BTreeMap<_, _>>();
        let group_commitment = r_js
            .values()
            .fold(Point::zero(), |acc, r_j| acc + r_j);
        if group_commitment.is_zero() {
            return Err(ContextError::IdentityGroupCommitment);
        }

        let challenge = C::compute_challenge(&group_commitment, group_public_key, msg);

        Ok(Self {
            binding_factors,
            r_js,
            group_commitment,
            challenge,
        })
    }

    /// Shamir ids of the signers in ascending order
    pub fn signers(&self) -> Vec<ShamirId> {
        self.binding_factors.keys().copied().collect()
    }

    /// Lagrange coefficient of signer `j` within this session
    pub fn lambda(&self, j: ShamirId) -> Option<Scalar<C::Curve>> {
        sharing::lagrange_coefficient(&self.signers(), j)
    }
}

/// Encodes a list of commitments as described in [Section 4.3]
///
/// [Section 4.3]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-list-operations
///
/// Differences compared to the draft:
/// * Instead of returning encoded data as a string, it rather feeds it directly into the hash
pub fn encode_group_commitment_list<C: Ciphersuite>(
    mut output: C::Digest,
    commitment_list: &BTreeMap<ShamirId, NonceCommitments<C::Curve>>,
) -> C::Digest {
    for (j, NonceCommitments { d, e }) in commitment_list {
        output.update(C::serialize_scalar(&sharing::id_to_scalar(*j)).as_ref());
        output.update(C::serialize_point(d).as_ref());
        output.update(C::serialize_point(e).as_ref());
    }
    output
}

/// Computes binding factors as described in [Section 4.4]
///
/// [Section 4.4]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-binding-factors-computation
///
/// Each binding factor depends on the message and on the whole set of commitments, so a
/// signer's nonce contribution can't be reused in another session.
pub fn compute_binding_factors<C: Ciphersuite>(
    group_public_key: &NonZero<Point<C::Curve>>,
    commitment_list: &BTreeMap<ShamirId, NonceCommitments<C::Curve>>,
    msg: &[u8],
) -> BTreeMap<ShamirId, Scalar<C::Curve>> {
    let pk_bytes = C::serialize_point(group_public_key);
    let msg_hash = C::h4().chain(msg).finalize_fixed();
    let encoded_commitment_hash =
        encode_group_commitment_list::<C>(C::h5(), commitment_list).finalize_fixed();

    commitment_list
        .keys()
        .map(|j| {
            let binding_factor = C::h1(&[
                pk_bytes.as_ref(),
                &msg_hash,
                &encoded_commitment_hash,
                C::serialize_scalar(&sharing::id_to_scalar(*j)).as_ref(),
            ]);
            (*j, binding_factor)
        })
        .collect()
}
