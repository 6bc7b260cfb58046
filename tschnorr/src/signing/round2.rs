//! Round 2 - Signing
//!
//! In the second round, each signer signs a message and obtains a [partial signature](PartialSignature).
//! The same computation serves both interactive signing and signing with pre-signatures, the
//! only difference is where the commitments come from.
//!
//! For more details, refer to [Section 5.2] of the draft.
//!
//! [Section 5.2]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-round-two-signature-share-g

use alloc::collections::BTreeMap;
use core::fmt;

use generic_ec::{Curve, Point, Scalar};

use crate::{ciphersuite::Ciphersuite, ShamirId, SigningKeyShare};

use super::{
    aggregate::AggregationParameters,
    round1::{NonceCommitments, PrivateNoncePair},
    utils::{ContextError, SessionContext},
};

/// Partial signature
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct PartialSignature<E: Curve> {
    /// `z_i = d_i + e_i rho_i + lambda_i x_i c`
    pub z: Scalar<E>,
}

/// Issues a partial signature on the `msg`
///
/// Inputs:
/// * `key_share` which will be used for signing, and Shamir id `i` of the signer
/// * Secret `nonces` from [round 1](super::round1), consumed
/// * `msg` to be signed, must not be empty
/// * Nonce `commitments` of every session participant including this signer
/// * `threshold`: minimal number of signers
///
/// Outputs a partial signature, and the parameters which allow to aggregate partial signatures
/// of this session.
///
/// **Never reuse nonces!** Using the same nonce to sign two different messages leaks the secret share.
pub fn sign<C: Ciphersuite>(
    key_share: &SigningKeyShare<C::Curve>,
    i: ShamirId,
    nonces: PrivateNoncePair<C::Curve>,
    msg: &[u8],
    commitments: &BTreeMap<ShamirId, NonceCommitments<C::Curve>>,
    threshold: u16,
) -> Result<
    (
        PartialSignature<C::Curve>,
        AggregationParameters<C::Curve>,
    ),
    SigningError,
> {
    // --- Retrieve and Validate Data
    if msg.is_empty() {
        return Err(Reason::EmptyMessage.into());
    }
    if commitments.len() < usize::from(threshold) {
        return Err(Reason::TooFewSigners {
            min_signers: threshold,
            n: commitments.len(),
        }
        .into());
    }
    match commitments.get(&i) {
        None => return Err(Reason::SignerNotInList.into()),
        Some(comm) if *comm != nonces.commitments() => {
            return Err(Reason::NoncesDontMatchComm.into())
        }
        Some(_) => (),
    }
    if let Some((j, _)) = commitments.iter().find(|(_, comm)| !comm.is_valid()) {
        return Err(Reason::IdentityCommitment(*j).into());
    }

    // --- The Signing
    let ctx = SessionContext::<C>::new(&key_share.group_public_key(), commitments, msg)
        .map_err(Reason::Context)?;
    let binding_factor = *ctx
        .binding_factors
        .get(&i)
        .ok_or(Bug::OwnBindingFactor)?;
    let lambda_i = ctx.lambda(i).ok_or(Bug::DeriveInterpolationValue)?;

    let z = *nonces.d.as_ref()
        + *nonces.e.as_ref() * binding_factor
        + lambda_i * key_share.share().as_ref() * ctx.challenge;
    drop(nonces);

    Ok((
        PartialSignature { z },
        AggregationParameters {
            r: Some(ctx.group_commitment),
            r_js: ctx.r_js,
            commitments: commitments.clone(),
        },
    ))
}

/// Verifies a partial signature of signer `j` against its public key share `y_j`
///
/// Checks `z_j G = R_j + lambda_j c Y_j`
pub(crate) fn verify_partial_signature<C: Ciphersuite>(
    ctx: &SessionContext<C>,
    j: ShamirId,
    y_j: &Point<C::Curve>,
    partial_signature: &PartialSignature<C::Curve>,
) -> bool {
    let (Some(r_j), Some(lambda_j)) = (ctx.r_js.get(&j), ctx.lambda(j)) else {
        return false;
    };
    Point::generator() * partial_signature.z == *r_j + *y_j * (lambda_j * ctx.challenge)
}

/// Signing error
#[derive(Debug)]
pub struct SigningError(Reason);

#[derive(Debug)]
pub(crate) enum Reason {
    EmptyMessage,
    TooFewSigners { min_signers: u16, n: usize },
    SignerNotInList,
    NoncesDontMatchComm,
    IdentityCommitment(ShamirId),
    Context(ContextError),
    RoundMismatch,
    NotAParticipant,
    UnknownSigner,
    SameSignerTwice,
    Messages(crate::cohort::MessagesError),
    InvalidShard(crate::key_share::InvalidShard),
    IndexOutOfRange { index: usize, batch_size: usize },
    IndexAlreadyUsed(usize),
    InvalidBatch(super::presign::PreGenError),
    NoncesDontMatchBatch,
    Bug(Bug),
}

#[derive(Debug)]
pub(crate) enum Bug {
    OwnBindingFactor,
    DeriveInterpolationValue,
    MissingPreSignature(usize),
}

impl SigningError {
    /// Shamir id of the party that caused the failure, if it's known
    pub fn culprit(&self) -> Option<ShamirId> {
        match &self.0 {
            Reason::IdentityCommitment(j)
            | Reason::Messages(crate::cohort::MessagesError::Missing(j))
            | Reason::Messages(crate::cohort::MessagesError::Unexpected(j)) => Some(*j),
            Reason::InvalidBatch(err) => err.culprit(),
            _ => None,
        }
    }

    /// Indicates that a round was called out of order
    pub fn is_round_mismatch(&self) -> bool {
        matches!(self.0, Reason::RoundMismatch)
    }

    /// Indicates that a pre-signature at requested index was already used
    pub fn is_index_reused(&self) -> bool {
        matches!(self.0, Reason::IndexAlreadyUsed(_))
    }
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::EmptyMessage => f.write_str("message to be signed is empty"),
            Reason::TooFewSigners { min_signers, n } => write!(
                f,
                "signers list contains {n} signers, although at \
                least {min_signers} must take part in the signing"
            ),
            Reason::SignerNotInList => f.write_str("signer not in the list of participants"),
            Reason::NoncesDontMatchComm => f.write_str("nonces don't match signer commitments"),
            Reason::IdentityCommitment(j) => {
                write!(f, "signer {j} committed to identity point")
            }
            Reason::Context(ContextError::ZeroBindingFactor(j)) => {
                write!(f, "binding factor of signer {j} is zero")
            }
            Reason::Context(ContextError::IdentityGroupCommitment) => {
                f.write_str("group commitment is identity point")
            }
            Reason::RoundMismatch => f.write_str("round mismatch"),
            Reason::NotAParticipant => f.write_str("signer is not a participant of the cohort"),
            Reason::UnknownSigner => f.write_str("session participant is not in the cohort"),
            Reason::SameSignerTwice => f.write_str(
                "same signer appears more than once in the list \
                of signers",
            ),
            Reason::Messages(err) => err.fmt(f),
            Reason::InvalidShard(_) => f.write_str("invalid shard"),
            Reason::IndexOutOfRange { index, batch_size } => write!(
                f,
                "pre-signature index {index} is out of range, batch contains {batch_size} pre-signatures"
            ),
            Reason::IndexAlreadyUsed(index) => {
                write!(f, "pre-signature at index {index} was already used")
            }
            Reason::InvalidBatch(_) => f.write_str("invalid batch of pre-signatures"),
            Reason::NoncesDontMatchBatch => {
                f.write_str("nonces don't match commitments in the batch of pre-signatures")
            }
            Reason::Bug(_) => f.write_str("bug occurred"),
        }
    }
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bug::OwnBindingFactor => f.write_str("retrieve own binding factor"),
            Bug::DeriveInterpolationValue => f.write_str("derive interpolation value"),
            Bug::MissingPreSignature(index) => {
                write!(f, "validated batch lacks commitments at index {index}")
            }
        }
    }
}

impl core::error::Error for SigningError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.0 {
            Reason::InvalidShard(err) => Some(err),
            Reason::InvalidBatch(err) => Some(err),
            Reason::Bug(bug) => Some(bug),
            _ => None,
        }
    }
}

impl core::error::Error for Bug {}

impl From<Reason> for SigningError {
    fn from(err: Reason) -> Self {
        SigningError(err)
    }
}
impl From<Bug> for SigningError {
    fn from(err: Bug) -> Self {
        SigningError(Reason::Bug(err))
    }
}
