//! FROST Threshold Signing Protocol
//!
//! Signing can be carried out in two modes, both represented by a [`Cosigner`]:
//!
//! ## Interactively
//! [`InteractiveCosigner`](interactive::InteractiveCosigner) runs two rounds per signature:
//! 1. Each signer commits to fresh nonces and broadcasts the commitments
//! 2. Given commitments of all session participants and the message, each signer issues a
//!    partial signature
//!
//! ## With pre-signatures
//! Nonce commitments don't depend on the message, so they can be exchanged ahead of time:
//! 1. All parties run [pre-signature generation](presign) once, obtaining a batch of `τ`
//!    mutually attested pre-signatures and their own secret nonces
//! 2. For each message to be signed, a [`NonInteractiveCosigner`](noninteractive::NonInteractiveCosigner)
//!    picks the next unused pre-signature and issues a partial signature right away
//!
//! In both modes, one of designated aggregators combines partial signatures into a regular
//! Schnorr signature, see [aggregate] module. The lower-level building blocks are exposed in
//! [round1] and [round2] modules.

use alloc::collections::{BTreeMap, BTreeSet};

use crate::{Ciphersuite, CohortConfig, IdentityKey, ShamirId};

pub mod aggregate;
pub mod interactive;
pub mod noninteractive;
pub mod presign;
pub mod round1;
pub mod round2;
mod utils;

use self::{
    interactive::InteractiveCosigner, noninteractive::NonInteractiveCosigner,
    round2::PartialSignature,
};

/// Signing party
pub enum Cosigner<'a, C: Ciphersuite> {
    /// Signer running the 2-round protocol
    Interactive(InteractiveCosigner<'a, C>),
    /// Signer consuming pre-signatures
    NonInteractive(NonInteractiveCosigner<'a, C>),
}

impl<'a, C: Ciphersuite> Cosigner<'a, C> {
    /// Identity of the signer
    pub fn identity(&self) -> &IdentityKey {
        match self {
            Self::Interactive(c) => c.identity(),
            Self::NonInteractive(c) => c.identity(),
        }
    }

    /// Shamir id of the signer
    pub fn shamir_id(&self) -> ShamirId {
        match self {
            Self::Interactive(c) => c.shamir_id(),
            Self::NonInteractive(c) => c.shamir_id(),
        }
    }

    /// Indicates whether the signer is authorized to aggregate signatures
    pub fn is_signature_aggregator(&self) -> bool {
        match self {
            Self::Interactive(c) => c.is_signature_aggregator(),
            Self::NonInteractive(c) => c.is_signature_aggregator(),
        }
    }
}

impl<'a, C: Ciphersuite> From<InteractiveCosigner<'a, C>> for Cosigner<'a, C> {
    fn from(c: InteractiveCosigner<'a, C>) -> Self {
        Self::Interactive(c)
    }
}
impl<'a, C: Ciphersuite> From<NonInteractiveCosigner<'a, C>> for Cosigner<'a, C> {
    fn from(c: NonInteractiveCosigner<'a, C>) -> Self {
        Self::NonInteractive(c)
    }
}

/// Maps session participants onto their Shamir ids
///
/// Every participant must be a member of the cohort and listed once, `me` must be among them,
/// and there must be at least `threshold` of them.
pub(crate) fn session_ids<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    me: ShamirId,
    session_participants: &[IdentityKey],
) -> Result<BTreeSet<ShamirId>, round2::SigningError> {
    use round2::Reason;

    let ids = session_members(cohort, session_participants).map_err(|err| match err {
        InvalidSession::UnknownSigner => Reason::UnknownSigner,
        InvalidSession::SameSignerTwice => Reason::SameSignerTwice,
        InvalidSession::TooFewSigners { min_signers, n } => {
            Reason::TooFewSigners { min_signers, n }
        }
    })?;
    if !ids.contains(&me) {
        return Err(Reason::SignerNotInList.into());
    }
    Ok(ids)
}

/// Same as [`session_ids`], but doesn't require the caller to be in the session
pub(crate) fn session_members<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    session_participants: &[IdentityKey],
) -> Result<BTreeSet<ShamirId>, InvalidSession> {
    let mut ids = BTreeSet::new();
    for participant in session_participants {
        let j = cohort
            .participants()
            .shamir_id(participant)
            .ok_or(InvalidSession::UnknownSigner)?;
        if !ids.insert(j) {
            return Err(InvalidSession::SameSignerTwice);
        }
    }
    if ids.len() < usize::from(cohort.threshold()) {
        return Err(InvalidSession::TooFewSigners {
            min_signers: cohort.threshold(),
            n: ids.len(),
        });
    }
    Ok(ids)
}

#[derive(Debug)]
pub(crate) enum InvalidSession {
    UnknownSigner,
    SameSignerTwice,
    TooFewSigners { min_signers: u16, n: usize },
}

impl core::fmt::Display for InvalidSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownSigner => f.write_str("session participant is not in the cohort"),
            Self::SameSignerTwice => f.write_str("same signer is listed more than once"),
            Self::TooFewSigners { min_signers, n } => write!(
                f,
                "session has {n} signers, although at least {min_signers} are required"
            ),
        }
    }
}

/// Indexes partial signatures by Shamir id of the sender
pub(crate) fn index_partial_signatures<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    partial_signatures: &BTreeMap<IdentityKey, PartialSignature<C::Curve>>,
) -> Result<BTreeMap<ShamirId, PartialSignature<C::Curve>>, aggregate::AggregateError> {
    partial_signatures
        .iter()
        .map(|(sender, sig)| {
            let j = cohort
                .participants()
                .shamir_id(sender)
                .ok_or(aggregate::Reason::UnknownSender)?;
            Ok((j, *sig))
        })
        .collect()
}
