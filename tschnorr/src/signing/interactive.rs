//! Interactive signing
//!
//! Signing a message takes two rounds:
//! 1. [`InteractiveCosigner::round1`] samples fresh nonces and outputs commitments to them, they
//!    need to be broadcast to every session participant
//! 2. [`InteractiveCosigner::round2`] takes commitments of all other session participants along
//!    with the message, and outputs a partial signature. Nonces are consumed.
//!
//! Partial signatures are sent to an aggregator, which calls [`InteractiveCosigner::aggregate`].
//!
//! A cosigner signs exactly one message. Rounds must be called in order, otherwise an error is
//! returned and the cosigner is left untouched.

use alloc::collections::{BTreeMap, BTreeSet};
use core::mem;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, warn};

use crate::{cohort, Ciphersuite, CohortConfig, IdentityKey, ShamirId, Shard};

use super::{
    aggregate::{self, AggregateError, AggregationParameters, Signature, SignatureAggregator},
    round1::{self, NonceCommitments, PrivateNoncePair},
    round2::{self, PartialSignature, Reason, SigningError},
};

/// Message broadcast at round 1
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct Round1Broadcast<C: Ciphersuite> {
    /// Commitments to the nonces of the sender
    pub commitments: NonceCommitments<C::Curve>,
}

enum State<C: Ciphersuite> {
    AwaitingRound1,
    AwaitingRound2 {
        nonces: PrivateNoncePair<C::Curve>,
    },
    Done {
        partial_signature: PartialSignature<C::Curve>,
        params: Option<AggregationParameters<C::Curve>>,
    },
    Aborted,
}

/// Round of interactive signing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// Nonces commitment
    Round1,
    /// Partial signing
    Round2,
    /// Partial signature is issued
    Done,
    /// Signing failed after nonces were consumed, the cosigner can't be used anymore
    Aborted,
}

/// Signer running the 2-round protocol
pub struct InteractiveCosigner<'a, C: Ciphersuite> {
    cohort: &'a CohortConfig<C>,
    identity: IdentityKey,
    i: ShamirId,
    shard: &'a Shard<C::Curve>,
    session: BTreeSet<ShamirId>,
    state: State<C>,
}

impl<'a, C: Ciphersuite> InteractiveCosigner<'a, C> {
    /// Constructs a cosigner
    ///
    /// `session_participants` are the parties that sign this message, including `me`. There
    /// must be at least `threshold` of them.
    pub fn new(
        cohort: &'a CohortConfig<C>,
        me: &IdentityKey,
        shard: &'a Shard<C::Curve>,
        session_participants: &[IdentityKey],
    ) -> Result<Self, SigningError> {
        let i = cohort
            .participants()
            .shamir_id(me)
            .ok_or(Reason::NotAParticipant)?;
        shard
            .validate(cohort.participants(), me)
            .map_err(Reason::InvalidShard)?;
        let session = super::session_ids(cohort, i, session_participants)?;
        Ok(Self {
            cohort,
            identity: *me,
            i,
            shard,
            session,
            state: State::AwaitingRound1,
        })
    }

    /// Identity of the signer
    pub fn identity(&self) -> &IdentityKey {
        &self.identity
    }

    /// Shamir id of the signer
    pub fn shamir_id(&self) -> ShamirId {
        self.i
    }

    /// Indicates whether the signer is authorized to aggregate signatures
    pub fn is_signature_aggregator(&self) -> bool {
        self.cohort.is_signature_aggregator(&self.identity)
    }

    /// Round the cosigner is waiting for
    pub fn round(&self) -> Round {
        match self.state {
            State::AwaitingRound1 => Round::Round1,
            State::AwaitingRound2 { .. } => Round::Round2,
            State::Done { .. } => Round::Done,
            State::Aborted => Round::Aborted,
        }
    }

    /// Parameters of the session retained for aggregation
    ///
    /// Available to signature aggregators after round 2. Can be used to aggregate partial
    /// signatures via [`SignatureAggregator`] directly.
    pub fn aggregation_parameters(&self) -> Option<&AggregationParameters<C::Curve>> {
        match &self.state {
            State::Done { params, .. } => params.as_ref(),
            _ => None,
        }
    }

    /// Round 1: commit to fresh nonces
    pub fn round1(
        &mut self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<Round1Broadcast<C>, SigningError> {
        if !matches!(self.state, State::AwaitingRound1) {
            return Err(Reason::RoundMismatch.into());
        }
        debug!(i = self.i, "signing round 1");
        let (nonces, commitments) = round1::commit::<C>(rng, &self.shard.signing_key_share);
        self.state = State::AwaitingRound2 { nonces };
        Ok(Round1Broadcast { commitments })
    }

    /// Round 2: sign the message
    ///
    /// Takes round 1 broadcasts of all other session participants.
    pub fn round2(
        &mut self,
        round1: &BTreeMap<IdentityKey, Round1Broadcast<C>>,
        msg: &[u8],
    ) -> Result<PartialSignature<C::Curve>, SigningError> {
        let State::AwaitingRound2 { nonces } = &self.state else {
            return Err(Reason::RoundMismatch.into());
        };
        debug!(i = self.i, "signing round 2");
        if msg.is_empty() {
            return Err(Reason::EmptyMessage.into());
        }

        let msgs = cohort::index_messages(self.cohort.participants(), self.i, &self.session, round1)
            .map_err(|err| self.blame(Reason::Messages(err)))?;
        let mut commitments = msgs
            .into_iter()
            .map(|(j, msg)| (j, msg.commitments))
            .collect::<BTreeMap<_, _>>();
        commitments.insert(self.i, nonces.commitments());
        if let Some((j, _)) = commitments.iter().find(|(_, comm)| !comm.is_valid()) {
            return Err(self.blame(Reason::IdentityCommitment(*j)));
        }

        // Nonces are consumed from this point, whatever the outcome
        let State::AwaitingRound2 { nonces } = mem::replace(&mut self.state, State::Aborted)
        else {
            return Err(Reason::RoundMismatch.into());
        };
        let (partial_signature, params) = round2::sign::<C>(
            &self.shard.signing_key_share,
            self.i,
            nonces,
            msg,
            &commitments,
            self.cohort.threshold(),
        )
        .map_err(|err| {
            warn!(i = self.i, %err, "signing aborted");
            err
        })?;

        self.state = State::Done {
            partial_signature,
            params: self.is_signature_aggregator().then_some(params),
        };
        Ok(partial_signature)
    }

    /// Aggregates partial signatures of the session into a signature
    ///
    /// Only available to signature aggregators after round 2 is completed. Partial signatures
    /// are verified against public key shares, so an invalid one aborts aggregation naming its
    /// signer (see [`AggregateError::culprit`]). Own partial signature may be omitted from
    /// `partial_signatures`.
    pub fn aggregate(
        &self,
        msg: &[u8],
        partial_signatures: &BTreeMap<IdentityKey, PartialSignature<C::Curve>>,
    ) -> Result<Signature<C>, AggregateError> {
        if !self.is_signature_aggregator() {
            return Err(aggregate::Reason::NotAggregator.into());
        }
        let State::Done {
            partial_signature,
            params: Some(params),
        } = &self.state
        else {
            return Err(aggregate::Reason::NotReady.into());
        };

        let mut partial_signatures =
            super::index_partial_signatures(self.cohort, partial_signatures)?;
        partial_signatures
            .entry(self.i)
            .or_insert(*partial_signature);

        let group_public_key = self.shard.public_key_shares.group_public_key;
        SignatureAggregator::<C>::new(&group_public_key, params, msg)
            .with_identifiable_abort(&self.shard.public_key_shares, self.cohort.participants())
            .aggregate(&partial_signatures)
            .map_err(|err| {
                if let Some(culprit) = err.culprit() {
                    warn!(i = self.i, culprit, %err, "aggregation aborted");
                }
                err
            })
    }

    fn blame(&self, reason: Reason) -> SigningError {
        let err = SigningError::from(reason);
        if let Some(culprit) = err.culprit() {
            warn!(i = self.i, culprit, %err, "signing aborted");
        }
        err
    }
}
