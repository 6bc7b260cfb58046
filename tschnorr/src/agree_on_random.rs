//! Agreeing on a random session id
//!
//! [DKG](crate::keygen) and [pre-signature generation](crate::signing::presign) bind their
//! messages to a session id that has to be unique and agreed by all parties. This 2-step
//! protocol derives one without a trusted party: every party broadcasts 32 random bytes, and
//! session id is the hash of all contributions ordered by Shamir id. As long as one party
//! is honest, the session id is unpredictable.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use core::fmt;

use digest::{FixedOutput, Update};
use rand_core::{CryptoRng, RngCore};
use tracing::debug;

use crate::{
    cohort::{self, MessagesError},
    Ciphersuite, CohortConfig, IdentityKey, ShamirId,
};

/// Contribution to the session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Round1Broadcast {
    /// Random bytes
    pub r: [u8; 32],
}

enum State {
    AwaitingRound1,
    AwaitingRound2 { own: [u8; 32] },
    Done,
}

/// Party of the agree-on-random protocol
pub struct AgreeOnRandom<'c, C: Ciphersuite> {
    cohort: &'c CohortConfig<C>,
    i: ShamirId,
    state: State,
}

impl<'c, C: Ciphersuite> AgreeOnRandom<'c, C> {
    /// Constructs a party
    pub fn new(cohort: &'c CohortConfig<C>, me: &IdentityKey) -> Result<Self, AgreeOnRandomError> {
        let i = cohort.shamir_id(me).map_err(Reason::Cohort)?;
        Ok(Self {
            cohort,
            i,
            state: State::AwaitingRound1,
        })
    }

    /// Samples own contribution
    pub fn round1(
        &mut self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<Round1Broadcast, AgreeOnRandomError> {
        if !matches!(self.state, State::AwaitingRound1) {
            return Err(Reason::RoundMismatch.into());
        }
        let mut r = [0u8; 32];
        rng.fill_bytes(&mut r);
        self.state = State::AwaitingRound2 { own: r };
        Ok(Round1Broadcast { r })
    }

    /// Derives the session id from contributions of all other parties
    ///
    /// Can be called only once. If contributions are invalid, the state is left untouched.
    pub fn round2(
        &mut self,
        msgs: &BTreeMap<IdentityKey, Round1Broadcast>,
    ) -> Result<Vec<u8>, AgreeOnRandomError> {
        let State::AwaitingRound2 { own } = self.state else {
            return Err(Reason::RoundMismatch.into());
        };
        let everyone = self
            .cohort
            .participants()
            .iter()
            .map(|(j, _)| j)
            .collect::<BTreeSet<_>>();
        let mut contributions =
            cohort::index_messages(self.cohort.participants(), self.i, &everyone, msgs)
                .map_err(Reason::Messages)?
                .into_iter()
                .map(|(j, msg)| (j, msg.r))
                .collect::<BTreeMap<_, _>>();
        contributions.insert(self.i, own);

        let session_id = contributions
            .values()
            .fold(C::h5().chain(b"session id"), |hash, r| hash.chain(r))
            .finalize_fixed();
        self.state = State::Done;
        debug!(i = self.i, "agreed on session id");
        Ok(session_id.to_vec())
    }
}

/// Agree-on-random protocol failed
#[derive(Debug)]
pub struct AgreeOnRandomError(Reason);

#[derive(Debug)]
enum Reason {
    Cohort(cohort::InvalidCohort),
    RoundMismatch,
    Messages(MessagesError),
}

impl AgreeOnRandomError {
    /// Shamir id of the party that caused the failure, if it's known
    pub fn culprit(&self) -> Option<ShamirId> {
        match self.0 {
            Reason::Messages(MessagesError::Missing(j) | MessagesError::Unexpected(j)) => {
                Some(j)
            }
            Reason::Messages(MessagesError::UnknownSender)
            | Reason::Cohort(_)
            | Reason::RoundMismatch => None,
        }
    }

    /// Indicates that a round was called out of order or more than once
    pub fn is_round_mismatch(&self) -> bool {
        matches!(self.0, Reason::RoundMismatch)
    }
}

impl fmt::Display for AgreeOnRandomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::Cohort(_) => f.write_str("invalid cohort"),
            Reason::RoundMismatch => f.write_str("round mismatch"),
            Reason::Messages(err) => err.fmt(f),
        }
    }
}

impl core::error::Error for AgreeOnRandomError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.0 {
            Reason::Cohort(err) => Some(err),
            Reason::RoundMismatch | Reason::Messages(_) => None,
        }
    }
}

impl From<Reason> for AgreeOnRandomError {
    fn from(err: Reason) -> Self {
        Self(err)
    }
}
