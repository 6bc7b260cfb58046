//! Pre-signature generation
//!
//! Nonce commitments don't depend on the message being signed, so parties can exchange them
//! ahead of time and later sign with a single message each (see [noninteractive](super::noninteractive)).
//!
//! Every party samples `τ` nonce pairs and broadcasts commitments to them, each attested with
//! its [`AuthKey`]. Once everyone's commitments are received and verified, parties obtain the
//! same [`PreSignatureBatch`]: `τ` rows, each row holding one attested commitment per participant.
//! Secret nonces stay with the party, `k`-th nonce pair matches its entry in `k`-th row.
//!
//! Attestations bind every commitment to the session id and to its index within the batch, so
//! a pre-signature can't be moved to a different batch or position.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use core::{fmt, mem};

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use crate::{
    cohort::{self, MessagesError, ShamirIds},
    identity::Attestation,
    AuthKey, Ciphersuite, CohortConfig, IdentityKey, ShamirId,
};

use super::round1::{self, NonceCommitments, PrivateNoncePair};

/// Nonce commitments attested by their owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct AttestedCommitments<C: Ciphersuite> {
    /// Commitments to the nonces
    pub commitments: NonceCommitments<C::Curve>,
    /// Attestation of the commitments, their index and the session id
    pub attestation: Attestation,
}

/// Message broadcast at round 1 of pre-signature generation
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct PreGenRound1Broadcast<C: Ciphersuite> {
    /// `τ` attested commitments, `k`-th entry goes to `k`-th pre-signature
    pub commitments: Vec<AttestedCommitments<C>>,
}

/// Single pre-signature: attested nonce commitments of every participant
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct PreSignature<C: Ciphersuite> {
    /// Commitments of each participant
    pub row: BTreeMap<IdentityKey, AttestedCommitments<C>>,
}

impl<C: Ciphersuite> PreSignature<C> {
    /// Nonce commitments of the `session` signers, indexed by Shamir id
    ///
    /// Returns `None` if the pre-signature lacks commitments of any of the signers
    pub fn commitments_of(
        &self,
        participants: &ShamirIds,
        session: &BTreeSet<ShamirId>,
    ) -> Option<BTreeMap<ShamirId, NonceCommitments<C::Curve>>> {
        session
            .iter()
            .map(|&j| {
                let entry = self.row.get(participants.identity(j)?)?;
                Some((j, entry.commitments))
            })
            .collect()
    }
}

/// Batch of pre-signatures produced by one execution of pre-signature generation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct PreSignatureBatch<C: Ciphersuite> {
    /// Session id of pre-signature generation
    pub session_id: Vec<u8>,
    /// Pre-signatures, each may be used for signing at most once
    pub pre_signatures: Vec<PreSignature<C>>,
}

impl<C: Ciphersuite> PreSignatureBatch<C> {
    /// Number of pre-signatures in the batch
    pub fn len(&self) -> usize {
        self.pre_signatures.len()
    }

    /// Indicates whether the batch contains no pre-signatures
    pub fn is_empty(&self) -> bool {
        self.pre_signatures.is_empty()
    }

    /// Pre-signature at `index`
    pub fn get(&self, index: usize) -> Option<&PreSignature<C>> {
        self.pre_signatures.get(index)
    }

    /// Checks the whole batch
    ///
    /// Every pre-signature must contain commitments of exactly the cohort participants, all
    /// commitments must be non-identity points, and all attestations must be valid. Doesn't
    /// require the caller to have taken part in generating the batch, so an aggregator can
    /// check a batch it received.
    pub fn validate(&self, cohort: &CohortConfig<C>) -> Result<(), PreGenError> {
        if self.session_id.is_empty() {
            return Err(Reason::EmptySessionId.into());
        }
        if self.pre_signatures.is_empty() {
            return Err(Reason::EmptyBatch.into());
        }
        let participants = cohort.participants();
        for (index, pre_signature) in self.pre_signatures.iter().enumerate() {
            if let Some(unknown) = pre_signature
                .row
                .keys()
                .find(|p| participants.shamir_id(p).is_none())
            {
                debug!(index, ?unknown, "pre-signature contains unknown participant");
                return Err(Reason::Messages(MessagesError::UnknownSender).into());
            }
            for (j, identity) in participants.iter() {
                let entry = pre_signature
                    .row
                    .get(identity)
                    .ok_or(Reason::Messages(MessagesError::Missing(j)))?;
                verify_entry(&self.session_id, index, j, identity, entry)?;
            }
        }
        Ok(())
    }
}

enum State<C: Ciphersuite> {
    AwaitingRound1,
    AwaitingRound2 {
        nonces: Vec<PrivateNoncePair<C::Curve>>,
        own: Vec<AttestedCommitments<C>>,
    },
    Done,
}

/// Party of pre-signature generation
pub struct PreGenParticipant<'a, C: Ciphersuite, A: AuthKey> {
    cohort: &'a CohortConfig<C>,
    auth_key: &'a A,
    i: ShamirId,
    session_id: Vec<u8>,
    tau: usize,
    state: State<C>,
}

impl<'a, C: Ciphersuite, A: AuthKey> PreGenParticipant<'a, C, A> {
    /// Constructs a party that generates `tau` pre-signatures
    ///
    /// `session_id` must be unique for every execution and agreed by all parties, it can be
    /// obtained via [`agree_on_random`](crate::agree_on_random).
    pub fn new(
        cohort: &'a CohortConfig<C>,
        auth_key: &'a A,
        session_id: &[u8],
        tau: usize,
    ) -> Result<Self, PreGenError> {
        let i = cohort
            .shamir_id(&auth_key.identity())
            .map_err(Reason::Cohort)?;
        if session_id.is_empty() {
            return Err(Reason::EmptySessionId.into());
        }
        if tau == 0 {
            return Err(Reason::EmptyBatch.into());
        }
        Ok(Self {
            cohort,
            auth_key,
            i,
            session_id: session_id.to_vec(),
            tau,
            state: State::AwaitingRound1,
        })
    }

    /// Shamir id of this party
    pub fn shamir_id(&self) -> ShamirId {
        self.i
    }

    /// Round 1: sample `τ` nonce pairs and attest commitments to them
    pub fn round1(
        &mut self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<PreGenRound1Broadcast<C>, PreGenError> {
        if !matches!(self.state, State::AwaitingRound1) {
            return Err(Reason::RoundMismatch.into());
        }
        debug!(i = self.i, tau = self.tau, "pre-signature generation round 1");

        let mut nonces = Vec::with_capacity(self.tau);
        let mut own = Vec::with_capacity(self.tau);
        for index in 0..self.tau {
            let hedge = self
                .auth_key
                .attest(&nonce_hedge_message::<C>(&self.session_id, index))
                .to_bytes();
            let (nonce_pair, commitments) = round1::commit::<C>(rng, &hedge[..]);
            let attestation = self.auth_key.attest(&attestation_message::<C>(
                &self.session_id,
                index,
                &commitments,
            ));
            nonces.push(nonce_pair);
            own.push(AttestedCommitments {
                commitments,
                attestation,
            });
        }

        let msg = PreGenRound1Broadcast {
            commitments: own.clone(),
        };
        self.state = State::AwaitingRound2 { nonces, own };
        Ok(msg)
    }

    /// Round 2: verify commitments of other parties and assemble the batch
    ///
    /// Takes round 1 broadcasts of all other parties. Outputs the batch of pre-signatures,
    /// which is the same for every party, and own secret nonces, `k`-th pair matching `k`-th
    /// pre-signature.
    pub fn round2(
        &mut self,
        round1: &BTreeMap<IdentityKey, PreGenRound1Broadcast<C>>,
    ) -> Result<(PreSignatureBatch<C>, Vec<PrivateNoncePair<C::Curve>>), PreGenError> {
        let State::AwaitingRound2 { own, .. } = &self.state else {
            return Err(Reason::RoundMismatch.into());
        };
        debug!(i = self.i, "pre-signature generation round 2");

        let participants = self.cohort.participants();
        let everyone = participants.iter().map(|(j, _)| j).collect::<BTreeSet<_>>();
        let msgs = cohort::index_messages(participants, self.i, &everyone, round1)
            .map_err(|err| self.blame(Reason::Messages(err)))?;

        let mut rows = (0..self.tau)
            .map(|_| BTreeMap::new())
            .collect::<Vec<BTreeMap<IdentityKey, AttestedCommitments<C>>>>();
        for (j, identity) in participants.iter() {
            let entries = if j == self.i {
                own.as_slice()
            } else {
                let msg = msgs
                    .get(&j)
                    .ok_or(Reason::Messages(MessagesError::Missing(j)))?;
                if msg.commitments.len() != self.tau {
                    return Err(self.blame(Reason::WrongBatchSize {
                        culprit: j,
                        expected: self.tau,
                        actual: msg.commitments.len(),
                    }));
                }
                for (index, entry) in msg.commitments.iter().enumerate() {
                    verify_entry(&self.session_id, index, j, identity, entry)
                        .map_err(|err| self.blame(err.0))?;
                }
                msg.commitments.as_slice()
            };
            for (row, entry) in rows.iter_mut().zip(entries) {
                row.insert(*identity, *entry);
            }
        }

        let State::AwaitingRound2 { nonces, .. } = mem::replace(&mut self.state, State::Done)
        else {
            return Err(Bug::UnexpectedState.into());
        };
        info!(i = self.i, tau = self.tau, "pre-signatures generated");
        Ok((
            PreSignatureBatch {
                session_id: self.session_id.clone(),
                pre_signatures: rows
                    .into_iter()
                    .map(|row| PreSignature { row })
                    .collect(),
            },
            nonces,
        ))
    }

    fn blame(&self, reason: Reason) -> PreGenError {
        let err = PreGenError(reason);
        if let Some(culprit) = err.culprit() {
            warn!(i = self.i, culprit, %err, "pre-signature generation aborted");
        }
        err
    }
}

/// Message attested by the owner of nonce commitments
///
/// `NAME || "pregen" || len(session_id) || session_id || index || D || E`, lengths and index
/// are encoded as 8 bytes big-endian
fn attestation_message<C: Ciphersuite>(
    session_id: &[u8],
    index: usize,
    commitments: &NonceCommitments<C::Curve>,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(
        C::NAME.len() + 6 + 16 + session_id.len() + 2 * C::POINT_SIZE,
    );
    msg.extend_from_slice(C::NAME.as_bytes());
    msg.extend_from_slice(b"pregen");
    msg.extend_from_slice(&(session_id.len() as u64).to_be_bytes());
    msg.extend_from_slice(session_id);
    msg.extend_from_slice(&(index as u64).to_be_bytes());
    msg.extend_from_slice(C::serialize_point(&commitments.d).as_ref());
    msg.extend_from_slice(C::serialize_point(&commitments.e).as_ref());
    msg
}

/// Message whose attestation hedges nonce generation
///
/// The attestation is never sent, so only the owner of the auth key knows it.
/// `NAME || "nonce hedge" || len(session_id) || session_id || index`
fn nonce_hedge_message<C: Ciphersuite>(session_id: &[u8], index: usize) -> Vec<u8> {
    let mut msg = Vec::with_capacity(C::NAME.len() + 11 + 16 + session_id.len());
    msg.extend_from_slice(C::NAME.as_bytes());
    msg.extend_from_slice(b"nonce hedge");
    msg.extend_from_slice(&(session_id.len() as u64).to_be_bytes());
    msg.extend_from_slice(session_id);
    msg.extend_from_slice(&(index as u64).to_be_bytes());
    msg
}

fn verify_entry<C: Ciphersuite>(
    session_id: &[u8],
    index: usize,
    j: ShamirId,
    identity: &IdentityKey,
    entry: &AttestedCommitments<C>,
) -> Result<(), PreGenError> {
    if !entry.commitments.is_valid() {
        return Err(Reason::IdentityCommitment { culprit: j, index }.into());
    }
    identity
        .verify(
            &attestation_message::<C>(session_id, index, &entry.commitments),
            &entry.attestation,
        )
        .map_err(|_| Reason::InvalidAttestation { culprit: j, index })?;
    Ok(())
}

/// Pre-signature generation failed, or pre-signatures batch is invalid
#[derive(Debug)]
pub struct PreGenError(Reason);

#[derive(Debug)]
enum Reason {
    Cohort(cohort::InvalidCohort),
    EmptySessionId,
    EmptyBatch,
    RoundMismatch,
    Messages(MessagesError),
    WrongBatchSize {
        culprit: ShamirId,
        expected: usize,
        actual: usize,
    },
    IdentityCommitment {
        culprit: ShamirId,
        index: usize,
    },
    InvalidAttestation {
        culprit: ShamirId,
        index: usize,
    },
    Bug(Bug),
}

#[derive(Debug)]
enum Bug {
    UnexpectedState,
}

impl PreGenError {
    /// Shamir id of the party that caused the failure, if it's known
    pub fn culprit(&self) -> Option<ShamirId> {
        match self.0 {
            Reason::Messages(MessagesError::Missing(j) | MessagesError::Unexpected(j))
            | Reason::WrongBatchSize { culprit: j, .. }
            | Reason::IdentityCommitment { culprit: j, .. }
            | Reason::InvalidAttestation { culprit: j, .. } => Some(j),
            Reason::Messages(MessagesError::UnknownSender)
            | Reason::Cohort(_)
            | Reason::EmptySessionId
            | Reason::EmptyBatch
            | Reason::RoundMismatch
            | Reason::Bug(_) => None,
        }
    }

    /// Indicates that a round was called out of order
    pub fn is_round_mismatch(&self) -> bool {
        matches!(self.0, Reason::RoundMismatch)
    }
}

impl fmt::Display for PreGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::Cohort(_) => f.write_str("invalid cohort"),
            Reason::EmptySessionId => f.write_str("session id is empty"),
            Reason::EmptyBatch => f.write_str("batch of pre-signatures is empty"),
            Reason::RoundMismatch => f.write_str("round mismatch"),
            Reason::Messages(err) => err.fmt(f),
            Reason::WrongBatchSize {
                culprit,
                expected,
                actual,
            } => write!(
                f,
                "party {culprit} sent {actual} commitments, expected {expected}"
            ),
            Reason::IdentityCommitment { culprit, index } => write!(
                f,
                "party {culprit} committed to identity point at index {index}"
            ),
            Reason::InvalidAttestation { culprit, index } => write!(
                f,
                "attestation of party {culprit} at index {index} is invalid"
            ),
            Reason::Bug(_) => f.write_str("bug occurred"),
        }
    }
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bug::UnexpectedState => f.write_str("unexpected state"),
        }
    }
}

impl core::error::Error for PreGenError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.0 {
            Reason::Cohort(err) => Some(err),
            Reason::Bug(bug) => Some(bug),
            _ => None,
        }
    }
}

impl core::error::Error for Bug {}

impl From<Reason> for PreGenError {
    fn from(err: Reason) -> Self {
        Self(err)
    }
}
impl From<Bug> for PreGenError {
    fn from(err: Bug) -> Self {
        Self(Reason::Bug(err))
    }
}
