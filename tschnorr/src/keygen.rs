//! Distributed Key Generation
//!
//! 3-round Feldman/Pedersen VSS. Each party deals a random polynomial of degree `t-1`, the
//! resulting key is the sum of constant terms of all polynomials, so no one ever learns it.
//!
//! 1. [Round 1](DkgParticipant::round1): party samples a polynomial and broadcasts Feldman
//!    commitments to its coefficients along with a proof of knowledge of the constant term.
//!    The proof prevents rogue-key attacks where an adversary picks its contribution as a
//!    function of others' commitments.
//! 2. [Round 2](DkgParticipant::round2): party verifies all proofs, sends to every other
//!    party its share `f_i(j)` privately, and broadcasts a digest of all received commitments.
//! 3. [Round 3](DkgParticipant::round3): party checks that everyone saw the same commitments,
//!    verifies received shares against the commitments, and sums them up into its
//!    [`SigningKeyShare`]. Public shares of all parties are derived from the commitments.
//!
//! Any failed check names the misbehaving party (see [`DkgError::culprit`]); a faulty party is
//! never silently excluded. Proofs are bound to a session id that must be unique per DKG
//! execution, it can be obtained via [`agree_on_random`](crate::agree_on_random).
//!
//! Rounds must be called in order; calling a round out of order returns an error and leaves
//! the participant untouched.

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use core::fmt;

use generic_ec::{NonZero, Point, Scalar, SecretScalar};
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

use crate::{
    cohort::{self, MessagesError},
    key_share::{InvalidShard, PublicKeyShares, SigningKeyShare},
    sharing::{self, Polynomial},
    Ciphersuite, CohortConfig, IdentityKey, ShamirId,
};

/// Message broadcast at round 1
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct Round1Broadcast<C: Ciphersuite> {
    /// Feldman commitments `a_k G` to the polynomial coefficients
    pub commitments: Vec<Point<C::Curve>>,
    /// Proof of knowledge of the constant term
    pub proof: ProofOfKnowledge<C>,
}

/// Schnorr proof of knowledge of discrete log of the first commitment
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct ProofOfKnowledge<C: Ciphersuite> {
    /// Commitment `R = kG`
    pub r: Point<C::Curve>,
    /// Response `mu = k + a_0 c`
    pub mu: Scalar<C::Curve>,
}

/// Message broadcast at round 2
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct Round2Broadcast<C: Ciphersuite> {
    /// Digest of commitments received at round 1
    pub echo: Scalar<C::Curve>,
}

/// Message sent privately to each party at round 2
#[derive(Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct Round2P2P<C: Ciphersuite> {
    /// Evaluation of sender's polynomial at recipient's Shamir id
    pub share: SecretScalar<C::Curve>,
}

impl<C: Ciphersuite> fmt::Debug for Round2P2P<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Round2P2P")
            .field("share", &"<redacted>")
            .finish()
    }
}

/// DKG output: own secret share and public shares of all parties
pub type DkgOutput<C> = (
    SigningKeyShare<<C as Ciphersuite>::Curve>,
    PublicKeyShares<<C as Ciphersuite>::Curve>,
);

enum State<C: Ciphersuite> {
    AwaitingRound1,
    AwaitingRound2 {
        polynomial: Polynomial<C::Curve>,
        commitments: Vec<Point<C::Curve>>,
    },
    AwaitingRound3 {
        own_share: SecretScalar<C::Curve>,
        commitments: BTreeMap<ShamirId, Vec<Point<C::Curve>>>,
        echo: Scalar<C::Curve>,
    },
    Done,
}

impl<C: Ciphersuite> State<C> {
    fn round(&self) -> Round {
        match self {
            Self::AwaitingRound1 => Round::Round1,
            Self::AwaitingRound2 { .. } => Round::Round2,
            Self::AwaitingRound3 { .. } => Round::Round3,
            Self::Done => Round::Done,
        }
    }
}

/// DKG round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// First round
    Round1,
    /// Second round
    Round2,
    /// Third round
    Round3,
    /// Protocol is completed
    Done,
}

/// Party of the DKG protocol
pub struct DkgParticipant<'c, C: Ciphersuite> {
    cohort: &'c CohortConfig<C>,
    i: ShamirId,
    session_id: Vec<u8>,
    state: State<C>,
}

impl<'c, C: Ciphersuite> DkgParticipant<'c, C> {
    /// Constructs a DKG participant
    ///
    /// `session_id` must be unique for every DKG execution and agreed by all parties.
    pub fn new(
        cohort: &'c CohortConfig<C>,
        me: &IdentityKey,
        session_id: &[u8],
    ) -> Result<Self, DkgError> {
        let i = cohort.shamir_id(me).map_err(Reason::Cohort)?;
        if session_id.is_empty() {
            return Err(Reason::EmptySessionId.into());
        }
        Ok(Self {
            cohort,
            i,
            session_id: session_id.to_vec(),
            state: State::AwaitingRound1,
        })
    }

    /// Shamir id of this party
    pub fn shamir_id(&self) -> ShamirId {
        self.i
    }

    /// Round the participant is waiting for
    pub fn round(&self) -> Round {
        self.state.round()
    }

    /// Round 1: commit to a random polynomial
    pub fn round1(
        &mut self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<Round1Broadcast<C>, DkgError> {
        self.expect_round(Round::Round1)?;
        debug!(i = self.i, "dkg round 1");

        let polynomial = Polynomial::<C::Curve>::sample(rng, self.cohort.threshold());
        let commitments = polynomial.commit();
        let a_0 = polynomial.constant_term().ok_or(Bug::EmptyPolynomial)?;
        let a_0_commitment = commitments.first().ok_or(Bug::EmptyPolynomial)?;

        let k = SecretScalar::<C::Curve>::random(rng);
        let r = Point::generator() * k.as_ref();
        let challenge = proof_challenge::<C>(&self.session_id, self.i, a_0_commitment, &r);
        let mu = *k.as_ref() + *a_0.as_ref() * challenge;

        let msg = Round1Broadcast {
            commitments: commitments.clone(),
            proof: ProofOfKnowledge { r, mu },
        };
        self.state = State::AwaitingRound2 {
            polynomial,
            commitments,
        };
        Ok(msg)
    }

    /// Round 2: verify commitments of other parties and deal the shares
    ///
    /// Takes round 1 broadcasts of all other parties. Outputs a message to broadcast and
    /// a message to be sent privately to each other party.
    pub fn round2(
        &mut self,
        round1: &BTreeMap<IdentityKey, Round1Broadcast<C>>,
    ) -> Result<(Round2Broadcast<C>, BTreeMap<IdentityKey, Round2P2P<C>>), DkgError> {
        self.expect_round(Round::Round2)?;
        let State::AwaitingRound2 {
            polynomial,
            commitments: own_commitments,
        } = &self.state
        else {
            return Err(Bug::UnexpectedState.into());
        };
        debug!(i = self.i, "dkg round 2");

        let msgs = self.index_messages(round1)?;
        let t = usize::from(self.cohort.threshold());
        for (&j, msg) in &msgs {
            if msg.commitments.len() != t {
                return Err(self.blame(Reason::WrongNumberOfCommitments {
                    culprit: j,
                    expected: t,
                    actual: msg.commitments.len(),
                }));
            }
            if msg.commitments.iter().any(|c| c.is_zero()) {
                return Err(self.blame(Reason::IdentityCommitment { culprit: j }));
            }
            let a_0_commitment = msg
                .commitments
                .first()
                .ok_or(Reason::WrongNumberOfCommitments {
                    culprit: j,
                    expected: t,
                    actual: 0,
                })?;
            let challenge =
                proof_challenge::<C>(&self.session_id, j, a_0_commitment, &msg.proof.r);
            if Point::generator() * msg.proof.mu != msg.proof.r + *a_0_commitment * challenge {
                return Err(self.blame(Reason::InvalidProof { culprit: j }));
            }
        }

        let mut commitments = msgs
            .iter()
            .map(|(&j, msg)| (j, msg.commitments.clone()))
            .collect::<BTreeMap<_, _>>();
        commitments.insert(self.i, own_commitments.clone());
        let echo = commitments_digest::<C>(&self.session_id, &commitments);

        let mut p2p = BTreeMap::new();
        for (j, identity) in self.cohort.participants().iter() {
            if j == self.i {
                continue;
            }
            let share = polynomial.evaluate(&sharing::id_to_scalar(j));
            p2p.insert(*identity, Round2P2P { share });
        }
        let own_share = polynomial.evaluate(&sharing::id_to_scalar(self.i));

        self.state = State::AwaitingRound3 {
            own_share,
            commitments,
            echo,
        };
        Ok((Round2Broadcast { echo }, p2p))
    }

    /// Round 3: verify received shares and derive the key share
    ///
    /// Takes round 2 broadcasts and round 2 private messages of all other parties.
    pub fn round3(
        &mut self,
        round2_broadcasts: &BTreeMap<IdentityKey, Round2Broadcast<C>>,
        round2_p2p: &BTreeMap<IdentityKey, Round2P2P<C>>,
    ) -> Result<DkgOutput<C>, DkgError> {
        self.expect_round(Round::Round3)?;
        let State::AwaitingRound3 {
            own_share,
            commitments,
            echo,
        } = &self.state
        else {
            return Err(Bug::UnexpectedState.into());
        };
        debug!(i = self.i, "dkg round 3");

        let broadcasts = self.index_messages(round2_broadcasts)?;
        let p2p = self.index_messages(round2_p2p)?;

        for (&j, msg) in &broadcasts {
            if msg.echo != *echo {
                // Someone sent different commitments to different parties, but a mismatch
                // alone doesn't tell who
                warn!(i = self.i, party = j, "round 1 equivocation detected");
                return Err(Reason::EchoMismatch { party: j }.into());
            }
        }

        let x_i = sharing::id_to_scalar::<C::Curve>(self.i);
        let mut share = *own_share.as_ref();
        for (&j, msg) in &p2p {
            let sender_commitments = commitments.get(&j).ok_or(Bug::MissingCommitments(j))?;
            let expected = sharing::evaluate_commitments(sender_commitments, &x_i);
            if Point::generator() * msg.share.as_ref() != expected {
                return Err(self.blame(Reason::InvalidShare { culprit: j }));
            }
            share = share + msg.share.as_ref();
        }
        let share = SecretScalar::new(&mut share);

        // Coefficient-wise sum of all commitments commits to the sum of all polynomials
        let t = usize::from(self.cohort.threshold());
        let mut combined = alloc::vec![Point::<C::Curve>::zero(); t];
        for sender_commitments in commitments.values() {
            for (acc, c) in combined.iter_mut().zip(sender_commitments) {
                *acc = *acc + c;
            }
        }
        let group_public_key = combined
            .first()
            .and_then(|y| NonZero::from_point(*y))
            .ok_or(Reason::IdentityGroupKey)?;

        let mut public_shares = BTreeMap::new();
        for (m, identity) in self.cohort.participants().iter() {
            let y_m = sharing::evaluate_commitments(&combined, &sharing::id_to_scalar(m));
            let y_m = NonZero::from_point(y_m).ok_or(Reason::IdentityPublicShare(m))?;
            public_shares.insert(*identity, y_m);
        }

        let signing_key_share =
            SigningKeyShare::new(share, group_public_key).map_err(Reason::InvalidKeyShare)?;
        let own_public_share = self
            .cohort
            .participants()
            .identity(self.i)
            .and_then(|me| public_shares.get(me))
            .ok_or(Bug::OwnPublicShare)?;
        if **own_public_share != signing_key_share.public_share() {
            return Err(Bug::OwnPublicShare.into());
        }

        self.state = State::Done;
        info!(
            i = self.i,
            n = self.cohort.total_parties(),
            t = self.cohort.threshold(),
            "dkg completed"
        );
        Ok((
            signing_key_share,
            PublicKeyShares {
                group_public_key,
                shares: public_shares,
            },
        ))
    }

    fn expect_round(&self, called: Round) -> Result<(), DkgError> {
        let expected = self.state.round();
        if expected != called {
            return Err(Reason::RoundMismatch { expected, called }.into());
        }
        Ok(())
    }

    fn index_messages<'m, M>(
        &self,
        msgs: &'m BTreeMap<IdentityKey, M>,
    ) -> Result<cohort::Indexed<'m, M>, DkgError> {
        let everyone = self
            .cohort
            .participants()
            .iter()
            .map(|(j, _)| j)
            .collect::<BTreeSet<_>>();
        cohort::index_messages(self.cohort.participants(), self.i, &everyone, msgs)
            .map_err(|err| self.blame(Reason::Messages(err)))
    }

    fn blame(&self, reason: Reason) -> DkgError {
        let err = DkgError(reason);
        if let Some(culprit) = err.culprit() {
            warn!(i = self.i, culprit, %err, "dkg aborted");
        }
        err
    }
}

fn proof_challenge<C: Ciphersuite>(
    session_id: &[u8],
    prover: ShamirId,
    a_0_commitment: &Point<C::Curve>,
    r: &Point<C::Curve>,
) -> Scalar<C::Curve> {
    C::hdkg(&[
        b"pok",
        session_id,
        &prover.to_be_bytes(),
        C::serialize_point(a_0_commitment).as_ref(),
        C::serialize_point(r).as_ref(),
    ])
}

fn commitments_digest<C: Ciphersuite>(
    session_id: &[u8],
    commitments: &BTreeMap<ShamirId, Vec<Point<C::Curve>>>,
) -> Scalar<C::Curve> {
    let mut encoded = Vec::new();
    for (j, sender_commitments) in commitments {
        encoded.extend_from_slice(&j.to_be_bytes());
        for c in sender_commitments {
            encoded.extend_from_slice(C::serialize_point(c).as_ref());
        }
    }
    C::hdkg(&[b"echo", session_id, &encoded])
}

/// DKG failed
#[derive(Debug)]
pub struct DkgError(Reason);

#[derive(Debug)]
enum Reason {
    Cohort(crate::cohort::InvalidCohort),
    EmptySessionId,
    RoundMismatch { expected: Round, called: Round },
    Messages(MessagesError),
    WrongNumberOfCommitments {
        culprit: ShamirId,
        expected: usize,
        actual: usize,
    },
    IdentityCommitment { culprit: ShamirId },
    InvalidProof { culprit: ShamirId },
    EchoMismatch { party: ShamirId },
    InvalidShare { culprit: ShamirId },
    IdentityGroupKey,
    IdentityPublicShare(ShamirId),
    InvalidKeyShare(InvalidShard),
    Bug(Bug),
}

#[derive(Debug)]
enum Bug {
    UnexpectedState,
    EmptyPolynomial,
    MissingCommitments(ShamirId),
    OwnPublicShare,
}

impl DkgError {
    /// Shamir id of the party that caused the failure, if it's known
    pub fn culprit(&self) -> Option<ShamirId> {
        match &self.0 {
            Reason::Messages(MessagesError::Missing(j))
            | Reason::Messages(MessagesError::Unexpected(j))
            | Reason::WrongNumberOfCommitments { culprit: j, .. }
            | Reason::IdentityCommitment { culprit: j }
            | Reason::InvalidProof { culprit: j }
            | Reason::InvalidShare { culprit: j } => Some(*j),
            Reason::Cohort(_)
            | Reason::EmptySessionId
            | Reason::RoundMismatch { .. }
            | Reason::EchoMismatch { .. }
            | Reason::Messages(MessagesError::UnknownSender)
            | Reason::IdentityGroupKey
            | Reason::IdentityPublicShare(_)
            | Reason::InvalidKeyShare(_)
            | Reason::Bug(_) => None,
        }
    }

    /// Indicates that a round was called out of order
    pub fn is_round_mismatch(&self) -> bool {
        matches!(self.0, Reason::RoundMismatch { .. })
    }

    /// Indicates that parties received different round 1 commitments
    ///
    /// Some party sent different commitments to different recipients. The misbehaving party
    /// can't be identified from the mismatch, so [`culprit`](Self::culprit) is `None`.
    pub fn is_equivocation(&self) -> bool {
        matches!(self.0, Reason::EchoMismatch { .. })
    }
}

impl fmt::Display for DkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::Cohort(_) => f.write_str("invalid cohort"),
            Reason::EmptySessionId => f.write_str("session id is empty"),
            Reason::RoundMismatch { expected, called } => {
                write!(f, "round mismatch: called {called:?}, expected {expected:?}")
            }
            Reason::Messages(err) => err.fmt(f),
            Reason::WrongNumberOfCommitments {
                culprit,
                expected,
                actual,
            } => write!(
                f,
                "party {culprit} sent {actual} commitments, expected {expected}"
            ),
            Reason::IdentityCommitment { culprit } => {
                write!(f, "party {culprit} committed to identity point")
            }
            Reason::InvalidProof { culprit } => {
                write!(f, "party {culprit} sent invalid proof of knowledge")
            }
            Reason::EchoMismatch { party } => write!(
                f,
                "party {party} received round 1 commitments different from ours"
            ),
            Reason::InvalidShare { culprit } => write!(
                f,
                "share received from party {culprit} doesn't match its commitments"
            ),
            Reason::IdentityGroupKey => f.write_str("group public key is identity point"),
            Reason::IdentityPublicShare(j) => {
                write!(f, "public share of party {j} is identity point")
            }
            Reason::InvalidKeyShare(_) => f.write_str("resulting key share is invalid"),
            Reason::Bug(_) => f.write_str("bug occurred"),
        }
    }
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bug::UnexpectedState => f.write_str("state doesn't match the round"),
            Bug::EmptyPolynomial => f.write_str("polynomial has no coefficients"),
            Bug::MissingCommitments(j) => write!(f, "commitments of party {j} are missing"),
            Bug::OwnPublicShare => f.write_str("own public share doesn't match own secret share"),
        }
    }
}

impl core::error::Error for DkgError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.0 {
            Reason::Cohort(err) => Some(err),
            Reason::InvalidKeyShare(err) => Some(err),
            Reason::Bug(bug) => Some(bug),
            Reason::EmptySessionId
            | Reason::RoundMismatch { .. }
            | Reason::Messages(_)
            | Reason::WrongNumberOfCommitments { .. }
            | Reason::IdentityCommitment { .. }
            | Reason::InvalidProof { .. }
            | Reason::EchoMismatch { .. }
            | Reason::InvalidShare { .. }
            | Reason::IdentityGroupKey
            | Reason::IdentityPublicShare(_) => None,
        }
    }
}

impl core::error::Error for Bug {}

impl From<Reason> for DkgError {
    fn from(err: Reason) -> Self {
        DkgError(err)
    }
}
impl From<Bug> for DkgError {
    fn from(err: Bug) -> Self {
        DkgError(Reason::Bug(err))
    }
}
