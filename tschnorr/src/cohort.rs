//! Cohort of parties sharing a key
//!
//! [`CohortConfig`] describes the group: ciphersuite, threshold `t`, total number of parties `n`,
//! the set of participants and which of them are authorized to aggregate signatures. The config
//! is validated once at construction and is immutable afterwards; protocol parties borrow it.
//!
//! All secret sharing math addresses parties by [`ShamirId`] which is derived from the set of
//! participants by [`derive_shamir_ids`].

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};
use core::{fmt, marker::PhantomData};

use crate::{Ciphersuite, IdentityKey, ShamirId};

/// Bijection between participants and their Shamir ids
///
/// Participants are sorted by bytes of their public key, the smallest key gets id `1`. Since
/// the mapping only depends on the set of participants, every party computes the same mapping
/// regardless of the order in which it learned about the participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShamirIds {
    sorted: Vec<IdentityKey>,
}

impl ShamirIds {
    /// Derives Shamir ids for given set of participants
    ///
    /// Returns error if the same identity is listed twice, or if there's more than `u16::MAX`
    /// participants.
    pub fn new(participants: impl IntoIterator<Item = IdentityKey>) -> Result<Self, InvalidCohort> {
        let mut sorted = participants.into_iter().collect::<Vec<_>>();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(Reason::DuplicateParticipant.into());
        }
        if ShamirId::try_from(sorted.len()).is_err() {
            return Err(Reason::TooManyParticipants(sorted.len()).into());
        }
        Ok(Self { sorted })
    }

    /// Shamir id of the participant, `None` if it's not a participant
    pub fn shamir_id(&self, identity: &IdentityKey) -> Option<ShamirId> {
        let index = self.sorted.binary_search(identity).ok()?;
        // Doesn't overflow: number of participants is checked at construction
        ShamirId::try_from(index + 1).ok()
    }

    /// Identity of participant with given Shamir id
    pub fn identity(&self, id: ShamirId) -> Option<&IdentityKey> {
        self.sorted.get(usize::from(id).checked_sub(1)?)
    }

    /// Number of participants
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Indicates whether there are no participants
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Iterates over `(shamir_id, identity)` in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (ShamirId, &IdentityKey)> + '_ {
        (1..).zip(&self.sorted)
    }
}

/// Derives Shamir ids of all participants and of `me`
///
/// Pure function of the set of participants. Returns an error if `me` is not one of the
/// participants.
pub fn derive_shamir_ids(
    me: &IdentityKey,
    participants: impl IntoIterator<Item = IdentityKey>,
) -> Result<(ShamirIds, ShamirId), InvalidCohort> {
    let ids = ShamirIds::new(participants)?;
    let my_id = ids.shamir_id(me).ok_or(Reason::NotAParticipant)?;
    Ok((ids, my_id))
}

/// Received messages indexed by sender's Shamir id
pub(crate) type Indexed<'m, M> = BTreeMap<ShamirId, &'m M>;

/// Problem with a set of received messages
#[derive(Debug, Clone, Copy)]
pub(crate) enum MessagesError {
    /// No message from this party
    Missing(ShamirId),
    /// Message from a participant which doesn't take part in this session
    Unexpected(ShamirId),
    /// Message from an identity which is not a participant
    UnknownSender,
}

impl fmt::Display for MessagesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(j) => write!(f, "missing message from party {j}"),
            Self::Unexpected(j) => write!(f, "party {j} doesn't take part in this session"),
            Self::UnknownSender => f.write_str("message from unknown sender"),
        }
    }
}

/// Indexes messages received from `expected` parties by their Shamir id
///
/// Message from `me`, if present, is ignored. Every party in `expected` apart from `me` must
/// have sent exactly one message.
pub(crate) fn index_messages<'m, M>(
    participants: &ShamirIds,
    me: ShamirId,
    expected: &BTreeSet<ShamirId>,
    msgs: &'m BTreeMap<IdentityKey, M>,
) -> Result<Indexed<'m, M>, MessagesError> {
    let mut indexed = BTreeMap::new();
    for (sender, msg) in msgs {
        let j = participants
            .shamir_id(sender)
            .ok_or(MessagesError::UnknownSender)?;
        if j == me {
            continue;
        }
        if !expected.contains(&j) {
            return Err(MessagesError::Unexpected(j));
        }
        indexed.insert(j, msg);
    }
    if let Some(missing) = expected
        .iter()
        .find(|j| **j != me && !indexed.contains_key(*j))
    {
        return Err(MessagesError::Missing(*missing));
    }
    Ok(indexed)
}

/// Validated description of the group of parties sharing a key
pub struct CohortConfig<C: Ciphersuite> {
    threshold: u16,
    total_parties: u16,
    participants: ShamirIds,
    aggregators: BTreeSet<IdentityKey>,
    _ciphersuite: PhantomData<fn() -> C>,
}

impl<C: Ciphersuite> CohortConfig<C> {
    /// Constructs and validates the cohort
    ///
    /// Requires that:
    /// * `0 < threshold <= total_parties`
    /// * exactly `total_parties` distinct participants are provided
    /// * at least one signature aggregator is designated, and every aggregator is a participant
    pub fn new(
        threshold: u16,
        total_parties: u16,
        participants: impl IntoIterator<Item = IdentityKey>,
        aggregators: impl IntoIterator<Item = IdentityKey>,
    ) -> Result<Self, InvalidCohort> {
        if threshold == 0 {
            return Err(Reason::ZeroThreshold.into());
        }
        if threshold > total_parties {
            return Err(Reason::ThresholdExceedsParties {
                threshold,
                total_parties,
            }
            .into());
        }
        let participants = ShamirIds::new(participants)?;
        if participants.len() != usize::from(total_parties) {
            return Err(Reason::WrongNumberOfParticipants {
                expected: total_parties,
                actual: participants.len(),
            }
            .into());
        }
        let aggregators = aggregators.into_iter().collect::<BTreeSet<_>>();
        if aggregators.is_empty() {
            return Err(Reason::NoAggregators.into());
        }
        if aggregators
            .iter()
            .any(|a| participants.shamir_id(a).is_none())
        {
            return Err(Reason::AggregatorNotParticipant.into());
        }

        Ok(Self {
            threshold,
            total_parties,
            participants,
            aggregators,
            _ciphersuite: PhantomData,
        })
    }

    /// Minimal number of parties required to sign
    pub fn threshold(&self) -> u16 {
        self.threshold
    }
    /// Total number of parties
    pub fn total_parties(&self) -> u16 {
        self.total_parties
    }
    /// Mapping between participants and their Shamir ids
    pub fn participants(&self) -> &ShamirIds {
        &self.participants
    }
    /// Parties authorized to aggregate signatures
    pub fn aggregators(&self) -> &BTreeSet<IdentityKey> {
        &self.aggregators
    }
    /// Indicates whether `identity` is authorized to aggregate signatures
    pub fn is_signature_aggregator(&self, identity: &IdentityKey) -> bool {
        self.aggregators.contains(identity)
    }
    /// Shamir id of `identity`
    pub fn shamir_id(&self, identity: &IdentityKey) -> Result<ShamirId, InvalidCohort> {
        self.participants
            .shamir_id(identity)
            .ok_or_else(|| Reason::NotAParticipant.into())
    }
}

impl<C: Ciphersuite> Clone for CohortConfig<C> {
    fn clone(&self) -> Self {
        Self {
            threshold: self.threshold,
            total_parties: self.total_parties,
            participants: self.participants.clone(),
            aggregators: self.aggregators.clone(),
            _ciphersuite: PhantomData,
        }
    }
}

impl<C: Ciphersuite> fmt::Debug for CohortConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohortConfig")
            .field("ciphersuite", &C::NAME)
            .field("threshold", &self.threshold)
            .field("total_parties", &self.total_parties)
            .field("participants", &self.participants)
            .field("aggregators", &self.aggregators)
            .finish()
    }
}

/// Invalid cohort configuration
#[derive(Debug)]
pub struct InvalidCohort(Reason);

#[derive(Debug)]
enum Reason {
    ZeroThreshold,
    ThresholdExceedsParties { threshold: u16, total_parties: u16 },
    WrongNumberOfParticipants { expected: u16, actual: usize },
    DuplicateParticipant,
    TooManyParticipants(usize),
    NoAggregators,
    AggregatorNotParticipant,
    NotAParticipant,
}

impl InvalidCohort {
    /// Indicates that the error was caused by an identity which is not a participant of the cohort
    pub fn is_not_a_participant(&self) -> bool {
        matches!(self.0, Reason::NotAParticipant)
    }
}

impl fmt::Display for InvalidCohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::ZeroThreshold => f.write_str("threshold must be positive"),
            Reason::ThresholdExceedsParties {
                threshold,
                total_parties,
            } => write!(
                f,
                "threshold {threshold} exceeds number of parties {total_parties}"
            ),
            Reason::WrongNumberOfParticipants { expected, actual } => write!(
                f,
                "expected {expected} participants, but {actual} distinct participants provided"
            ),
            Reason::DuplicateParticipant => {
                f.write_str("same participant is listed more than once")
            }
            Reason::TooManyParticipants(n) => write!(f, "too many participants: {n}"),
            Reason::NoAggregators => f.write_str("no signature aggregator designated"),
            Reason::AggregatorNotParticipant => {
                f.write_str("signature aggregator is not a participant")
            }
            Reason::NotAParticipant => f.write_str("identity is not a participant of the cohort"),
        }
    }
}

impl core::error::Error for InvalidCohort {}

impl From<Reason> for InvalidCohort {
    fn from(err: Reason) -> Self {
        Self(err)
    }
}
