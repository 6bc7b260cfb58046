//! Partial signatures aggregation
//!
//! In this phase, an aggregator combines partial signatures into a regular Schnorr signature.
//!
//! 1. Aggregate nonce `R` is re-derived from the commitments of the session. If the aggregator
//!    retained `R` while signing itself, the two must match. A partial signature computed
//!    against a different `R` can't produce a valid signature.
//! 2. In identifiable-abort mode, each partial signature is verified against the public key
//!    share of its signer. The first invalid one aborts aggregation naming the signer.
//! 3. Partial signatures are summed up into `z`.
//! 4. Resulting signature is verified against the group public key before it's returned.
//!
//! For more details, refer to [Section 5.3] of the draft.
//!
//! [Section 5.3]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html#name-signature-share-aggregation

use alloc::{collections::BTreeMap, vec::Vec};
use core::fmt;

use generic_ec::{Curve, NonZero, Point, Scalar};
use tracing::{debug, warn};

use crate::{cohort::ShamirIds, Ciphersuite, PublicKeyShares, ShamirId};

use super::{
    round1::NonceCommitments,
    round2::{self, PartialSignature},
    utils::{ContextError, SessionContext},
};

/// Schnorr Signature
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct Signature<C: Ciphersuite> {
    /// $R$ component of the signature
    pub r: Point<C::Curve>,
    /// $z$ component of the signature
    pub z: Scalar<C::Curve>,
}

impl<C: Ciphersuite> Signature<C> {
    /// Verifies signature against a public key and a message
    ///
    /// Checks `z G = R + c Y` where `c = H2(R, Y, msg)`
    pub fn verify(
        &self,
        public_key: &NonZero<Point<C::Curve>>,
        msg: &[u8],
    ) -> Result<(), InvalidSignature> {
        let challenge = C::compute_challenge(&self.r, public_key, msg);

        let lhs = Point::generator() * self.z;
        let rhs = self.r + **public_key * challenge;

        if lhs == rhs {
            Ok(())
        } else {
            Err(InvalidSignature)
        }
    }

    /// Size of serialized signature in bytes
    pub fn serialized_len() -> usize {
        C::POINT_SIZE + C::SCALAR_SIZE
    }

    /// Serializes signature as `R || z`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::serialized_len());
        bytes.extend_from_slice(C::serialize_point(&self.r).as_ref());
        bytes.extend_from_slice(C::serialize_scalar(&self.z).as_ref());
        bytes
    }

    /// Deserializes signature from `R || z`
    ///
    /// Returns error if length of `bytes` isn't exactly [`serialized_len`](Self::serialized_len)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureDecodingError> {
        if bytes.len() != Self::serialized_len() {
            return Err(SignatureDecodingError::WrongLength {
                expected: Self::serialized_len(),
                actual: bytes.len(),
            });
        }
        let (r, z) = bytes.split_at(C::POINT_SIZE);
        let r = C::deserialize_point(r).map_err(|_| SignatureDecodingError::InvalidPoint)?;
        let z = C::deserialize_scalar(z).map_err(|_| SignatureDecodingError::InvalidScalar)?;
        Ok(Self { r, z })
    }
}

/// Parameters of a signing session retained for aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct AggregationParameters<E: Curve> {
    /// Group commitment `R`, if it was computed by the aggregator while signing
    pub r: Option<Point<E>>,
    /// Per-signer commitments `R_j`
    pub r_js: BTreeMap<ShamirId, Point<E>>,
    /// Nonce commitments `(D_j, E_j)` of every session participant
    pub commitments: BTreeMap<ShamirId, NonceCommitments<E>>,
}

impl<E: Curve> AggregationParameters<E> {
    /// Parameters known from the commitments only, `R` will be recomputed at aggregation
    pub fn from_commitments(commitments: BTreeMap<ShamirId, NonceCommitments<E>>) -> Self {
        Self {
            r: None,
            r_js: BTreeMap::new(),
            commitments,
        }
    }
}

/// Aggregates partial signatures into a [Schnorr signature](Signature)
///
/// ```rust,ignore
/// let sig = SignatureAggregator::<C>::new(&group_public_key, &params, msg)
///     .with_identifiable_abort(&public_key_shares, cohort.participants())
///     .aggregate(&partial_signatures)?;
/// ```
pub struct SignatureAggregator<'a, C: Ciphersuite> {
    group_public_key: &'a NonZero<Point<C::Curve>>,
    params: &'a AggregationParameters<C::Curve>,
    msg: &'a [u8],
    identifiable_abort: Option<(&'a PublicKeyShares<C::Curve>, &'a ShamirIds)>,
}

impl<'a, C: Ciphersuite> SignatureAggregator<'a, C> {
    /// Constructs an aggregator of partial signatures on `msg`
    pub fn new(
        group_public_key: &'a NonZero<Point<C::Curve>>,
        params: &'a AggregationParameters<C::Curve>,
        msg: &'a [u8],
    ) -> Self {
        Self {
            group_public_key,
            params,
            msg,
            identifiable_abort: None,
        }
    }

    /// Verifies every partial signature against public key share of its signer
    pub fn with_identifiable_abort(
        mut self,
        public_key_shares: &'a PublicKeyShares<C::Curve>,
        participants: &'a ShamirIds,
    ) -> Self {
        self.identifiable_abort = Some((public_key_shares, participants));
        self
    }

    /// Aggregates partial signatures
    ///
    /// `partial_signatures` must be given for exactly the signers of the session.
    pub fn aggregate(
        self,
        partial_signatures: &BTreeMap<ShamirId, PartialSignature<C::Curve>>,
    ) -> Result<Signature<C>, AggregateError> {
        if self.msg.is_empty() {
            return Err(Reason::EmptyMessage.into());
        }
        if let Some(j) = self
            .params
            .commitments
            .keys()
            .find(|j| !partial_signatures.contains_key(*j))
        {
            return Err(Reason::MissingPartialSignature(*j).into());
        }
        if let Some(j) = partial_signatures
            .keys()
            .find(|j| !self.params.commitments.contains_key(*j))
        {
            return Err(Reason::UnexpectedSigner(*j).into());
        }

        // --- Re-derive R
        let ctx =
            SessionContext::<C>::new(self.group_public_key, &self.params.commitments, self.msg)
                .map_err(Reason::Context)?;
        if let Some(r) = self.params.r {
            if r != ctx.group_commitment {
                return Err(Reason::GroupCommitmentMismatch.into());
            }
        }
        if !self.params.r_js.is_empty() && self.params.r_js != ctx.r_js {
            return Err(Reason::GroupCommitmentMismatch.into());
        }

        // --- Identifiable abort
        if let Some((public_key_shares, participants)) = self.identifiable_abort {
            if public_key_shares.group_public_key != *self.group_public_key {
                return Err(Reason::PublicKeySharesMismatch.into());
            }
            for (j, partial_signature) in partial_signatures {
                let y_j = public_key_shares
                    .share_of(participants, *j)
                    .ok_or(Reason::UnknownSigner(*j))?;
                if !round2::verify_partial_signature(&ctx, *j, y_j, partial_signature) {
                    warn!(culprit = *j, "invalid partial signature");
                    return Err(Reason::InvalidPartialSignature(*j).into());
                }
            }
        }

        // --- The Aggregation
        let z = partial_signatures.values().map(|s| s.z).sum();
        let sig = Signature {
            r: ctx.group_commitment,
            z,
        };
        sig.verify(self.group_public_key, self.msg)
            .map_err(Reason::InvalidSignature)?;
        debug!(signers = partial_signatures.len(), "signature aggregated");
        Ok(sig)
    }
}

/// Aggregation error
#[derive(Debug)]
pub struct AggregateError(Reason);

#[derive(Debug)]
pub(crate) enum Reason {
    NotAggregator,
    NotReady,
    UnknownSender,
    IndexOutOfRange(usize),
    InvalidSession(super::InvalidSession),
    IncompletePreSignature(usize),
    EmptyMessage,
    MissingPartialSignature(ShamirId),
    UnexpectedSigner(ShamirId),
    UnknownSigner(ShamirId),
    Context(ContextError),
    GroupCommitmentMismatch,
    PublicKeySharesMismatch,
    InvalidPartialSignature(ShamirId),
    InvalidSignature(InvalidSignature),
}

impl AggregateError {
    /// Shamir id of the signer that caused the failure, if it's known
    pub fn culprit(&self) -> Option<ShamirId> {
        match self.0 {
            Reason::MissingPartialSignature(j) | Reason::InvalidPartialSignature(j) => Some(j),
            Reason::NotAggregator
            | Reason::NotReady
            | Reason::UnknownSender
            | Reason::IndexOutOfRange(_)
            | Reason::InvalidSession(_)
            | Reason::IncompletePreSignature(_)
            | Reason::EmptyMessage
            | Reason::UnexpectedSigner(_)
            | Reason::UnknownSigner(_)
            | Reason::Context(_)
            | Reason::GroupCommitmentMismatch
            | Reason::PublicKeySharesMismatch
            | Reason::InvalidSignature(_) => None,
        }
    }

    /// Indicates that resulting signature didn't verify
    pub fn is_invalid_signature(&self) -> bool {
        matches!(self.0, Reason::InvalidSignature(_))
    }
}

impl From<Reason> for AggregateError {
    fn from(err: Reason) -> Self {
        Self(err)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Reason::NotAggregator => f.write_str("party is not a signature aggregator"),
            Reason::NotReady => f.write_str("signing session is not completed"),
            Reason::UnknownSender => f.write_str("partial signature from unknown sender"),
            Reason::IndexOutOfRange(index) => {
                write!(f, "pre-signature index {index} is out of range")
            }
            Reason::InvalidSession(err) => write!(f, "invalid session: {err}"),
            Reason::IncompletePreSignature(index) => write!(
                f,
                "pre-signature at index {index} lacks commitments of some signers"
            ),
            Reason::EmptyMessage => f.write_str("message is empty"),
            Reason::MissingPartialSignature(j) => {
                write!(f, "partial signature of signer {j} is missing")
            }
            Reason::UnexpectedSigner(j) => {
                write!(f, "signer {j} doesn't take part in this session")
            }
            Reason::UnknownSigner(j) => write!(f, "public key share of signer {j} is unknown"),
            Reason::Context(ContextError::ZeroBindingFactor(j)) => {
                write!(f, "binding factor of signer {j} is zero")
            }
            Reason::Context(ContextError::IdentityGroupCommitment) => {
                f.write_str("group commitment is identity point")
            }
            Reason::GroupCommitmentMismatch => {
                f.write_str("group commitment doesn't match the commitments of the session")
            }
            Reason::PublicKeySharesMismatch => {
                f.write_str("public key shares belong to a different key")
            }
            Reason::InvalidPartialSignature(j) => {
                write!(f, "partial signature of signer {j} is invalid")
            }
            Reason::InvalidSignature(_) => f.write_str("aggregated signature is invalid"),
        }
    }
}

impl core::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match &self.0 {
            Reason::InvalidSignature(err) => Some(err),
            Reason::NotAggregator
            | Reason::NotReady
            | Reason::UnknownSender
            | Reason::IndexOutOfRange(_)
            | Reason::InvalidSession(_)
            | Reason::IncompletePreSignature(_)
            | Reason::EmptyMessage
            | Reason::MissingPartialSignature(_)
            | Reason::UnexpectedSigner(_)
            | Reason::UnknownSigner(_)
            | Reason::Context(_)
            | Reason::GroupCommitmentMismatch
            | Reason::PublicKeySharesMismatch
            | Reason::InvalidPartialSignature(_) => None,
        }
    }
}

/// Signature verification failed
#[derive(Debug)]
pub struct InvalidSignature;

impl fmt::Display for InvalidSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid signature")
    }
}

impl core::error::Error for InvalidSignature {}

/// Signature can't be decoded
#[derive(Debug)]
pub enum SignatureDecodingError {
    /// Length of encoded signature is wrong
    WrongLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
    /// `R` is not a valid point
    InvalidPoint,
    /// `z` is not a valid scalar
    InvalidScalar,
}

impl fmt::Display for SignatureDecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength { expected, actual } => write!(
                f,
                "signature must be {expected} bytes long, but it's {actual} bytes long"
            ),
            Self::InvalidPoint => f.write_str("invalid R component"),
            Self::InvalidScalar => f.write_str("invalid z component"),
        }
    }
}

impl core::error::Error for SignatureDecodingError {}
