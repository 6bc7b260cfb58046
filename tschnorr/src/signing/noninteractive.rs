//! Signing with pre-signatures
//!
//! Once a [batch of pre-signatures](super::presign) is generated, each message is signed in a
//! single step: a signer picks a pre-signature that wasn't used yet and issues a partial
//! signature right away. All signers of the message must use the same index.
//!
//! Each pre-signature is used at most once. The cosigner takes the nonces out of the batch
//! when signing, and rejects any index which is not above the last used one. If the batch is
//! persisted between executions, `first_unused_index` must be persisted as well, so nonces that
//! were used before can't be used again.

use alloc::{collections::BTreeMap, vec::Vec};

use tracing::{debug, warn};

use crate::{Ciphersuite, CohortConfig, IdentityKey, ShamirId, Shard};

use super::{
    aggregate::{self, AggregateError, AggregationParameters, Signature, SignatureAggregator},
    presign::PreSignatureBatch,
    round1::PrivateNoncePair,
    round2::{self, Bug, PartialSignature, Reason, SigningError},
};

/// Signer consuming pre-signatures
pub struct NonInteractiveCosigner<'a, C: Ciphersuite> {
    cohort: &'a CohortConfig<C>,
    identity: IdentityKey,
    i: ShamirId,
    shard: &'a Shard<C::Curve>,
    batch: &'a PreSignatureBatch<C>,
    nonces: Vec<Option<PrivateNoncePair<C::Curve>>>,
    first_unused_index: usize,
    last_used_index: Option<usize>,
    signed: BTreeMap<usize, (PartialSignature<C::Curve>, AggregationParameters<C::Curve>)>,
}

impl<'a, C: Ciphersuite> NonInteractiveCosigner<'a, C> {
    /// Constructs a cosigner
    ///
    /// * `batch` of pre-signatures and own `nonces` are outputs of
    ///   [pre-signature generation](super::presign::PreGenParticipant::round2)
    /// * Pre-signatures with index below `first_unused_index` can't be used. Nonces at these
    ///   indexes are dropped right away.
    pub fn new(
        cohort: &'a CohortConfig<C>,
        me: &IdentityKey,
        shard: &'a Shard<C::Curve>,
        batch: &'a PreSignatureBatch<C>,
        nonces: Vec<PrivateNoncePair<C::Curve>>,
        first_unused_index: usize,
    ) -> Result<Self, SigningError> {
        let i = cohort
            .participants()
            .shamir_id(me)
            .ok_or(Reason::NotAParticipant)?;
        shard
            .validate(cohort.participants(), me)
            .map_err(Reason::InvalidShard)?;
        batch.validate(cohort).map_err(Reason::InvalidBatch)?;
        if nonces.len() != batch.len() {
            return Err(Reason::NoncesDontMatchBatch.into());
        }
        if first_unused_index > batch.len() {
            return Err(Reason::IndexOutOfRange {
                index: first_unused_index,
                batch_size: batch.len(),
            }
            .into());
        }

        let nonces = nonces
            .into_iter()
            .zip(&batch.pre_signatures)
            .enumerate()
            .map(|(index, (nonce_pair, pre_signature))| {
                let own = pre_signature.row.get(me).ok_or(Reason::NoncesDontMatchBatch)?;
                if own.commitments != nonce_pair.commitments() {
                    return Err(Reason::NoncesDontMatchBatch);
                }
                Ok((index >= first_unused_index).then_some(nonce_pair))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cohort,
            identity: *me,
            i,
            shard,
            batch,
            nonces,
            first_unused_index,
            last_used_index: None,
            signed: BTreeMap::new(),
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

    /// Index of the last pre-signature used by this cosigner
    pub fn last_used_index(&self) -> Option<usize> {
        self.last_used_index
    }

    /// Number of pre-signatures this cosigner can still sign with
    pub fn remaining_pre_signatures(&self) -> usize {
        self.nonces.iter().filter(|nonces| nonces.is_some()).count()
    }

    /// Index of the first pre-signature that can still be used
    ///
    /// This is the value to persist along with the batch.
    pub fn first_unused_index(&self) -> usize {
        match self.last_used_index {
            Some(last) => last + 1,
            None => self.first_unused_index,
        }
    }

    /// Signs `msg` using pre-signature at `index`
    ///
    /// `session_participants` are the parties that sign this message with the same
    /// pre-signature, including this signer. Index must be greater than any index used before
    /// by this cosigner.
    pub fn produce_partial_signature(
        &mut self,
        index: usize,
        session_participants: &[IdentityKey],
        msg: &[u8],
    ) -> Result<PartialSignature<C::Curve>, SigningError> {
        let pre_signature = self.batch.get(index).ok_or(Reason::IndexOutOfRange {
            index,
            batch_size: self.batch.len(),
        })?;
        if index < self.first_unused_index()
            || !self.nonces.get(index).is_some_and(Option::is_some)
        {
            warn!(i = self.i, index, "attempt to reuse pre-signature");
            return Err(Reason::IndexAlreadyUsed(index).into());
        }
        if msg.is_empty() {
            return Err(Reason::EmptyMessage.into());
        }
        let session = super::session_ids(self.cohort, self.i, session_participants)?;
        let commitments = pre_signature
            .commitments_of(self.cohort.participants(), &session)
            .ok_or(Bug::MissingPreSignature(index))?;
        debug!(i = self.i, index, signers = session.len(), "non-interactive signing");

        // Nonces are consumed from this point, whatever the outcome. Skipped pre-signatures
        // can't be used anymore, so their nonces are dropped as well.
        let first_unused = self.first_unused_index();
        let nonces = self
            .nonces
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(Reason::IndexAlreadyUsed(index))?;
        for skipped in self.nonces.get_mut(first_unused..index).into_iter().flatten() {
            *skipped = None;
        }
        self.last_used_index = Some(index);

        let (partial_signature, params) = round2::sign::<C>(
            &self.shard.signing_key_share,
            self.i,
            nonces,
            msg,
            &commitments,
            self.cohort.threshold(),
        )
        .map_err(|err| {
            warn!(i = self.i, index, %err, "signing aborted");
            err
        })?;

        if self.is_signature_aggregator() {
            self.signed.insert(index, (partial_signature, params));
        }
        Ok(partial_signature)
    }

    /// Aggregates partial signatures produced with pre-signature at `index`
    ///
    /// Only available to signature aggregators. The aggregator doesn't need to be among
    /// `session_participants`; if it is and it already signed, own partial signature may be
    /// omitted from `partial_signatures`.
    pub fn aggregate(
        &self,
        index: usize,
        session_participants: &[IdentityKey],
        msg: &[u8],
        partial_signatures: &BTreeMap<IdentityKey, PartialSignature<C::Curve>>,
    ) -> Result<Signature<C>, AggregateError> {
        if !self.is_signature_aggregator() {
            return Err(aggregate::Reason::NotAggregator.into());
        }
        let pre_signature = self
            .batch
            .get(index)
            .ok_or(aggregate::Reason::IndexOutOfRange(index))?;

        let participants = self.cohort.participants();
        let session = super::session_members(self.cohort, session_participants)
            .map_err(aggregate::Reason::InvalidSession)?;
        let mut partial_signatures =
            super::index_partial_signatures(self.cohort, partial_signatures)?;

        let own_params;
        let params = match self.signed.get(&index) {
            Some((own_partial_signature, params))
                if params.commitments.keys().eq(session.iter()) =>
            {
                partial_signatures
                    .entry(self.i)
                    .or_insert(*own_partial_signature);
                params
            }
            _ => {
                let commitments = pre_signature
                    .commitments_of(participants, &session)
                    .ok_or(aggregate::Reason::IncompletePreSignature(index))?;
                own_params = AggregationParameters::from_commitments(commitments);
                &own_params
            }
        };

        let group_public_key = self.shard.public_key_shares.group_public_key;
        SignatureAggregator::<C>::new(&group_public_key, params, msg)
            .with_identifiable_abort(&self.shard.public_key_shares, participants)
            .aggregate(&partial_signatures)
            .map_err(|err| {
                if let Some(culprit) = err.culprit() {
                    warn!(i = self.i, index, culprit, %err, "aggregation aborted");
                }
                err
            })
    }
}
