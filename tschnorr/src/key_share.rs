//! Key shares produced by the [DKG](crate::keygen)
//!
//! * [`SigningKeyShare`] is the secret share of a party, it's never serialized in clear
//! * [`PublicKeyShares`] are public commitments to every party's share, used to identify
//!   misbehaving signers at [aggregation](crate::signing::aggregate)
//! * [`Shard`] bundles the two, it's what a cosigner is constructed from

use alloc::collections::BTreeMap;
use core::fmt;

use generic_ec::{Curve, NonZero, Point, Scalar, SecretScalar};

use crate::{cohort::ShamirIds, IdentityKey};

/// Secret share of the group signing key
pub struct SigningKeyShare<E: Curve> {
    share: SecretScalar<E>,
    group_public_key: NonZero<Point<E>>,
}

impl<E: Curve> SigningKeyShare<E> {
    /// Constructs a key share, returns error if share is zero
    pub fn new(
        share: SecretScalar<E>,
        group_public_key: NonZero<Point<E>>,
    ) -> Result<Self, InvalidShard> {
        if *share.as_ref() == Scalar::zero() {
            return Err(Reason::ZeroShare.into());
        }
        Ok(Self {
            share,
            group_public_key,
        })
    }

    /// Secret share `x_i`
    pub fn share(&self) -> &SecretScalar<E> {
        &self.share
    }

    /// Group public key `Y`
    pub fn group_public_key(&self) -> NonZero<Point<E>> {
        self.group_public_key
    }

    /// Public counterpart of the share `x_i G`
    pub fn public_share(&self) -> Point<E> {
        Point::generator() * self.share.as_ref()
    }
}

impl<E: Curve> fmt::Debug for SigningKeyShare<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyShare")
            .field("share", &"<redacted>")
            .field("group_public_key", &self.group_public_key)
            .finish()
    }
}

/// Public key shares of every party
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct PublicKeyShares<E: Curve> {
    /// Group public key `Y`
    pub group_public_key: NonZero<Point<E>>,
    /// Public share `Y_j = x_j G` of every party
    pub shares: BTreeMap<IdentityKey, NonZero<Point<E>>>,
}

impl<E: Curve> PublicKeyShares<E> {
    /// Public share of the party with given Shamir id
    pub fn share_of(
        &self,
        participants: &ShamirIds,
        j: crate::ShamirId,
    ) -> Option<&NonZero<Point<E>>> {
        self.shares.get(participants.identity(j)?)
    }
}

/// Everything a party needs to sign: its secret share and public shares of the group
#[derive(Debug)]
pub struct Shard<E: Curve> {
    /// Secret share of the party
    pub signing_key_share: SigningKeyShare<E>,
    /// Public shares of every party
    pub public_key_shares: PublicKeyShares<E>,
}

impl<E: Curve> Shard<E> {
    /// Checks that the shard is consistent and belongs to `me`
    ///
    /// * both parts refer to the same group public key
    /// * public shares are given for exactly the `participants`
    /// * public share of `me` matches the secret share
    pub fn validate(&self, participants: &ShamirIds, me: &IdentityKey) -> Result<(), InvalidShard> {
        if self.signing_key_share.group_public_key != self.public_key_shares.group_public_key {
            return Err(Reason::GroupKeyMismatch.into());
        }
        if self.public_key_shares.shares.len() != participants.len()
            || participants
                .iter()
                .any(|(_, p)| !self.public_key_shares.shares.contains_key(p))
        {
            return Err(Reason::ParticipantsMismatch.into());
        }
        let own = self
            .public_key_shares
            .shares
            .get(me)
            .ok_or(Reason::ParticipantsMismatch)?;
        let own: &Point<E> = own.as_ref();
        if *own != self.signing_key_share.public_share() {
            return Err(Reason::PublicShareMismatch.into());
        }
        Ok(())
    }
}

/// Invalid key share
#[derive(Debug)]
pub struct InvalidShard(Reason);

#[derive(Debug)]
enum Reason {
    ZeroShare,
    GroupKeyMismatch,
    ParticipantsMismatch,
    PublicShareMismatch,
}

impl fmt::Display for InvalidShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Reason::ZeroShare => f.write_str("secret share is zero"),
            Reason::GroupKeyMismatch => f.write_str(
                "secret share and public shares refer to different group public keys",
            ),
            Reason::ParticipantsMismatch => {
                f.write_str("public shares don't match the set of participants")
            }
            Reason::PublicShareMismatch => {
                f.write_str("public share doesn't match the secret share")
            }
        }
    }
}

impl core::error::Error for InvalidShard {}

impl From<Reason> for InvalidShard {
    fn from(err: Reason) -> Self {
        Self(err)
    }
}
