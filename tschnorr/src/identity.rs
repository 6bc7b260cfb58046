//! Identities of the parties
//!
//! Identity keys are long-term authentication keys of the parties. They are used to address
//! the parties and to attest protocol artifacts (such as [pre-signatures](crate::signing::presign)),
//! they are never used as the threshold key itself.
//!
//! [`IdentityKey`] is the public side that everyone knows, [`AuthKey`] is the private side
//! held by the party only.

use core::{cmp, fmt};

/// Public identity key of a party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IdentityKey {
    /// Ed25519 verifying key
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// Attestation of a message issued by an [`AuthKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Attestation {
    /// Ed25519 signature
    Ed25519(ed25519_dalek::Signature),
}

/// Private authentication key of a party
pub trait AuthKey {
    /// Public identity corresponding to this key
    fn identity(&self) -> IdentityKey;
    /// Attests the message
    fn attest(&self, msg: &[u8]) -> Attestation;
}

impl AuthKey for ed25519_dalek::SigningKey {
    fn identity(&self) -> IdentityKey {
        IdentityKey::Ed25519(self.verifying_key())
    }

    fn attest(&self, msg: &[u8]) -> Attestation {
        use ed25519_dalek::Signer;
        Attestation::Ed25519(self.sign(msg))
    }
}

impl IdentityKey {
    /// Canonical bytes representation of the key
    ///
    /// Participants are ordered by these bytes when Shamir ids are derived
    pub fn to_bytes(&self) -> [u8; 32] {
        match self {
            Self::Ed25519(pk) => pk.to_bytes(),
        }
    }

    /// Verifies that `attestation` was issued on `msg` by the owner of this identity
    pub fn verify(&self, msg: &[u8], attestation: &Attestation) -> Result<(), InvalidAttestation> {
        match (self, attestation) {
            (Self::Ed25519(pk), Attestation::Ed25519(sig)) => {
                pk.verify_strict(msg, sig).map_err(|_| InvalidAttestation)
            }
        }
    }
}

impl Attestation {
    /// Bytes representation of the attestation
    pub fn to_bytes(&self) -> [u8; 64] {
        match self {
            Self::Ed25519(sig) => sig.to_bytes(),
        }
    }
}

impl From<ed25519_dalek::VerifyingKey> for IdentityKey {
    fn from(pk: ed25519_dalek::VerifyingKey) -> Self {
        Self::Ed25519(pk)
    }
}

impl Ord for IdentityKey {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}
impl PartialOrd for IdentityKey {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Attestation doesn't match the message or the identity
#[derive(Debug)]
pub struct InvalidAttestation;

impl fmt::Display for InvalidAttestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid attestation")
    }
}

impl core::error::Error for InvalidAttestation {}
