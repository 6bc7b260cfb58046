//! Threshold Schnorr signatures based on [FROST IETF Draft][draft]
//!
//! A group of `n` parties jointly holds a signing key such that any `t` of them can produce
//! a regular Schnorr signature, while fewer than `t` parties learn nothing about the key.
//! The secret key never exists in one place, not even during generation.
//!
//! This crate provides:
//! * [Cohort](cohort) description: threshold, participants and their [identities](identity),
//!   and a deterministic mapping of participants onto Shamir ids `1..=n`
//! * [Distributed Key Generation](keygen) \
//!   3-round Feldman/Pedersen VSS with proofs of knowledge of the shared secrets, resulting
//!   in a [signing key share](key_share::SigningKeyShare) for each party and
//!   [public key shares](key_share::PublicKeyShares) of the whole group. A shared session id
//!   can be derived beforehand via [`agree_on_random`].
//! * [Interactive signing](signing::interactive) \
//!   2 rounds: nonce commitments exchange, then partial signatures.
//! * [Pre-signatures](signing::presign) and [non-interactive signing](signing::noninteractive) \
//!   Nonce commitments are generated and attested in batches ahead of time, so signing a
//!   message takes a single message from each signer.
//! * [Aggregation](signing::aggregate) with identifiable abort \
//!   Each partial signature is checked against the signer's public key share, so a
//!   misbehaving signer is named rather than the whole signing failing opaquely.
//!
//! The crate doesn't do any networking: every round takes messages already collected by
//! the caller, and returns messages that the caller must deliver.
//!
//! [draft]: https://www.ietf.org/archive/id/draft-irtf-cfrg-frost-15.html

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]
#![deny(missing_docs)]
#![allow(clippy::type_complexity)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub use generic_ec;

pub mod agree_on_random;
pub mod ciphersuite;
pub mod cohort;
pub mod identity;
pub mod key_share;
pub mod keygen;
pub mod sharing;
pub mod signing;

pub use self::{
    ciphersuite::Ciphersuite,
    cohort::CohortConfig,
    identity::{AuthKey, IdentityKey},
    key_share::{PublicKeyShares, Shard, SigningKeyShare},
};

/// Index of a participant in secret sharing, `1..=n`
///
/// Derived from the cohort by [`cohort::derive_shamir_ids`]
pub type ShamirId = u16;
