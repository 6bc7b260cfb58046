use digest::Digest;

use crate::Ciphersuite;

/// FROST(Ed25519, SHA-512) ciphersuite that produces Ed25519-compliant signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ed25519;

impl Ed25519 {
    fn hash_to_scalar(
        tag: &[u8],
        msg: &[&[u8]],
    ) -> generic_ec::Scalar<<Self as Ciphersuite>::Curve> {
        let mut hash = sha2::Sha512::new()
            .chain_update(Self::NAME)
            .chain_update(tag);
        for msg in msg {
            hash.update(msg);
        }
        let hash = hash.finalize();

        generic_ec::Scalar::from_le_bytes_mod_order(hash)
    }
}

impl Ciphersuite for Ed25519 {
    const NAME: &'static str = "FROST-ED25519-SHA512-v1";

    type Curve = generic_ec::curves::Ed25519;
    type Digest = sha2::Sha512;

    fn h1(msg: &[&[u8]]) -> generic_ec::Scalar<Self::Curve> {
        Self::hash_to_scalar(b"rho", msg)
    }

    fn compute_challenge(
        group_commitment: &generic_ec::Point<Self::Curve>,
        group_public_key: &generic_ec::Point<Self::Curve>,
        msg: &[u8],
    ) -> generic_ec::Scalar<Self::Curve> {
        // No domain separation: challenge must match RFC 8032
        let hash = sha2::Sha512::new()
            .chain_update(Self::serialize_point(group_commitment))
            .chain_update(Self::serialize_point(group_public_key))
            .chain_update(msg)
            .finalize();

        generic_ec::Scalar::from_le_bytes_mod_order(hash)
    }

    fn h3(msg: &[&[u8]]) -> generic_ec::Scalar<Self::Curve> {
        Self::hash_to_scalar(b"nonce", msg)
    }

    fn h4() -> Self::Digest {
        sha2::Sha512::new()
            .chain_update(Self::NAME)
            .chain_update(b"msg")
    }

    fn h5() -> Self::Digest {
        sha2::Sha512::new()
            .chain_update(Self::NAME)
            .chain_update(b"com")
    }

    fn hdkg(msg: &[&[u8]]) -> generic_ec::Scalar<Self::Curve> {
        Self::hash_to_scalar(b"dkg", msg)
    }

    type PointBytes = generic_ec::EncodedPoint<Self::Curve>;
    const POINT_SIZE: usize = 32;
    fn serialize_point(point: &generic_ec::Point<Self::Curve>) -> Self::PointBytes {
        point.to_bytes(true)
    }
    fn deserialize_point(
        bytes: &[u8],
    ) -> Result<generic_ec::Point<Self::Curve>, generic_ec::errors::InvalidPoint> {
        generic_ec::Point::from_bytes(bytes)
    }

    type ScalarBytes = generic_ec::EncodedScalar<Self::Curve>;
    const SCALAR_SIZE: usize = 32;
    fn serialize_scalar(scalar: &generic_ec::Scalar<Self::Curve>) -> Self::ScalarBytes {
        scalar.to_le_bytes()
    }
    fn deserialize_scalar(
        bytes: &[u8],
    ) -> Result<generic_ec::Scalar<Self::Curve>, generic_ec::errors::InvalidScalar> {
        generic_ec::Scalar::from_le_bytes(bytes)
    }
}
