use std::collections::BTreeMap;

use anyhow::Context;
use rand_core::{CryptoRng, RngCore};
use tschnorr::{
    agree_on_random::AgreeOnRandom,
    generic_ec::{NonZero, Point},
    keygen::DkgParticipant,
    signing::{
        aggregate::Signature,
        presign::{PreGenParticipant, PreSignatureBatch},
        round1::PrivateNoncePair,
    },
    AuthKey, Ciphersuite, CohortConfig, IdentityKey, Shard,
};

pub trait ExternalVerifier: Ciphersuite {
    type InvalidSig: core::fmt::Debug;

    fn verify_sig(
        pk: &NonZero<Point<Self::Curve>>,
        sig: &Signature<Self>,
        msg: &[u8],
    ) -> Result<(), Self::InvalidSig>;
}

impl ExternalVerifier for tschnorr::ciphersuite::Ed25519 {
    type InvalidSig = ed25519::SignatureError;

    fn verify_sig(
        pk: &NonZero<Point<Self::Curve>>,
        sig: &Signature<Self>,
        msg: &[u8],
    ) -> Result<(), ed25519::SignatureError> {
        let pk = ed25519::VerifyingKey::from_bytes(
            &Self::serialize_point(pk)
                .as_bytes()
                .try_into()
                .expect("wrong size of pk"),
        )?;
        let sig = ed25519::Signature::from_slice(&sig.to_bytes())?;

        pk.verify_strict(msg, &sig)
    }
}

impl ExternalVerifier for tschnorr::ciphersuite::Secp256k1 {
    type InvalidSig = core::convert::Infallible;

    fn verify_sig(
        _pk: &NonZero<Point<Self::Curve>>,
        _sig: &Signature<Self>,
        _msg: &[u8],
    ) -> Result<(), Self::InvalidSig> {
        // No external verifier for secp256k1 ciphersuite
        Ok(())
    }
}

/// Installs a log subscriber, logs are shown for failed tests only
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Generates `n` authentication keys, sorted by their Shamir ids
pub fn generate_auth_keys(
    rng: &mut (impl RngCore + CryptoRng),
    n: u16,
) -> Vec<ed25519::SigningKey> {
    let mut keys = (0..n)
        .map(|_| ed25519::SigningKey::generate(rng))
        .collect::<Vec<_>>();
    keys.sort_by_key(|k| k.identity());
    keys
}

pub fn identities(auth_keys: &[ed25519::SigningKey]) -> Vec<IdentityKey> {
    auth_keys.iter().map(|k| k.identity()).collect()
}

/// Cohort where every participant is an aggregator
pub fn cohort<C: Ciphersuite>(t: u16, auth_keys: &[ed25519::SigningKey]) -> CohortConfig<C> {
    let n = u16::try_from(auth_keys.len()).expect("too many parties");
    CohortConfig::new(t, n, identities(auth_keys), identities(auth_keys))
        .expect("invalid cohort")
}

/// Messages sent by everyone apart from `me`
pub fn others<M: Clone>(
    msgs: &BTreeMap<IdentityKey, M>,
    me: &IdentityKey,
) -> BTreeMap<IdentityKey, M> {
    msgs.iter()
        .filter(|(sender, _)| *sender != me)
        .map(|(sender, msg)| (*sender, msg.clone()))
        .collect()
}

/// Runs agree-on-random between all participants of the cohort
pub fn agree_on_random<C: Ciphersuite>(
    rng: &mut (impl RngCore + CryptoRng),
    cohort: &CohortConfig<C>,
) -> anyhow::Result<Vec<u8>> {
    let mut parties = cohort
        .participants()
        .iter()
        .map(|(_, id)| Ok((*id, AgreeOnRandom::new(cohort, id)?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
    let round1 = parties
        .iter_mut()
        .map(|(id, party)| Ok((*id, party.round1(rng)?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let session_ids = parties
        .iter_mut()
        .map(|(id, party)| party.round2(&others(&round1, id)))
        .collect::<Result<Vec<_>, _>>()?;
    let session_id = session_ids.first().context("no parties")?;
    anyhow::ensure!(
        session_ids.iter().all(|s| s == session_id),
        "parties derived different session ids"
    );
    Ok(session_id.clone())
}

/// Runs DKG between all participants of the cohort, outputs a shard of each participant
pub fn run_dkg<C: Ciphersuite>(
    rng: &mut (impl RngCore + CryptoRng),
    cohort: &CohortConfig<C>,
    session_id: &[u8],
) -> anyhow::Result<BTreeMap<IdentityKey, Shard<C::Curve>>> {
    let mut parties = cohort
        .participants()
        .iter()
        .map(|(_, id)| Ok((*id, DkgParticipant::new(cohort, id, session_id)?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let round1 = parties
        .iter_mut()
        .map(|(id, party)| Ok((*id, party.round1(rng)?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let mut round2_broadcasts = BTreeMap::new();
    let mut round2_p2p = BTreeMap::<IdentityKey, BTreeMap<_, _>>::new();
    for (id, party) in &mut parties {
        let (broadcast, p2p) = party.round2(&others(&round1, id))?;
        round2_broadcasts.insert(*id, broadcast);
        for (recipient, msg) in p2p {
            round2_p2p.entry(recipient).or_default().insert(*id, msg);
        }
    }

    let mut shards = BTreeMap::new();
    for (id, party) in &mut parties {
        let p2p = round2_p2p.remove(id).unwrap_or_default();
        let (signing_key_share, public_key_shares) =
            party.round3(&others(&round2_broadcasts, id), &p2p)?;
        shards.insert(
            *id,
            Shard {
                signing_key_share,
                public_key_shares,
            },
        );
    }
    Ok(shards)
}

/// Output of pre-signature generation: the batch, and secret nonces of each party
pub type PreGenOutput<C> = (
    PreSignatureBatch<C>,
    BTreeMap<IdentityKey, Vec<PrivateNoncePair<<C as Ciphersuite>::Curve>>>,
);

/// Generates `tau` pre-signatures between all participants of the cohort
pub fn run_pregen<C: Ciphersuite>(
    rng: &mut (impl RngCore + CryptoRng),
    cohort: &CohortConfig<C>,
    auth_keys: &[ed25519::SigningKey],
    session_id: &[u8],
    tau: usize,
) -> anyhow::Result<PreGenOutput<C>> {
    let mut parties = auth_keys
        .iter()
        .map(|key| {
            let party = PreGenParticipant::new(cohort, key, session_id, tau)?;
            Ok((key.identity(), party))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let round1 = parties
        .iter_mut()
        .map(|(id, party)| Ok((*id, party.round1(rng)?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let mut batch = None;
    let mut nonces = BTreeMap::new();
    for (id, party) in &mut parties {
        let (party_batch, party_nonces) = party.round2(&others(&round1, id))?;
        if let Some(first) = &batch {
            anyhow::ensure!(*first == party_batch, "parties got different batches");
        } else {
            batch = Some(party_batch);
        }
        nonces.insert(*id, party_nonces);
    }
    Ok((batch.context("no parties")?, nonces))
}

/// All `t`-sized subsets of Shamir ids `1..=n`, each sorted in ascending order
pub fn subsets(n: u16, t: u16) -> Vec<Vec<u16>> {
    fn go(next: u16, n: u16, t: u16, current: &mut Vec<u16>, out: &mut Vec<Vec<u16>>) {
        if current.len() == usize::from(t) {
            out.push(current.clone());
            return;
        }
        for j in next..=n {
            current.push(j);
            go(j + 1, n, t, current, out);
            current.pop();
        }
    }
    let mut out = vec![];
    go(1, n, t, &mut vec![], &mut out);
    out
}
