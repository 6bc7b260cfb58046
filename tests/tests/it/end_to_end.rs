use std::collections::BTreeMap;

use tschnorr::{
    ciphersuite::Ed25519,
    generic_ec::Scalar,
    signing::{aggregate::SignatureAggregator, interactive::InteractiveCosigner},
};
use tschnorr_tests::{others, ExternalVerifier};

#[test]
fn ed25519_t2_n3_hello_world() {
    tschnorr_tests::init_tracing();
    let mut rng = rand_dev::DevRng::new();
    let msg = b"Hello World!";

    let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
    let cohort = tschnorr_tests::cohort::<Ed25519>(2, &auth_keys);
    let session_id = tschnorr_tests::agree_on_random(&mut rng, &cohort).unwrap();
    let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, &session_id).unwrap();

    // Parties 1 and 3 sign
    let signers = [1, 3].map(|j| *cohort.participants().identity(j).unwrap());
    let mut cosigners = signers
        .iter()
        .map(|id| {
            let cosigner = InteractiveCosigner::new(&cohort, id, &shards[id], &signers).unwrap();
            (*id, cosigner)
        })
        .collect::<BTreeMap<_, _>>();
    let round1 = cosigners
        .iter_mut()
        .map(|(id, cosigner)| (*id, cosigner.round1(&mut rng).unwrap()))
        .collect::<BTreeMap<_, _>>();
    let mut partials = cosigners
        .iter_mut()
        .map(|(id, cosigner)| (*id, cosigner.round2(&others(&round1, id), msg).unwrap()))
        .collect::<BTreeMap<_, _>>();

    let aggregator = &cosigners[&signers[0]];
    let sig = aggregator.aggregate(msg, &partials).unwrap();

    let pk = shards[&signers[0]].public_key_shares.group_public_key;
    sig.verify(&pk, msg).unwrap();
    Ed25519::verify_sig(&pk, &sig, msg).unwrap();
    assert_eq!(sig.to_bytes().len(), 64);

    // Signature of party 3 is replaced with a random scalar
    partials.get_mut(&signers[1]).unwrap().z = Scalar::random(&mut rng);

    let err = aggregator.aggregate(msg, &partials).unwrap_err();
    assert_eq!(err.culprit(), Some(3));

    let partials = partials
        .iter()
        .map(|(id, sig)| (cohort.participants().shamir_id(id).unwrap(), *sig))
        .collect();
    let err = SignatureAggregator::<Ed25519>::new(
        &pk,
        aggregator.aggregation_parameters().unwrap(),
        msg,
    )
    .aggregate(&partials)
    .unwrap_err();
    assert!(err.is_invalid_signature());
}
