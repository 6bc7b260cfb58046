#[generic_tests::define(attrs(test, test_case::case))]
mod generic {
    use std::collections::BTreeMap;

    use rand::{Rng, RngCore};
    use tschnorr::{
        generic_ec::Scalar,
        signing::{
            aggregate::SignatureAggregator,
            interactive::{InteractiveCosigner, Round},
            round2::PartialSignature,
        },
        AuthKey, Ciphersuite, CohortConfig, IdentityKey, Shard,
    };
    use tschnorr_tests::{others, ExternalVerifier};

    type Shards<C> = BTreeMap<IdentityKey, Shard<<C as Ciphersuite>::Curve>>;
    type Partials<C> = BTreeMap<IdentityKey, PartialSignature<<C as Ciphersuite>::Curve>>;

    fn keygen<C: Ciphersuite>(
        rng: &mut rand_dev::DevRng,
        t: u16,
        n: u16,
    ) -> (Vec<::ed25519::SigningKey>, CohortConfig<C>) {
        let auth_keys = tschnorr_tests::generate_auth_keys(rng, n);
        let cohort = tschnorr_tests::cohort::<C>(t, &auth_keys);
        (auth_keys, cohort)
    }

    /// Runs both rounds of interactive signing between `signers`
    fn sign<'a, C: Ciphersuite>(
        rng: &mut rand_dev::DevRng,
        cohort: &'a CohortConfig<C>,
        shards: &'a Shards<C>,
        signers: &[IdentityKey],
        msg: &[u8],
    ) -> (BTreeMap<IdentityKey, InteractiveCosigner<'a, C>>, Partials<C>) {
        let mut cosigners = signers
            .iter()
            .map(|id| {
                let cosigner = InteractiveCosigner::new(cohort, id, &shards[id], signers).unwrap();
                (*id, cosigner)
            })
            .collect::<BTreeMap<_, _>>();
        let round1 = cosigners
            .iter_mut()
            .map(|(id, cosigner)| (*id, cosigner.round1(rng).unwrap()))
            .collect::<BTreeMap<_, _>>();
        let partials = cosigners
            .iter_mut()
            .map(|(id, cosigner)| (*id, cosigner.round2(&others(&round1, id), msg).unwrap()))
            .collect::<BTreeMap<_, _>>();
        (cosigners, partials)
    }

    fn random_message(rng: &mut rand_dev::DevRng) -> Vec<u8> {
        let mut msg = vec![0u8; rng.gen_range(20..=100)];
        rng.fill_bytes(&mut msg);
        msg
    }

    #[test_case::case(1, 1; "t1n1")]
    #[test_case::case(2, 3; "t2n3")]
    #[test_case::case(3, 3; "t3n3")]
    #[test_case::case(2, 4; "t2n4")]
    #[test_case::case(3, 5; "t3n5")]
    fn every_subset_of_t_signers_signs<C: Ciphersuite + ExternalVerifier>(t: u16, n: u16) {
        tschnorr_tests::init_tracing();
        let mut rng = rand_dev::DevRng::new();

        let (_auth_keys, cohort) = keygen::<C>(&mut rng, t, n);
        let session_id = tschnorr_tests::agree_on_random(&mut rng, &cohort).unwrap();
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, &session_id).unwrap();

        for subset in tschnorr_tests::subsets(n, t) {
            let signers = subset
                .iter()
                .map(|&j| *cohort.participants().identity(j).unwrap())
                .collect::<Vec<_>>();
            let msg = random_message(&mut rng);

            let (cosigners, partials) = sign(&mut rng, &cohort, &shards, &signers, &msg);

            let mut sigs = vec![];
            for cosigner in cosigners.values() {
                assert_eq!(cosigner.round(), Round::Done);
                sigs.push(cosigner.aggregate(&msg, &partials).unwrap());
            }

            let pk = shards[&signers[0]].public_key_shares.group_public_key;
            sigs[0].verify(&pk, &msg).unwrap();
            C::verify_sig(&pk, &sigs[0], &msg).expect("external verifier: invalid signature");
            for sig in &sigs[1..] {
                assert_eq!(sigs[0].r, sig.r);
                assert_eq!(sigs[0].z, sig.z);
            }
        }
    }

    #[test]
    fn aggregator_may_omit_own_partial_signature<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let (_auth_keys, cohort) = keygen::<C>(&mut rng, 2, 3);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let signers = cohort
            .participants()
            .iter()
            .map(|(_, id)| *id)
            .take(2)
            .collect::<Vec<_>>();

        let (cosigners, partials) = sign(&mut rng, &cohort, &shards, &signers, b"msg");
        let aggregator = &cosigners[&signers[0]];
        let sig = aggregator
            .aggregate(b"msg", &others(&partials, &signers[0]))
            .unwrap();
        sig.verify(&shards[&signers[0]].public_key_shares.group_public_key, b"msg")
            .unwrap();
    }

    #[test]
    fn partial_signature_from_another_session_is_rejected<C: Ciphersuite>() {
        tschnorr_tests::init_tracing();
        let mut rng = rand_dev::DevRng::new();
        let (_auth_keys, cohort) = keygen::<C>(&mut rng, 2, 3);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let signers = cohort
            .participants()
            .iter()
            .map(|(_, id)| *id)
            .take(2)
            .collect::<Vec<_>>();

        let (_, partials_a) = sign(&mut rng, &cohort, &shards, &signers, b"message A");
        let (cosigners_b, mut partials_b) =
            sign(&mut rng, &cohort, &shards, &signers, b"message B");

        // Signer 2 replays its partial signature from session A
        partials_b.insert(signers[1], partials_a[&signers[1]]);
        let err = cosigners_b[&signers[0]]
            .aggregate(b"message B", &partials_b)
            .unwrap_err();
        assert_eq!(err.culprit(), Some(2));

        // Replay on the same message with fresh nonces is rejected as well
        let (cosigners_c, mut partials_c) =
            sign(&mut rng, &cohort, &shards, &signers, b"message A");
        partials_c.insert(signers[1], partials_a[&signers[1]]);
        let err = cosigners_c[&signers[0]]
            .aggregate(b"message A", &partials_c)
            .unwrap_err();
        assert_eq!(err.culprit(), Some(2));
    }

    #[test]
    fn random_partial_signature_is_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let (_auth_keys, cohort) = keygen::<C>(&mut rng, 3, 4);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let signers = cohort
            .participants()
            .iter()
            .map(|(_, id)| *id)
            .skip(1)
            .collect::<Vec<_>>();

        let (cosigners, mut partials) = sign(&mut rng, &cohort, &shards, &signers, b"msg");
        partials.insert(
            signers[1],
            PartialSignature {
                z: Scalar::random(&mut rng),
            },
        );

        // Identifiable abort names the forger
        let aggregator = &cosigners[&signers[0]];
        let err = aggregator.aggregate(b"msg", &partials).unwrap_err();
        assert_eq!(err.culprit(), Some(3));
        assert!(!err.is_invalid_signature());

        // Without identifiable abort, the resulting signature doesn't verify
        let params = aggregator.aggregation_parameters().unwrap();
        let pk = shards[&signers[0]].public_key_shares.group_public_key;
        let partials = partials
            .iter()
            .map(|(id, sig)| (cohort.participants().shamir_id(id).unwrap(), *sig))
            .collect();
        let err = SignatureAggregator::<C>::new(&pk, params, b"msg")
            .aggregate(&partials)
            .unwrap_err();
        assert!(err.is_invalid_signature());
        assert_eq!(err.culprit(), None);
    }

    #[test]
    fn missing_partial_signature_names_the_signer<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let (_auth_keys, cohort) = keygen::<C>(&mut rng, 2, 3);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let signers = cohort
            .participants()
            .iter()
            .map(|(_, id)| *id)
            .collect::<Vec<_>>();

        let (cosigners, mut partials) = sign(&mut rng, &cohort, &shards, &signers, b"msg");
        partials.remove(&signers[2]);
        let err = cosigners[&signers[0]]
            .aggregate(b"msg", &partials)
            .unwrap_err();
        assert_eq!(err.culprit(), Some(3));
    }

    #[test]
    fn rounds_out_of_order_are_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let (_auth_keys, cohort) = keygen::<C>(&mut rng, 2, 2);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let signers = cohort
            .participants()
            .iter()
            .map(|(_, id)| *id)
            .collect::<Vec<_>>();

        let mut alice =
            InteractiveCosigner::new(&cohort, &signers[0], &shards[&signers[0]], &signers)
                .unwrap();
        let mut bob =
            InteractiveCosigner::new(&cohort, &signers[1], &shards[&signers[1]], &signers)
                .unwrap();

        let err = alice.round2(&BTreeMap::new(), b"msg").unwrap_err();
        assert!(err.is_round_mismatch());
        assert!(alice.aggregate(b"msg", &BTreeMap::new()).is_err());
        assert_eq!(alice.round(), Round::Round1);

        let alice_msg = alice.round1(&mut rng).unwrap();
        let bob_msg = bob.round1(&mut rng).unwrap();
        assert!(alice.round1(&mut rng).unwrap_err().is_round_mismatch());

        // Empty message is rejected before nonces are consumed
        let from_bob = BTreeMap::from([(signers[1], bob_msg)]);
        alice.round2(&from_bob, b"").unwrap_err();
        assert_eq!(alice.round(), Round::Round2);

        let alice_partial = alice.round2(&from_bob, b"msg").unwrap();
        let bob_partial = bob
            .round2(&BTreeMap::from([(signers[0], alice_msg)]), b"msg")
            .unwrap();
        assert!(alice
            .round2(&from_bob, b"msg")
            .unwrap_err()
            .is_round_mismatch());

        let partials = BTreeMap::from([(signers[0], alice_partial), (signers[1], bob_partial)]);
        alice.aggregate(b"msg", &partials).unwrap();
    }

    #[test]
    fn invalid_sessions_are_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let (auth_keys, cohort) = keygen::<C>(&mut rng, 2, 3);
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();
        let ids = tschnorr_tests::identities(&auth_keys);
        let me = &ids[0];
        let shard = &shards[me];
        let outsider = tschnorr_tests::generate_auth_keys(&mut rng, 1)[0].identity();

        // Too few signers
        assert!(InteractiveCosigner::new(&cohort, me, shard, &[*me]).is_err());
        // Signer is not in the session
        assert!(InteractiveCosigner::new(&cohort, me, shard, &[ids[1], ids[2]]).is_err());
        // Same signer twice
        assert!(InteractiveCosigner::new(&cohort, me, shard, &[*me, ids[1], ids[1]]).is_err());
        // Signer is not a participant of the cohort
        assert!(InteractiveCosigner::new(&cohort, me, shard, &[*me, outsider]).is_err());
        assert!(InteractiveCosigner::new(&cohort, &outsider, shard, &[*me, outsider]).is_err());
        // Shard belongs to someone else
        assert!(InteractiveCosigner::new(&cohort, me, &shards[&ids[1]], &[*me, ids[1]]).is_err());

        InteractiveCosigner::new(&cohort, me, shard, &[ids[1], *me]).unwrap();
    }

    #[test]
    fn only_aggregators_aggregate<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let ids = tschnorr_tests::identities(&auth_keys);
        let cohort = CohortConfig::<C>::new(2, 3, ids.clone(), [ids[2]]).unwrap();
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, b"dkg").unwrap();

        let (cosigners, partials) = sign(&mut rng, &cohort, &shards, &ids[..2], b"msg");
        for cosigner in cosigners.values() {
            assert!(!cosigner.is_signature_aggregator());
            assert!(cosigner.aggregation_parameters().is_none());
            assert!(cosigner.aggregate(b"msg", &partials).is_err());
        }

        let (cosigners, partials) = sign(&mut rng, &cohort, &shards, &ids[1..], b"msg");
        let aggregator = &cosigners[&ids[2]];
        assert!(aggregator.is_signature_aggregator());
        aggregator.aggregate(b"msg", &partials).unwrap();
    }

    #[instantiate_tests(<tschnorr::ciphersuite::Secp256k1>)]
    mod secp256k1 {}
    #[instantiate_tests(<tschnorr::ciphersuite::Ed25519>)]
    mod ed25519 {}
}
