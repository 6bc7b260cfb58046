#[generic_tests::define(attrs(test, test_case::case))]
mod generic {
    use std::collections::BTreeMap;

    use tschnorr::{
        generic_ec::{Point, Scalar},
        keygen::{DkgParticipant, Round},
        sharing, AuthKey, Ciphersuite,
    };
    use tschnorr_tests::others;

    #[test_case::case(1, 1; "t1n1")]
    #[test_case::case(2, 3; "t2n3")]
    #[test_case::case(3, 3; "t3n3")]
    #[test_case::case(3, 5; "t3n5")]
    #[test_case::case(5, 5; "t5n5")]
    fn keygen_reconstructs_the_key<C: Ciphersuite>(t: u16, n: u16) {
        tschnorr_tests::init_tracing();
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, n);
        let cohort = tschnorr_tests::cohort::<C>(t, &auth_keys);
        let session_id = tschnorr_tests::agree_on_random(&mut rng, &cohort).unwrap();
        let shards = tschnorr_tests::run_dkg(&mut rng, &cohort, &session_id).unwrap();
        assert_eq!(shards.len(), usize::from(n));

        // Everyone agrees on the public part
        let public_key_shares = &shards.values().next().unwrap().public_key_shares;
        for shard in shards.values() {
            assert_eq!(shard.public_key_shares, *public_key_shares);
            assert_eq!(
                shard.signing_key_share.group_public_key(),
                public_key_shares.group_public_key
            );
        }
        for (identity, shard) in &shards {
            let y_i = public_key_shares.shares[identity];
            assert_eq!(*y_i, shard.signing_key_share.public_share());
        }

        // Any `t` parties reconstruct the same key
        for subset in tschnorr_tests::subsets(n, t) {
            let shares = subset
                .iter()
                .map(|&j| {
                    let identity = cohort.participants().identity(j).unwrap();
                    let share = *shards[identity].signing_key_share.share().as_ref();
                    (j, share)
                })
                .collect::<Vec<_>>();
            let sk: Scalar<C::Curve> = sharing::interpolate(&shares).unwrap();
            assert_eq!(
                Point::generator() * sk,
                *public_key_shares.group_public_key,
                "subset {subset:?} reconstructed a different key"
            );
        }
    }

    #[test]
    fn rounds_out_of_order_are_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        let me = auth_keys[0].identity();

        let mut party = DkgParticipant::new(&cohort, &me, b"session").unwrap();
        assert_eq!(party.round(), Round::Round1);

        let err = party.round2(&BTreeMap::new()).unwrap_err();
        assert!(err.is_round_mismatch());
        let err = party
            .round3(&BTreeMap::new(), &BTreeMap::new())
            .unwrap_err();
        assert!(err.is_round_mismatch());

        // State is untouched
        assert_eq!(party.round(), Round::Round1);
        party.round1(&mut rng).unwrap();
        assert_eq!(party.round(), Round::Round2);

        let err = party.round1(&mut rng).unwrap_err();
        assert!(err.is_round_mismatch());
        assert_eq!(party.round(), Round::Round2);
    }

    #[test]
    fn empty_session_id_is_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();
        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        assert!(DkgParticipant::new(&cohort, &auth_keys[0].identity(), b"").is_err());
    }

    #[test]
    fn corrupted_share_names_its_sender<C: Ciphersuite>() {
        tschnorr_tests::init_tracing();
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        let ids = tschnorr_tests::identities(&auth_keys);

        let mut parties = ids
            .iter()
            .map(|id| (*id, DkgParticipant::new(&cohort, id, b"session").unwrap()))
            .collect::<BTreeMap<_, _>>();
        let round1 = parties
            .iter_mut()
            .map(|(id, party)| (*id, party.round1(&mut rng).unwrap()))
            .collect::<BTreeMap<_, _>>();

        let mut broadcasts = BTreeMap::new();
        let mut p2p = BTreeMap::<_, BTreeMap<_, _>>::new();
        for (id, party) in &mut parties {
            let (broadcast, msgs) = party.round2(&others(&round1, id)).unwrap();
            broadcasts.insert(*id, broadcast);
            for (recipient, msg) in msgs {
                p2p.entry(recipient).or_default().insert(*id, msg);
            }
        }

        // Party 3 sends a wrong share to party 1
        let victim = ids[0];
        let culprit = ids[2];
        let msg = p2p.get_mut(&victim).unwrap().get_mut(&culprit).unwrap();
        let mut tampered = *msg.share.as_ref() + Scalar::one();
        msg.share = tschnorr::generic_ec::SecretScalar::new(&mut tampered);

        let err = parties
            .get_mut(&victim)
            .unwrap()
            .round3(&others(&broadcasts, &victim), &p2p[&victim])
            .unwrap_err();
        assert_eq!(err.culprit(), Some(3));

        // Other honest party is unaffected
        parties
            .get_mut(&ids[1])
            .unwrap()
            .round3(&others(&broadcasts, &ids[1]), &p2p[&ids[1]])
            .unwrap();
    }

    #[test]
    fn commitments_replayed_from_another_session_are_rejected<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        let ids = tschnorr_tests::identities(&auth_keys);

        let mut round1 = ids
            .iter()
            .map(|id| {
                let mut party = DkgParticipant::new(&cohort, id, b"session B").unwrap();
                (*id, party.round1(&mut rng).unwrap())
            })
            .collect::<BTreeMap<_, _>>();

        // Party 2 replays its message from session A
        let mut old_party = DkgParticipant::new(&cohort, &ids[1], b"session A").unwrap();
        round1.insert(ids[1], old_party.round1(&mut rng).unwrap());

        let mut party = DkgParticipant::new(&cohort, &ids[0], b"session B").unwrap();
        party.round1(&mut rng).unwrap();
        let err = party.round2(&others(&round1, &ids[0])).unwrap_err();
        assert_eq!(err.culprit(), Some(2));
    }

    #[test]
    fn missing_message_names_the_party<C: Ciphersuite>() {
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        let ids = tschnorr_tests::identities(&auth_keys);

        let mut round1 = BTreeMap::new();
        let mut me = DkgParticipant::new(&cohort, &ids[0], b"session").unwrap();
        me.round1(&mut rng).unwrap();
        let mut other = DkgParticipant::new(&cohort, &ids[1], b"session").unwrap();
        round1.insert(ids[1], other.round1(&mut rng).unwrap());

        let err = me.round2(&round1).unwrap_err();
        assert_eq!(err.culprit(), Some(3));
        // Validation failure doesn't advance the state
        assert_eq!(me.round(), Round::Round2);
    }

    #[test]
    fn equivocation_is_detected_without_blaming_anyone<C: Ciphersuite>() {
        tschnorr_tests::init_tracing();
        let mut rng = rand_dev::DevRng::new();

        let auth_keys = tschnorr_tests::generate_auth_keys(&mut rng, 3);
        let cohort = tschnorr_tests::cohort::<C>(2, &auth_keys);
        let ids = tschnorr_tests::identities(&auth_keys);

        let mut parties = ids
            .iter()
            .map(|id| (*id, DkgParticipant::new(&cohort, id, b"session").unwrap()))
            .collect::<BTreeMap<_, _>>();
        let round1 = parties
            .iter_mut()
            .map(|(id, party)| (*id, party.round1(&mut rng).unwrap()))
            .collect::<BTreeMap<_, _>>();

        // Party 3 sends valid commitments to party 1, and other valid commitments to party 2
        let mut twin = DkgParticipant::new(&cohort, &ids[2], b"session").unwrap();
        let other_commitments = twin.round1(&mut rng).unwrap();
        let mut inboxes = ids
            .iter()
            .map(|id| (*id, others(&round1, id)))
            .collect::<BTreeMap<_, _>>();
        inboxes
            .get_mut(&ids[1])
            .unwrap()
            .insert(ids[2], other_commitments);

        let mut broadcasts = BTreeMap::new();
        let mut p2p = BTreeMap::<_, BTreeMap<_, _>>::new();
        for (id, party) in &mut parties {
            let (broadcast, msgs) = party.round2(&inboxes[id]).unwrap();
            broadcasts.insert(*id, broadcast);
            for (recipient, msg) in msgs {
                p2p.entry(recipient).or_default().insert(*id, msg);
            }
        }

        // Honest parties notice that they disagree, but neither of them is blamed
        for id in &ids[..2] {
            let err = parties
                .get_mut(id)
                .unwrap()
                .round3(&others(&broadcasts, id), &p2p[id])
                .unwrap_err();
            assert!(err.is_equivocation());
            assert_eq!(err.culprit(), None);
        }
    }

    #[instantiate_tests(<tschnorr::ciphersuite::Secp256k1>)]
    mod secp256k1 {}
    #[instantiate_tests(<tschnorr::ciphersuite::Ed25519>)]
    mod ed25519 {}
}
