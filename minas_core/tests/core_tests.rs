use minas_core::{
    derive_mine_positions, verify_game, GameSetup, MultiplierParams, ProvablyFairRng,
    VerifyOutcome, GRID_SIZE,
};

#[test]
fn derivation_repeatable() {
    let rng1 = ProvablyFairRng::new("s".repeat(64), "c", 42);
    let rng2 = ProvablyFairRng::new("s".repeat(64), "c", 42);
    assert_eq!(
        derive_mine_positions(&rng1, 10, GRID_SIZE).unwrap(),
        derive_mine_positions(&rng2, 10, GRID_SIZE).unwrap()
    );
}

#[test]
fn golden_fixture() {
    // Shared reference tuple: any conforming implementation must reproduce
    // these exact positions.
    let rng = ProvablyFairRng::new("0".repeat(64), "abc", 0);
    assert_eq!(derive_mine_positions(&rng, 3, 25).unwrap(), vec![3, 13, 19]);
    assert_eq!(
        derive_mine_positions(&rng, 10, 25).unwrap(),
        vec![3, 4, 8, 13, 14, 16, 19, 21, 22, 23]
    );
    assert_eq!(
        derive_mine_positions(&ProvablyFairRng::new("a3f1c2e4".repeat(8), "player-seed", 7), 5, 25)
            .unwrap(),
        vec![7, 8, 11, 19, 21]
    );
}

#[test]
fn full_board_minus_one() {
    // 24 selections exhaust the 32-byte stream three times over; the
    // re-keyed continuation must still cover every position but one.
    let rng = ProvablyFairRng::new("0".repeat(64), "abc", 0);
    let positions = derive_mine_positions(&rng, 24, 25).unwrap();
    assert_eq!(positions, (0u8..24).collect::<Vec<_>>());
}

#[test]
fn verify_round_trip_through_setup() {
    let setup: GameSetup = minas_core::create_game(Some("round-trip".into()), 7, GRID_SIZE).unwrap();
    let outcome = verify_game(
        &setup.server_seed,
        &setup.client_seed,
        setup.nonce,
        &setup.mine_positions,
        GRID_SIZE,
    );
    match outcome {
        VerifyOutcome::Valid { positions, verification_hash } => {
            assert_eq!(positions, setup.mine_positions);
            assert_eq!(verification_hash.len(), 64);
        }
        other => panic!("expected valid verification, got {other:?}"),
    }
}

#[test]
fn verify_detects_single_altered_position() {
    let setup = minas_core::create_game(None, 5, GRID_SIZE).unwrap();
    for index in 0..setup.mine_positions.len() {
        let mut forged = setup.mine_positions.clone();
        forged[index] = (forged[index] + 1) % GRID_SIZE as u8;
        if forged == setup.mine_positions {
            continue;
        }
        let outcome = verify_game(
            &setup.server_seed,
            &setup.client_seed,
            setup.nonce,
            &forged,
            GRID_SIZE,
        );
        assert!(!outcome.is_valid(), "forged position {index} slipped through");
    }
}

#[test]
fn selection_uniformity() {
    // Spec-level statistical check: with one mine, every position must be
    // hit close to 1/25 of the time over a large derivation sweep.
    let trials = 100_000u64;
    let rng_seed = "5a".repeat(32);
    let mut counts = [0u32; GRID_SIZE];
    for nonce in 0..trials {
        let rng = ProvablyFairRng::new(rng_seed.clone(), "uniformity", nonce);
        let position = derive_mine_positions(&rng, 1, GRID_SIZE).unwrap()[0];
        counts[usize::from(position)] += 1;
    }
    let expected = trials as f64 / GRID_SIZE as f64;
    for (position, &count) in counts.iter().enumerate() {
        let deviation = (f64::from(count) - expected).abs() / expected;
        assert!(
            deviation < 0.10,
            "position {position} hit {count} times, {deviation:.3} off uniform"
        );
    }
}

#[test]
fn multiplier_simulation_smoke() {
    // The payout curve must stay finite and sane across the whole sweep.
    let params = MultiplierParams::default();
    for mine_count in 1..GRID_SIZE {
        for revealed in 0..=(GRID_SIZE - mine_count) {
            let multiplier = params.multiplier(mine_count, revealed);
            assert!(multiplier.is_finite());
            assert!(multiplier >= 0.9, "mines={mine_count} revealed={revealed}");
        }
    }
}
