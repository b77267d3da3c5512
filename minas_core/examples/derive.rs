use minas_core::{verify_game, MultiplierParams, GRID_SIZE};

fn main() {
    // Example end-to-end game: commit, derive, verify
    let setup = minas_core::create_game(Some("example-client-seed".into()), 3, GRID_SIZE)
        .expect("entropy available");
    println!("server_seed_hash={}", setup.server_seed_hash);
    println!("client_seed={} nonce={}", setup.client_seed, setup.nonce);
    println!("mine_positions={:?}", setup.mine_positions);

    let params = MultiplierParams::default();
    for revealed in [1usize, 3, 5, 10] {
        println!("multiplier after {revealed} reveals: {}", params.multiplier(3, revealed));
    }

    let outcome = verify_game(
        &setup.server_seed,
        &setup.client_seed,
        setup.nonce,
        &setup.mine_positions,
        GRID_SIZE,
    );
    println!("verification valid={}", outcome.is_valid());
}
