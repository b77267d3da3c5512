use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EngineError, Result};
use crate::rng::{self, ProvablyFairRng};

/// Bytes consumed from the keyed stream per selection, big-endian.
const BYTES_PER_PICK: usize = 4;

/// Largest grid the derivation supports; positions must fit in a `u8`.
const MAX_GRID_SIZE: usize = 256;

/// Deterministically map the keyed byte stream to `mine_count` distinct
/// positions in `[0, grid_size)`, sorted ascending.
///
/// Selection is without replacement: each 4-byte read is reduced modulo the
/// count of *remaining* candidates, never the full range, so no positional
/// bias is introduced as the pool shrinks. When the 32-byte digest runs out
/// the stream is re-keyed with the current selection index appended to the
/// message, so derivation never stalls for any `mine_count`.
pub fn derive_mine_positions(
    rng: &ProvablyFairRng,
    mine_count: usize,
    grid_size: usize,
) -> Result<Vec<u8>> {
    if grid_size < 2 || grid_size > MAX_GRID_SIZE {
        return Err(EngineError::InvalidGridSize(grid_size));
    }
    if mine_count == 0 || mine_count >= grid_size {
        return Err(EngineError::InvalidMineCount {
            count: mine_count,
            grid_size,
        });
    }

    let mut buffer = rng.hmac_bytes();
    let mut cursor = 0usize;
    let mut candidates: Vec<u8> = (0..grid_size).map(|p| p as u8).collect();
    let mut chosen: Vec<u8> = Vec::with_capacity(mine_count);

    for selection in 0..mine_count {
        if cursor >= buffer.len() {
            buffer = rng.hmac_bytes_extended(selection);
            cursor = 0;
        }
        let take = BYTES_PER_PICK.min(buffer.len() - cursor);
        let mut value = 0u64;
        for &byte in &buffer[cursor..cursor + take] {
            value = (value << 8) | u64::from(byte);
        }
        cursor += take;

        let index = (value % candidates.len() as u64) as usize;
        chosen.push(candidates.remove(index));
    }

    chosen.sort_unstable();
    Ok(chosen)
}

/// Everything produced at game start. The caller persists `server_seed`
/// privately and discloses only `server_seed_hash` and `client_seed` until
/// the game ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSetup {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub mine_positions: Vec<u8>,
}

/// Build the commitment and derive the outcome for a new game.
///
/// A missing or empty client seed falls back to a generated one; the server
/// seed always comes from the CSPRNG and is never reused across games.
pub fn create_game(
    client_seed: Option<String>,
    mine_count: usize,
    grid_size: usize,
) -> Result<GameSetup> {
    let server_seed = rng::generate_server_seed()?;
    let client_seed = match client_seed {
        Some(seed) if !seed.is_empty() => seed,
        _ => rng::generate_client_seed()?,
    };
    let fair = ProvablyFairRng::new(server_seed, client_seed, 0);
    let mine_positions = derive_mine_positions(&fair, mine_count, grid_size)?;
    Ok(GameSetup {
        server_seed_hash: fair.server_seed_hash_hex(),
        server_seed: fair.server_seed,
        client_seed: fair.client_seed,
        nonce: fair.nonce,
        mine_positions,
    })
}

/// Result of a post-game verification.
///
/// `Mismatch` is a normal negative outcome; `Unverifiable` means the inputs
/// themselves could not be recomputed (malformed seed, mine count out of
/// range) and carries the underlying error. Callers rendering this for a
/// public API map both non-`Valid` cases to `is_valid = false`, but only
/// `Mismatch` still carries recomputed positions and a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid {
        positions: Vec<u8>,
        verification_hash: String,
    },
    Mismatch {
        expected: Vec<u8>,
        verification_hash: String,
    },
    Unverifiable(EngineError),
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid { .. })
    }
}

/// Recompute the outcome for a finished game and compare it against the
/// positions the server claims were used. Never panics or errors on
/// attacker-supplied input.
pub fn verify_game(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    claimed_positions: &[u8],
    grid_size: usize,
) -> VerifyOutcome {
    match recompute(server_seed, client_seed, nonce, claimed_positions, grid_size) {
        Ok(outcome) => outcome,
        Err(err) => VerifyOutcome::Unverifiable(err),
    }
}

fn recompute(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    claimed_positions: &[u8],
    grid_size: usize,
) -> Result<VerifyOutcome> {
    rng::validate_server_seed(server_seed)?;
    rng::validate_client_seed(client_seed)?;
    for &position in claimed_positions {
        if usize::from(position) >= grid_size {
            return Err(EngineError::PositionOutOfRange(position));
        }
    }

    let fair = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let expected = derive_mine_positions(&fair, claimed_positions.len(), grid_size)?;
    let hash = verification_hash(server_seed, client_seed, nonce, &expected);

    let mut claimed = claimed_positions.to_vec();
    claimed.sort_unstable();
    if claimed == expected {
        Ok(VerifyOutcome::Valid {
            positions: expected,
            verification_hash: hash,
        })
    } else {
        Ok(VerifyOutcome::Mismatch {
            expected,
            verification_hash: hash,
        })
    }
}

/// SHA-256 over the canonical verification tuple.
///
/// The payload is compact JSON with lexicographically sorted keys, so any
/// two verifiers computing over the same inputs obtain a byte-identical
/// hash regardless of field order on the wire.
pub fn verification_hash(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    positions: &[u8],
) -> String {
    let payload = json!({
        "client_seed": client_seed,
        "mine_positions": positions,
        "nonce": nonce,
        "server_seed": server_seed,
    });
    rng::derive_hash_hex(payload.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fair(server: &str, client: &str, nonce: u64) -> ProvablyFairRng {
        ProvablyFairRng::new(server, client, nonce)
    }

    #[test]
    fn test_derivation_shape() {
        for mine_count in 1..25 {
            let positions =
                derive_mine_positions(&fair(&"ab".repeat(32), "shape", 3), mine_count, 25).unwrap();
            assert_eq!(positions.len(), mine_count);
            assert!(positions.iter().all(|&p| p < 25));
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "sorted, no duplicates");
        }
    }

    #[test]
    fn test_mine_count_bounds() {
        let rng = fair(&"cd".repeat(32), "bounds", 0);
        assert_eq!(
            derive_mine_positions(&rng, 0, 25),
            Err(EngineError::InvalidMineCount { count: 0, grid_size: 25 })
        );
        assert_eq!(
            derive_mine_positions(&rng, 25, 25),
            Err(EngineError::InvalidMineCount { count: 25, grid_size: 25 })
        );
        assert!(derive_mine_positions(&rng, 24, 25).is_ok());
    }

    #[test]
    fn test_grid_size_bounds() {
        let rng = fair(&"ef".repeat(32), "grid", 0);
        assert_eq!(derive_mine_positions(&rng, 1, 1), Err(EngineError::InvalidGridSize(1)));
        assert_eq!(derive_mine_positions(&rng, 1, 257), Err(EngineError::InvalidGridSize(257)));
        let positions = derive_mine_positions(&rng, 9, 10).unwrap();
        assert_eq!(positions.len(), 9);
        assert!(positions.iter().all(|&p| p < 10));
    }

    #[test]
    fn test_avalanche_on_any_input_change() {
        let zeros = "0".repeat(64);
        let base = derive_mine_positions(&fair(&zeros, "abc", 0), 3, 25).unwrap();
        assert_eq!(base, vec![3, 13, 19]);

        let flipped_seed = format!("{}1", "0".repeat(63));
        assert_eq!(
            derive_mine_positions(&fair(&flipped_seed, "abc", 0), 3, 25).unwrap(),
            vec![3, 17, 22]
        );
        assert_eq!(
            derive_mine_positions(&fair(&zeros, "abd", 0), 3, 25).unwrap(),
            vec![7, 14, 21]
        );
        assert_eq!(
            derive_mine_positions(&fair(&zeros, "abc", 1), 3, 25).unwrap(),
            vec![2, 4, 20]
        );
    }

    #[test]
    fn test_create_game_commitment() {
        let setup = create_game(Some("player".into()), 5, 25).unwrap();
        assert_eq!(setup.client_seed, "player");
        assert_eq!(setup.nonce, 0);
        assert_eq!(setup.mine_positions.len(), 5);
        assert_eq!(
            setup.server_seed_hash,
            rng::derive_hash_hex(setup.server_seed.as_bytes())
        );

        // same commitment inputs must reproduce the same outcome
        let replay = derive_mine_positions(
            &fair(&setup.server_seed, &setup.client_seed, setup.nonce),
            5,
            25,
        )
        .unwrap();
        assert_eq!(replay, setup.mine_positions);
    }

    #[test]
    fn test_create_game_defaults_client_seed() {
        let setup = create_game(None, 3, 25).unwrap();
        assert_eq!(setup.client_seed.len(), 32);
        let empty = create_game(Some(String::new()), 3, 25).unwrap();
        assert_eq!(empty.client_seed.len(), 32);
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let zeros = "0".repeat(64);
        let honest = vec![3u8, 13, 19];
        assert!(verify_game(&zeros, "abc", 0, &honest, 25).is_valid());

        let mut tampered = honest.clone();
        tampered[1] = 12;
        match verify_game(&zeros, "abc", 0, &tampered, 25) {
            VerifyOutcome::Mismatch { expected, .. } => assert_eq!(expected, honest),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_order_independent() {
        let zeros = "0".repeat(64);
        assert!(verify_game(&zeros, "abc", 0, &[19, 3, 13], 25).is_valid());
    }

    #[test]
    fn test_verify_unverifiable_inputs() {
        let zeros = "0".repeat(64);
        // malformed seed, empty client seed, empty claim, out-of-grid position:
        // all degrade to Unverifiable, never a panic or a silent "valid"
        assert!(matches!(
            verify_game("not-hex", "abc", 0, &[1, 2, 3], 25),
            VerifyOutcome::Unverifiable(EngineError::MalformedServerSeed { .. })
        ));
        assert!(matches!(
            verify_game(&zeros, "", 0, &[1, 2, 3], 25),
            VerifyOutcome::Unverifiable(EngineError::EmptyClientSeed)
        ));
        assert!(matches!(
            verify_game(&zeros, "abc", 0, &[], 25),
            VerifyOutcome::Unverifiable(EngineError::InvalidMineCount { .. })
        ));
        assert!(matches!(
            verify_game(&zeros, "abc", 0, &[25], 25),
            VerifyOutcome::Unverifiable(EngineError::PositionOutOfRange(25))
        ));
    }

    #[test]
    fn test_verification_hash_canonical() {
        let zeros = "0".repeat(64);
        let hash = verification_hash(&zeros, "abc", 0, &[3, 13, 19]);
        assert_eq!(
            hash,
            "1657a88dd9e3c46fcb6478d00bc0d1e5e173245e3acc2f89f2251595e75ed3fa"
        );
        assert_eq!(hash, verification_hash(&zeros, "abc", 0, &[3, 13, 19]));
        assert_ne!(hash, verification_hash(&zeros, "abc", 1, &[3, 13, 19]));
    }
}
