use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{EngineError, Result};

// Deterministic RNG using provably-fair HMAC construction
// server_seed (secret) + client_seed + nonce -> HMAC-SHA256 -> byte stream

pub type HmacSha256 = Hmac<Sha256>;

/// Raw length of a server seed before hex encoding.
pub const SERVER_SEED_BYTES: usize = 32;
/// Raw length of a default client seed before hex encoding.
pub const CLIENT_SEED_BYTES: usize = 16;

pub fn derive_hash_hex(input: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Generate a fresh server seed from the OS CSPRNG (64 hex chars).
///
/// Entropy failure is a hard error: proceeding with weak randomness would
/// break the unpredictability guarantee, so the caller must abort or retry.
pub fn generate_server_seed() -> Result<String> {
    let mut buf = [0u8; SERVER_SEED_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| EngineError::EntropyUnavailable(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Generate a default client seed (32 hex chars) when the player supplies none.
pub fn generate_client_seed() -> Result<String> {
    let mut buf = [0u8; CLIENT_SEED_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| EngineError::EntropyUnavailable(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Server seeds on the wire are exactly 64 hex chars.
pub fn validate_server_seed(seed: &str) -> Result<()> {
    let expected = SERVER_SEED_BYTES * 2;
    if seed.len() != expected || !seed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EngineError::MalformedServerSeed { expected });
    }
    Ok(())
}

pub fn validate_client_seed(seed: &str) -> Result<()> {
    if seed.is_empty() {
        return Err(EngineError::EmptyClientSeed);
    }
    Ok(())
}

pub struct ProvablyFairRng {
    pub server_seed: String, // secret until the game ends
    pub client_seed: String,
    pub nonce: u64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    /// SHA-256 pre-commitment over the server seed, disclosed at game start.
    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    /// Primary keyed digest over `"<client_seed>:<nonce>"`.
    pub fn hmac_bytes(&self) -> [u8; 32] {
        self.keyed_digest(format!("{}:{}", self.client_seed, self.nonce))
    }

    /// Continuation digest over `"<client_seed>:<nonce>:<selection>"`, used
    /// when the primary stream is exhausted mid-derivation.
    pub fn hmac_bytes_extended(&self, selection: usize) -> [u8; 32] {
        self.keyed_digest(format!("{}:{}:{}", self.client_seed, self.nonce, selection))
    }

    fn keyed_digest(&self, message: String) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes()).expect("HMAC key");
        mac.update(message.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let rng1 = ProvablyFairRng::new("server", "client", 1);
        let rng2 = ProvablyFairRng::new("server", "client", 1);
        assert_eq!(rng1.server_seed_hash_hex(), rng2.server_seed_hash_hex());
        assert_eq!(rng1.hmac_bytes(), rng2.hmac_bytes());
        assert_eq!(rng1.hmac_bytes_extended(8), rng2.hmac_bytes_extended(8));
    }

    #[test]
    fn test_extended_stream_differs_from_primary() {
        let rng = ProvablyFairRng::new("server", "client", 1);
        assert_ne!(rng.hmac_bytes(), rng.hmac_bytes_extended(0));
        assert_ne!(rng.hmac_bytes_extended(0), rng.hmac_bytes_extended(1));
    }

    #[test]
    fn test_generated_seed_shapes() {
        let server = generate_server_seed().unwrap();
        let client = generate_client_seed().unwrap();
        assert_eq!(server.len(), 64);
        assert_eq!(client.len(), 32);
        assert!(server.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(client.bytes().all(|b| b.is_ascii_hexdigit()));
        // one-in-2^256 collision, i.e. never
        assert_ne!(generate_server_seed().unwrap(), server);
    }

    #[test]
    fn test_commit_stability() {
        let seed = "0".repeat(64);
        assert_eq!(derive_hash_hex(seed.as_bytes()), derive_hash_hex(seed.as_bytes()));
        assert_eq!(
            derive_hash_hex(seed.as_bytes()),
            "60e05bd1b195af2f94112fa7197a5c88289058840ce7c6df9693756bc6250f55"
        );
        assert_ne!(
            derive_hash_hex(seed.as_bytes()),
            derive_hash_hex("1".repeat(64).as_bytes())
        );
    }

    #[test]
    fn test_seed_validation() {
        assert!(validate_server_seed(&"a".repeat(64)).is_ok());
        assert!(validate_server_seed(&"a".repeat(63)).is_err());
        assert!(validate_server_seed(&"g".repeat(64)).is_err());
        assert!(validate_client_seed("abc").is_ok());
        assert_eq!(validate_client_seed(""), Err(EngineError::EmptyClientSeed));
    }
}
