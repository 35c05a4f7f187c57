//! Deterministic key provider for simulation.

use orion_core::IntentKey;
use orion_env::KEY_LEN;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Provides deterministic AES-256 intent keys derived from a master seed.
///
/// Keys are:
/// - Deterministic: same seed and chain index always give the same key
/// - Unique: each chain gets a different key
/// - Isolated: changing the holder count leaves existing keys alone
#[derive(Debug, Clone, Copy)]
pub struct DeterministicKeyProvider {
    master_seed: u64,
}

impl DeterministicKeyProvider {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Raw key bytes for one chain.
    ///
    /// The per-chain seed is `master_seed * φ + chain * prime`.
    pub fn key_material(&self, chain: u64) -> [u8; KEY_LEN] {
        let chain_seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
            .wrapping_add(chain.wrapping_mul(0x517cc1b727220a95));

        let mut rng = ChaCha8Rng::seed_from_u64(chain_seed);
        let mut bytes = [0u8; KEY_LEN];
        rng.fill_bytes(&mut bytes);
        bytes
    }

    /// The intent key shared by `Submitter{chain}` and the aggregator.
    pub fn intent_key(&self, chain: u64) -> IntentKey {
        IntentKey::from_bytes(self.key_material(chain))
    }

    /// Keys for chains `1..=n`.
    pub fn generate_keys(&self, n: u64) -> Vec<IntentKey> {
        (1..=n).map(|chain| self.intent_key(chain)).collect()
    }
}
