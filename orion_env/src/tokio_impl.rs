//! Production implementation of OrionContext using Tokio.

use crate::context::{units_to_duration, OrionContext, KEY_LEN};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by Tokio and OS entropy.
///
/// One time unit is one wall-clock second. Randomness and key material come
/// from `OsRng`, so two runs never repeat.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrionContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep_units(&self, units: f64) {
        match units_to_duration(units, 1.0) {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    }

    fn derive_rng(&self, _stream_id: u64) -> ChaCha8Rng {
        ChaCha8Rng::from_entropy()
    }

    fn derive_key_material(&self, _seed_extension: u64) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
