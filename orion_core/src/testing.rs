//! Shared test doubles.

use crate::observer::{NodeSnapshot, StateObserver};
use async_trait::async_trait;
use orion_env::{NodeId, OrionContext, KEY_LEN};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use std::time::Duration;

/// One time unit per second of (usually paused) tokio time, fixed seeds.
pub struct TestContext;

#[async_trait]
impl OrionContext for TestContext {
    fn now(&self) -> Duration {
        Duration::ZERO
    }

    async fn sleep_units(&self, units: f64) {
        tokio::time::sleep(Duration::from_secs_f64(units)).await;
    }

    fn derive_rng(&self, stream_id: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(stream_id)
    }

    fn derive_key_material(&self, seed_extension: u64) -> [u8; KEY_LEN] {
        [seed_extension as u8; KEY_LEN]
    }

    fn seed(&self) -> u64 {
        0
    }
}

/// Keeps every observation, in order.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<(NodeId, NodeSnapshot)>>,
}

impl RecordingObserver {
    pub fn last_for(&self, node: NodeId) -> Option<NodeSnapshot> {
        let events = self.events.lock().unwrap();
        events.iter().rev().find(|(id, _)| *id == node).map(|(_, s)| s.clone())
    }

    pub fn count_for(&self, node: NodeId) -> usize {
        self.events.lock().unwrap().iter().filter(|(id, _)| *id == node).count()
    }
}

impl StateObserver for RecordingObserver {
    fn observe(&self, node: NodeId, snapshot: NodeSnapshot) {
        assert_eq!(node.kind(), snapshot.kind(), "snapshot kind must match node kind");
        self.events.lock().unwrap().push((node, snapshot));
    }
}
