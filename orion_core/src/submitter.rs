//! Submitter node: periodically authors an encrypted intent for its holder.
//!
//! `Idle → Generate → Send → Idle`, forever.

use crate::crypto::{encrypt, IntentKey};
use crate::error::{SimError, SimResult};
use crate::intent::{default_universe, AssetId, Intent};
use crate::message::{Mailboxes, Message};
use crate::observer::{NodeSnapshot, StateObserver};
use orion_env::{NodeId, OrionContext, MAX_TIME_UNITS};
use rand::Rng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration shared by all submitters.
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Lower bound of the think time, in time units (default: 5)
    pub think_time_min: f64,

    /// Upper bound of the think time, in time units (default: 6)
    pub think_time_max: f64,

    /// Assets an intent may draw from
    pub universe: Vec<AssetId>,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            think_time_min: 5.0,
            think_time_max: 6.0,
            universe: default_universe(),
        }
    }
}

pub struct SubmitterNode {
    id: NodeId,
    holder: NodeId,
    key: IntentKey,
    config: SubmitterConfig,
}

impl SubmitterNode {
    /// Creates a submitter; `id` must be a `NodeId::Submitter`.
    pub fn new(id: NodeId, key: IntentKey, config: SubmitterConfig) -> SimResult<Self> {
        let holder = id
            .paired_holder()
            .ok_or_else(|| SimError::Config(format!("{} is not a submitter", id)))?;
        if config.universe.is_empty() {
            return Err(SimError::Config("asset universe is empty".to_string()));
        }
        let (lo, hi) = (config.think_time_min, config.think_time_max);
        if !(lo >= 0.0 && hi >= lo && hi <= MAX_TIME_UNITS) {
            return Err(SimError::Config(format!(
                "think time range [{}, {}] must lie within [0, {}]",
                lo, hi, MAX_TIME_UNITS
            )));
        }

        Ok(Self {
            id,
            holder,
            key,
            config,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn holder(&self) -> NodeId {
        self.holder
    }

    /// Draws the next think time in time units.
    pub fn think_time<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (lo, hi) = (self.config.think_time_min, self.config.think_time_max);
        if hi > lo {
            rng.gen_range(lo..hi)
        } else {
            lo
        }
    }

    /// Generates a random intent and seals it under this submitter's key.
    pub fn compose<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<(Intent, Vec<u8>)> {
        let intent = Intent::random(rng, &self.config.universe)
            .map_err(|e| SimError::Config(e.to_string()))?;
        let ciphertext = encrypt(&self.key, &intent)?;
        Ok((intent, ciphertext))
    }

    pub async fn run<Ctx: OrionContext>(
        self,
        ctx: Arc<Ctx>,
        mailboxes: Mailboxes,
        observer: Arc<dyn StateObserver>,
        shutdown: CancellationToken,
    ) -> SimResult<()> {
        let stream = self.id.chain_index().map(u64::from).unwrap_or_default();
        let mut rng = ctx.derive_rng(stream);

        loop {
            let delay = self.think_time(&mut rng);
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = ctx.sleep_units(delay) => {}
            }

            let (intent, ciphertext) = self.compose(&mut rng)?;
            debug!("[{}] Composed intent over {} assets", self.id, intent.len());

            mailboxes.send(
                self.holder,
                self.id,
                Message::IntentSubmitted {
                    ciphertext: ciphertext.clone(),
                },
            )?;
            info!("[{}] Sent encrypted intent to {}", self.id, self.holder);

            observer.observe(self.id, NodeSnapshot::Submitter { ciphertext });
        }
    }
}
