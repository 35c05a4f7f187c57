//! Portfolio intents: per-asset weights authored by a submitter.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Identifier of an asset in the universe (a ticker).
pub type AssetId = String;

/// Default asset universe.
pub const DEFAULT_UNIVERSE: [&str; 8] = ["AAVE", "CRV", "DAI", "LINK", "UNI", "USDC", "WBTC", "WETH"];

/// Maximum distance of the weight sum from 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Returns [`DEFAULT_UNIVERSE`] as owned asset ids.
pub fn default_universe() -> Vec<AssetId> {
    DEFAULT_UNIVERSE.iter().map(|a| a.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntentError {
    #[error("intent has no assets")]
    Empty,

    #[error("weight {weight} for {asset} is negative or not finite")]
    InvalidWeight { asset: AssetId, weight: f64 },

    #[error("weights sum to {0}, expected 1")]
    NotNormalized(f64),
}

/// Desired allocation weights, non-negative and summing to 1.
///
/// Backed by an ordered map so the JSON encoding is deterministic.
/// Deserialization re-validates, so a decrypted payload that parses as a map
/// but breaks the weight rules is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<AssetId, f64>", into = "BTreeMap<AssetId, f64>")]
pub struct Intent {
    weights: BTreeMap<AssetId, f64>,
}

impl Intent {
    /// Validates and wraps a weight map.
    pub fn new(weights: BTreeMap<AssetId, f64>) -> Result<Self, IntentError> {
        if weights.is_empty() {
            return Err(IntentError::Empty);
        }

        for (asset, &weight) in &weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(IntentError::InvalidWeight {
                    asset: asset.clone(),
                    weight,
                });
            }
        }

        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(IntentError::NotNormalized(total));
        }

        Ok(Self { weights })
    }

    /// Draws a random intent over a non-empty subset of `universe`.
    ///
    /// The subset size is uniform in `1..=universe.len()`; each chosen asset
    /// gets an independent uniform draw, then the draws are normalized.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, universe: &[AssetId]) -> Result<Self, IntentError> {
        if universe.is_empty() {
            return Err(IntentError::Empty);
        }

        let n_assets = rng.gen_range(1..=universe.len());
        let chosen: Vec<&AssetId> = universe.choose_multiple(&mut *rng, n_assets).collect();

        // (0, 1] so the sum is never zero
        let draws: Vec<f64> = chosen.iter().map(|_| 1.0 - rng.gen::<f64>()).collect();
        let total: f64 = draws.iter().sum();

        let weights = chosen
            .into_iter()
            .zip(draws)
            .map(|(asset, w)| (asset.clone(), w / total))
            .collect();

        Self::new(weights)
    }

    /// Returns the weight map.
    pub fn weights(&self) -> &BTreeMap<AssetId, f64> {
        &self.weights
    }

    /// Number of assets in the intent.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always false for a validated intent.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Scales every weight by `amount`, giving a per-asset allocation.
    pub fn allocate(&self, amount: f64) -> BTreeMap<AssetId, f64> {
        self.weights
            .iter()
            .map(|(asset, w)| (asset.clone(), w * amount))
            .collect()
    }
}

impl TryFrom<BTreeMap<AssetId, f64>> for Intent {
    type Error = IntentError;

    fn try_from(weights: BTreeMap<AssetId, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<Intent> for BTreeMap<AssetId, f64> {
    fn from(intent: Intent) -> Self {
        intent.weights
    }
}
