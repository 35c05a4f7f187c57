//! Topology builder: the fixed graph every run starts from.
//!
//! ```text
//!   Submitter1 ──► Holder1 ──┐
//!   Submitter2 ──► Holder2 ──┼──► Aggregator ──► Sink
//!   SubmitterN ──► HolderN ──┘         │
//!                     ▲                │
//!                     └── debit / set ─┘
//! ```

use crate::crypto::IntentKey;
use crate::error::{SimError, SimResult};
use crate::message::Mailboxes;
use orion_env::{NodeId, OrionContext};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// RNG stream reserved for initial balances.
pub const TOPOLOGY_RNG_STREAM: u64 = u64::MAX;

/// Shape of the graph and its starting capital.
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Number of submitter/holder chains (default: 3)
    pub num_holders: u32,

    /// Sum of all initial holder balances (default: 100)
    pub total_capital: f64,

    /// Lower bound of the raw, pre-normalization balance draw
    pub raw_balance_min: f64,

    /// Upper bound of the raw, pre-normalization balance draw
    pub raw_balance_max: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_holders: 3,
            total_capital: 100.0,
            raw_balance_min: 10_000.0,
            raw_balance_max: 1_000_000.0,
        }
    }
}

/// One Submitter → Holder chain.
#[derive(Debug, Clone)]
pub struct Chain {
    pub submitter: NodeId,
    pub holder: NodeId,

    /// Shared by the submitter and the aggregator
    pub key: IntentKey,

    pub initial_balance: f64,
}

/// A fully wired graph, ready to be handed to a driver.
#[derive(Debug, Clone)]
pub struct Topology {
    chains: Vec<Chain>,
}

impl Topology {
    /// Builds N chains with normalized balances and context-derived keys.
    ///
    /// # Arguments
    /// * `config` - Graph size and capital
    /// * `ctx` - Source of randomness and key material
    ///
    /// # Returns
    /// The topology, or `SimError::Config` for an empty or ill-formed config.
    pub fn build<Ctx: OrionContext + ?Sized>(config: &TopologyConfig, ctx: &Ctx) -> SimResult<Self> {
        if config.num_holders == 0 {
            return Err(SimError::Config("at least one holder is required".to_string()));
        }
        if !(config.total_capital.is_finite() && config.total_capital >= 0.0) {
            return Err(SimError::Config(format!(
                "total capital must be a non-negative number, got {}",
                config.total_capital
            )));
        }
        if !(config.raw_balance_min > 0.0 && config.raw_balance_max > config.raw_balance_min) {
            return Err(SimError::Config(format!(
                "raw balance range [{}, {}) is empty",
                config.raw_balance_min, config.raw_balance_max
            )));
        }

        let mut rng = ctx.derive_rng(TOPOLOGY_RNG_STREAM);
        let raw: Vec<f64> = (0..config.num_holders)
            .map(|_| rng.gen_range(config.raw_balance_min..config.raw_balance_max))
            .collect();
        let raw_total: f64 = raw.iter().sum();

        let chains: Vec<Chain> = (1..=config.num_holders)
            .zip(raw)
            .map(|(i, balance)| Chain {
                submitter: NodeId::Submitter(i),
                holder: NodeId::Holder(i),
                key: IntentKey::from_bytes(ctx.derive_key_material(u64::from(i))),
                initial_balance: balance / raw_total * config.total_capital,
            })
            .collect();

        info!(
            "Built topology with {} chains and {:.2} total capital (seed {})",
            chains.len(),
            config.total_capital,
            ctx.seed()
        );

        Ok(Self { chains })
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn num_holders(&self) -> usize {
        self.chains.len()
    }

    /// Every node in the graph: submitters, holders, then aggregator and sink.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.chains.iter().map(|c| c.submitter).collect();
        nodes.extend(self.chains.iter().map(|c| c.holder));
        nodes.push(NodeId::Aggregator);
        nodes.push(NodeId::Sink);
        nodes
    }

    /// Directed message edges.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::with_capacity(self.chains.len() * 3 + 1);
        for chain in &self.chains {
            edges.push((chain.submitter, chain.holder));
            edges.push((chain.holder, NodeId::Aggregator));
            edges.push((NodeId::Aggregator, chain.holder));
        }
        edges.push((NodeId::Aggregator, NodeId::Sink));
        edges
    }

    /// The aggregator's holder → key table.
    pub fn aggregator_keys(&self) -> BTreeMap<NodeId, IntentKey> {
        self.chains.iter().map(|c| (c.holder, c.key.clone())).collect()
    }

    pub fn total_capital(&self) -> f64 {
        self.chains.iter().map(|c| c.initial_balance).sum()
    }

    /// A fresh registry with one mailbox per node.
    pub fn mailboxes(&self) -> Mailboxes {
        Mailboxes::new(self.nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn build(n: u32) -> Topology {
        let config = TopologyConfig {
            num_holders: n,
            ..Default::default()
        };
        Topology::build(&config, &TestContext).unwrap()
    }

    #[test]
    fn test_balances_sum_to_total() {
        for n in [1, 3, 10] {
            let topology = build(n);
            assert_relative_eq!(topology.total_capital(), 100.0, epsilon = 1e-9);
            assert!(topology.chains().iter().all(|c| c.initial_balance > 0.0));
        }
    }

    #[test]
    fn test_single_holder_gets_everything() {
        let topology = build(1);
        assert_relative_eq!(topology.chains()[0].initial_balance, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_keys_pairwise_distinct() {
        let topology = build(5);
        let keys: HashSet<[u8; 32]> = topology.chains().iter().map(|c| *c.key.as_bytes()).collect();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_chains_pair_by_index() {
        let topology = build(3);
        for (i, chain) in topology.chains().iter().enumerate() {
            let idx = i as u32 + 1;
            assert_eq!(chain.submitter, NodeId::Submitter(idx));
            assert_eq!(chain.holder, NodeId::Holder(idx));
            assert_eq!(chain.submitter.paired_holder(), Some(chain.holder));
        }
    }

    #[test]
    fn test_edges_and_nodes() {
        let topology = build(3);
        let edges = topology.edges();

        assert_eq!(edges.len(), 10);
        assert!(edges.contains(&(NodeId::Submitter(2), NodeId::Holder(2))));
        assert!(edges.contains(&(NodeId::Holder(2), NodeId::Aggregator)));
        assert!(edges.contains(&(NodeId::Aggregator, NodeId::Holder(2))));
        assert!(edges.contains(&(NodeId::Aggregator, NodeId::Sink)));
        assert!(!edges.contains(&(NodeId::Submitter(1), NodeId::Holder(2))));

        assert_eq!(topology.nodes().len(), 8);
        assert_eq!(topology.mailboxes().len(), 8);
    }

    #[test]
    fn test_aggregator_keys_match_chains() {
        let topology = build(2);
        let keys = topology.aggregator_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[&NodeId::Holder(2)].as_bytes(),
            topology.chains()[1].key.as_bytes()
        );
    }

    #[test]
    fn test_zero_holders_rejected() {
        let config = TopologyConfig {
            num_holders: 0,
            ..Default::default()
        };
        assert!(matches!(Topology::build(&config, &TestContext), Err(SimError::Config(_))));
    }

    #[test]
    fn test_same_context_same_topology() {
        let a = build(4);
        let b = build(4);
        for (x, y) in a.chains().iter().zip(b.chains()) {
            assert_eq!(x.initial_balance, y.initial_balance);
            assert_eq!(x.key.as_bytes(), y.key.as_bytes());
        }
    }
}
