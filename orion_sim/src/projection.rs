//! Presentation-side projection of node state.
//!
//! [`StateProjection`] is the [`StateObserver`] handed to every node. It
//! folds each observation into one [`ProjectionSnapshot`] held in a tokio
//! watch channel, so readers never wait on the simulation.

use orion_core::{AllocationMatrix, AssetId, NodeSnapshot, StateObserver, Topology};
use orion_env::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Last-known state of one holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderView {
    pub balance: f64,

    /// Last non-zero balance seen, so a fully debited holder still shows
    /// the capital it put to work
    pub display_balance: f64,

    pub has_intent: bool,
}

/// Last ciphertext a submitter sent, hex encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitterView {
    pub ciphertext: String,
}

/// Row-major allocation table: `data[asset][holder]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationView {
    pub assets: Vec<AssetId>,
    pub holders: Vec<NodeId>,
    pub data: Vec<Vec<f64>>,
}

impl From<&AllocationMatrix> for AllocationView {
    fn from(matrix: &AllocationMatrix) -> Self {
        Self {
            assets: matrix.assets().to_vec(),
            holders: matrix.holders().to_vec(),
            data: matrix.rows(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatorView {
    pub cycle: u64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allocation: Option<AllocationView>,

    pub latest_returns: BTreeMap<NodeId, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkView {
    pub final_portfolio: BTreeMap<AssetId, f64>,
}

/// Everything the presentation layer knows at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSnapshot {
    pub holders: BTreeMap<NodeId, HolderView>,
    pub submitters: BTreeMap<NodeId, SubmitterView>,
    pub aggregator: AggregatorView,
    pub sink: SinkView,
}

impl ProjectionSnapshot {
    /// Folds one node observation into the snapshot.
    pub fn apply(&mut self, node: NodeId, snapshot: NodeSnapshot) {
        match snapshot {
            NodeSnapshot::Submitter { ciphertext } => {
                self.submitters.insert(
                    node,
                    SubmitterView {
                        ciphertext: hex::encode(ciphertext),
                    },
                );
            }
            NodeSnapshot::Holder { balance, has_intent } => {
                let display_balance = match self.holders.get(&node) {
                    Some(prev) if balance <= 0.0 => prev.display_balance,
                    _ => balance,
                };
                self.holders.insert(
                    node,
                    HolderView {
                        balance,
                        display_balance,
                        has_intent,
                    },
                );
            }
            NodeSnapshot::Aggregator {
                cycle,
                allocation,
                latest_returns,
            } => {
                self.aggregator = AggregatorView {
                    cycle,
                    allocation: allocation.as_ref().map(AllocationView::from),
                    latest_returns,
                };
            }
            NodeSnapshot::Sink { final_portfolio } => {
                self.sink = SinkView { final_portfolio };
            }
        }
    }

    /// Initial balances straight from the topology, before any node runs.
    pub fn from_topology(topology: &Topology) -> Self {
        let holders = topology
            .chains()
            .iter()
            .map(|chain| {
                let view = HolderView {
                    balance: chain.initial_balance,
                    display_balance: chain.initial_balance,
                    has_intent: false,
                };
                (chain.holder, view)
            })
            .collect();

        Self {
            holders,
            ..Default::default()
        }
    }

    /// Sum of idle holder balances.
    pub fn idle_capital(&self) -> f64 {
        self.holders.values().map(|h| h.balance).sum()
    }
}

/// Thread-safe accumulator of the latest snapshot.
pub struct StateProjection {
    tx: watch::Sender<ProjectionSnapshot>,
}

impl StateProjection {
    pub fn new() -> Self {
        Self::with_initial(ProjectionSnapshot::default())
    }

    /// Starts from a pre-filled snapshot (e.g. the topology's initial balances).
    pub fn with_initial(initial: ProjectionSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Returns the last-known values without waiting on the simulation.
    pub fn fetch_latest(&self) -> ProjectionSnapshot {
        self.tx.borrow().clone()
    }

    /// A receiver woken on every update.
    pub fn subscribe(&self) -> watch::Receiver<ProjectionSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StateProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl StateObserver for StateProjection {
    fn observe(&self, node: NodeId, snapshot: NodeSnapshot) {
        self.tx.send_modify(|state| state.apply(node, snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(balance: f64, has_intent: bool) -> NodeSnapshot {
        NodeSnapshot::Holder { balance, has_intent }
    }

    #[test]
    fn test_display_balance_keeps_last_nonzero() {
        let projection = StateProjection::new();
        let id = NodeId::Holder(1);

        projection.observe(id, holder(40.0, false));
        projection.observe(id, holder(0.0, true));

        let view = &projection.fetch_latest().holders[&id];
        assert_eq!(view.balance, 0.0);
        assert_eq!(view.display_balance, 40.0);
        assert!(view.has_intent);

        projection.observe(id, holder(41.2, true));
        assert_eq!(projection.fetch_latest().holders[&id].display_balance, 41.2);
    }

    #[test]
    fn test_first_observation_of_zero() {
        let projection = StateProjection::new();
        projection.observe(NodeId::Holder(2), holder(0.0, false));
        assert_eq!(projection.fetch_latest().holders[&NodeId::Holder(2)].display_balance, 0.0);
    }

    #[test]
    fn test_ciphertext_is_hex() {
        let projection = StateProjection::new();
        projection.observe(
            NodeId::Submitter(1),
            NodeSnapshot::Submitter {
                ciphertext: vec![0xde, 0xad, 0x01],
            },
        );
        assert_eq!(projection.fetch_latest().submitters[&NodeId::Submitter(1)].ciphertext, "dead01");
    }

    #[test]
    fn test_aggregator_and_sink() {
        let projection = StateProjection::new();
        let column = BTreeMap::from([("A".to_string(), 15.0), ("B".to_string(), 15.0)]);
        let matrix = AllocationMatrix::from_columns(BTreeMap::from([(NodeId::Holder(1), column.clone())]));

        projection.observe(
            NodeId::Aggregator,
            NodeSnapshot::Aggregator {
                cycle: 2,
                allocation: matrix,
                latest_returns: BTreeMap::from([(NodeId::Holder(1), 0.02)]),
            },
        );
        projection.observe(NodeId::Sink, NodeSnapshot::Sink { final_portfolio: column });

        let latest = projection.fetch_latest();
        assert_eq!(latest.aggregator.cycle, 2);
        let allocation = latest.aggregator.allocation.as_ref().unwrap();
        assert_eq!(allocation.assets, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(allocation.holders, vec![NodeId::Holder(1)]);
        assert_eq!(allocation.data, vec![vec![15.0], vec![15.0]]);
        assert_eq!(latest.sink.final_portfolio["A"], 15.0);

        projection.observe(
            NodeId::Aggregator,
            NodeSnapshot::Aggregator {
                cycle: 3,
                allocation: None,
                latest_returns: BTreeMap::new(),
            },
        );
        assert!(projection.fetch_latest().aggregator.allocation.is_none());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let projection = StateProjection::new();
        projection.observe(NodeId::Holder(1), holder(12.5, true));
        projection.observe(NodeId::Submitter(1), NodeSnapshot::Submitter { ciphertext: vec![1] });

        let json = serde_json::to_value(projection.fetch_latest()).unwrap();
        assert_eq!(json["holders"]["Holder1"]["balance"], 12.5);
        assert_eq!(json["submitters"]["Submitter1"]["ciphertext"], "01");
        assert_eq!(json["aggregator"]["cycle"], 0);

        let back: ProjectionSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, projection.fetch_latest());
    }

    #[test]
    fn test_seeded_from_topology() {
        use orion_core::TopologyConfig;

        let ctx = crate::context::SimContext::new(5, 1.0).unwrap();
        let topology = Topology::build(&TopologyConfig::default(), &ctx).unwrap();
        let projection = StateProjection::with_initial(ProjectionSnapshot::from_topology(&topology));

        let latest = projection.fetch_latest();
        assert_eq!(latest.holders.len(), 3);
        assert!((latest.idle_capital() - 100.0).abs() < 1e-9);
        assert!(latest.holders.values().all(|h| !h.has_intent));
    }

    #[tokio::test]
    async fn test_subscribe_sees_updates() {
        let projection = StateProjection::new();
        let mut rx = projection.subscribe();

        projection.observe(NodeId::Holder(3), holder(7.0, false));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().holders[&NodeId::Holder(3)].balance, 7.0);
    }
}
