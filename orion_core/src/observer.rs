//! State observation seam between the engine and the presentation layer.
//!
//! Nodes call [`StateObserver::observe`] after every state change. The
//! observer must return quickly and must not call back into the engine.

use crate::intent::AssetId;
use crate::matrix::AllocationMatrix;
use orion_env::{NodeId, NodeKind};
use std::collections::BTreeMap;

/// What a node looked like right after a state change.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSnapshot {
    Submitter {
        ciphertext: Vec<u8>,
    },
    Holder {
        balance: f64,
        has_intent: bool,
    },
    Aggregator {
        cycle: u64,
        allocation: Option<AllocationMatrix>,
        latest_returns: BTreeMap<NodeId, f64>,
    },
    Sink {
        final_portfolio: BTreeMap<AssetId, f64>,
    },
}

impl NodeSnapshot {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeSnapshot::Submitter { .. } => NodeKind::Submitter,
            NodeSnapshot::Holder { .. } => NodeKind::Holder,
            NodeSnapshot::Aggregator { .. } => NodeKind::Aggregator,
            NodeSnapshot::Sink { .. } => NodeKind::Sink,
        }
    }
}

/// Receives node snapshots as they happen.
pub trait StateObserver: Send + Sync + 'static {
    fn observe(&self, node: NodeId, snapshot: NodeSnapshot);
}
