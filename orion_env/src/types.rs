//! Common types for the Orion environment abstraction.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The four kinds of node in the Orion topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Submitter,
    Holder,
    Aggregator,
    Sink,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Submitter => "submitter",
            NodeKind::Holder => "holder",
            NodeKind::Aggregator => "aggregator",
            NodeKind::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// Unique identifier for an Orion node.
///
/// Submitters and holders are numbered from 1; `Submitter(i)` always feeds
/// `Holder(i)`. The aggregator and sink are singletons.
///
/// Renders as `Submitter1`, `Holder1`, `Aggregator`, `Sink` and parses back
/// from the same form, which is also how it serializes (so it can key JSON
/// maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Submitter(u32),
    Holder(u32),
    Aggregator,
    Sink,
}

impl NodeId {
    /// Returns the kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Submitter(_) => NodeKind::Submitter,
            NodeId::Holder(_) => NodeKind::Holder,
            NodeId::Aggregator => NodeKind::Aggregator,
            NodeId::Sink => NodeKind::Sink,
        }
    }

    /// Returns the chain index for submitters and holders.
    pub fn chain_index(&self) -> Option<u32> {
        match self {
            NodeId::Submitter(i) | NodeId::Holder(i) => Some(*i),
            NodeId::Aggregator | NodeId::Sink => None,
        }
    }

    /// Returns the holder a submitter feeds, or `None` for other kinds.
    pub fn paired_holder(&self) -> Option<NodeId> {
        match self {
            NodeId::Submitter(i) => Some(NodeId::Holder(*i)),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Submitter(i) => write!(f, "Submitter{}", i),
            NodeId::Holder(i) => write!(f, "Holder{}", i),
            NodeId::Aggregator => f.write_str("Aggregator"),
            NodeId::Sink => f.write_str("Sink"),
        }
    }
}

/// Returned when a string is not a valid [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id: {0:?}")]
pub struct ParseNodeIdError(String);

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let indexed = |prefix: &str| {
            s.strip_prefix(prefix)
                .and_then(|rest| rest.parse::<u32>().ok())
                .filter(|i| *i > 0)
        };

        match s {
            "Aggregator" => Ok(NodeId::Aggregator),
            "Sink" => Ok(NodeId::Sink),
            _ => {
                if let Some(i) = indexed("Submitter") {
                    Ok(NodeId::Submitter(i))
                } else if let Some(i) = indexed("Holder") {
                    Ok(NodeId::Holder(i))
                } else {
                    Err(ParseNodeIdError(s.to_string()))
                }
            }
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        for id in [
            NodeId::Submitter(3),
            NodeId::Holder(12),
            NodeId::Aggregator,
            NodeId::Sink,
        ] {
            let parsed: NodeId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("Holder".parse::<NodeId>().is_err());
        assert!("Holder0".parse::<NodeId>().is_err());
        assert!("Vault1".parse::<NodeId>().is_err());
        assert!("holder1".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_pairing() {
        assert_eq!(NodeId::Submitter(2).paired_holder(), Some(NodeId::Holder(2)));
        assert_eq!(NodeId::Holder(2).paired_holder(), None);
        assert_eq!(NodeId::Holder(2).chain_index(), Some(2));
        assert_eq!(NodeId::Sink.kind(), NodeKind::Sink);
    }

    #[test]
    fn test_holders_order_by_index() {
        let mut ids = vec![NodeId::Holder(10), NodeId::Holder(2), NodeId::Holder(1)];
        ids.sort();
        assert_eq!(ids, vec![NodeId::Holder(1), NodeId::Holder(2), NodeId::Holder(10)]);
    }
}
