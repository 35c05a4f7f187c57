//! Orion Core - Encrypted Intent Aggregation Engine
//!
//! Submitters seal portfolio intents under per-holder keys, holders keep
//! idle capital and the latest sealed intent, and a single aggregator
//! periodically gathers every holder, decrypts, allocates, settles returns
//! and publishes the combined portfolio to a sink.
//!
//! Every node is an independent task talking only through the
//! [`orion_env::MailboxRegistry`]; presentation hooks in through
//! [`StateObserver`].

pub mod aggregator;
pub mod crypto;
pub mod error;
pub mod holder;
pub mod intent;
pub mod matrix;
pub mod message;
pub mod observer;
pub mod sink;
pub mod submitter;
pub mod topology;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use aggregator::{AggregatorConfig, AggregatorNode, CycleReport};
pub use crypto::{decrypt, encrypt, IntentKey};
pub use error::{CodecError, ProtocolError, SimError, SimResult};
pub use holder::HolderNode;
pub use intent::{AssetId, Intent, IntentError};
pub use matrix::AllocationMatrix;
pub use message::{HolderSnapshot, Mailboxes, Message};
pub use observer::{NodeSnapshot, StateObserver};
pub use sink::SinkNode;
pub use submitter::{SubmitterConfig, SubmitterNode};
pub use topology::{Chain, Topology, TopologyConfig};
