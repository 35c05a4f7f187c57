//! Messages exchanged between Orion nodes.
//!
//! One closed enum covers every kind on the wire; each node matches the
//! kinds it accepts and treats the rest as a fatal protocol error.

use crate::intent::AssetId;
use std::collections::BTreeMap;

/// A holder's reply to `StateRequested`.
#[derive(Debug, Clone, PartialEq)]
pub struct HolderSnapshot {
    /// Idle balance at the time of the request
    pub balance: f64,

    /// Last ciphertext received from the paired submitter, if any
    pub last_intent: Option<Vec<u8>>,
}

/// In-process message between nodes. Only the intent ciphertext is ever
/// encrypted; everything else is a plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Submitter → Holder
    IntentSubmitted { ciphertext: Vec<u8> },

    /// Aggregator → Holder
    StateRequested,

    /// Holder → Aggregator
    HolderState(HolderSnapshot),

    /// Aggregator → Holder: move `amount` from idle to active capital
    DebitRequested { amount: f64 },

    /// Aggregator → Holder: overwrite the balance after settlement
    BalanceSet { amount: f64 },

    /// Aggregator → Sink
    FinalPortfolioComputed { portfolio: BTreeMap<AssetId, f64> },
}

impl Message {
    /// Short name of the variant, for logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::IntentSubmitted { .. } => "IntentSubmitted",
            Message::StateRequested => "StateRequested",
            Message::HolderState(_) => "HolderState",
            Message::DebitRequested { .. } => "DebitRequested",
            Message::BalanceSet { .. } => "BalanceSet",
            Message::FinalPortfolioComputed { .. } => "FinalPortfolioComputed",
        }
    }
}

/// The registry type every node shares.
pub type Mailboxes = orion_env::MailboxRegistry<Message>;
