//! Error taxonomy for the Orion engine.
//!
//! - [`CodecError`] - per-ciphertext failures; the aggregator recovers from
//!   `Authentication` and `MalformedPayload` by skipping that holder
//! - [`ProtocolError`] - structural violations; always fatal
//! - [`SimError`] - what a node task returns to the driver; any `Err` stops
//!   the whole simulation

use orion_env::{EnvError, NodeId};
use thiserror::Error;

/// AEAD codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Tag did not verify: wrong key, corrupted or truncated blob
    #[error("Authentication failed")]
    Authentication,

    /// Decrypted bytes are not a valid intent
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Intent could not be serialized or sealed
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Protocol violations between nodes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A node received a message kind it has no handler for
    #[error("{node} cannot handle {kind} from {from}")]
    UnexpectedMessage {
        node: NodeId,
        from: NodeId,
        kind: &'static str,
    },

    /// A state reply came from a node the aggregator has no key for
    #[error("Reply from unknown holder {0}")]
    UnknownHolder(NodeId),

    /// A holder snapshot failed validation
    #[error("Invalid snapshot from {holder}: {reason}")]
    InvalidSnapshot { holder: NodeId, reason: String },

    /// A debit or balance instruction carried a negative or non-finite amount
    #[error("Invalid amount {amount} sent to {node}")]
    InvalidAmount { node: NodeId, amount: f64 },
}

/// Fatal errors that terminate a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// The gather barrier did not fill before the configured deadline
    #[error("Gather timed out with {received}/{expected} holder replies")]
    GatherTimeout { received: usize, expected: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A node task panicked or was aborted outside of shutdown
    #[error("Node task failed: {0}")]
    TaskFailed(String),
}

/// Convenience alias for node task results.
pub type SimResult<T> = Result<T, SimError>;
