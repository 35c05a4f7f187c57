//! Error types for the Orion environment abstraction.

use crate::types::NodeId;
use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// No mailbox is registered for the target node
    #[error("Unknown mailbox: {0}")]
    UnknownMailbox(NodeId),

    /// Every sender of a mailbox was dropped (registry torn down)
    #[error("Mailbox closed: {0}")]
    MailboxClosed(NodeId),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
}

impl EnvError {
    /// Creates a context error.
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextError(msg.into())
    }
}
