//! Per-node mailboxes for Orion actors.

use crate::error::EnvError;
use crate::types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One unbounded FIFO queue per node.
///
/// The registry is created once by the driver and cloned into every task at
/// spawn time; clones share the same queues.
///
/// # Message Flow
///
/// ```text
/// Node A                  Registry                   Node B
///   |                        |                          |
///   |-- send(B, A, msg) ---->| [B's queue]              |
///   |                        |<---- receive(B) ---------|
///   |                        |----- (A, msg) ---------->|
/// ```
///
/// # Ordering
///
/// Messages to one recipient are delivered oldest first, so each sender's
/// own messages keep their relative order. Nothing is guaranteed across
/// recipients.
pub struct MailboxRegistry<M> {
    mailboxes: Arc<HashMap<NodeId, Mailbox<M>>>,
}

struct Mailbox<M> {
    tx: mpsc::UnboundedSender<(NodeId, M)>,

    /// Receiver behind a tokio mutex so `receive` can take `&self`
    rx: Mutex<mpsc::UnboundedReceiver<(NodeId, M)>>,
}

impl<M: Send + 'static> MailboxRegistry<M> {
    /// Creates one empty mailbox per node.
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mailboxes = nodes
            .into_iter()
            .map(|id| {
                let (tx, rx) = mpsc::unbounded_channel();
                (id, Mailbox { tx, rx: Mutex::new(rx) })
            })
            .collect();

        Self {
            mailboxes: Arc::new(mailboxes),
        }
    }

    /// Appends a message to `to`'s queue.
    ///
    /// Never blocks. Fails only for a node that has no mailbox.
    pub fn send(&self, to: NodeId, from: NodeId, message: M) -> Result<(), EnvError> {
        let mailbox = self.mailboxes.get(&to).ok_or(EnvError::UnknownMailbox(to))?;
        mailbox
            .tx
            .send((from, message))
            .map_err(|_| EnvError::MailboxClosed(to))
    }

    /// Waits for the oldest message addressed to `node`.
    ///
    /// # Returns
    /// * `Ok((sender, message))` - The next message in FIFO order
    /// * `Err(EnvError::UnknownMailbox)` - `node` is not registered
    ///
    /// # Blocking
    /// Suspends without timeout until a message arrives. Dropping the future
    /// (task cancellation) loses no message.
    pub async fn receive(&self, node: NodeId) -> Result<(NodeId, M), EnvError> {
        let mailbox = self.mailboxes.get(&node).ok_or(EnvError::UnknownMailbox(node))?;
        let mut rx = mailbox.rx.lock().await;
        rx.recv().await.ok_or(EnvError::MailboxClosed(node))
    }

    /// Returns true if `node` has a mailbox.
    pub fn contains(&self, node: NodeId) -> bool {
        self.mailboxes.contains_key(&node)
    }

    /// Returns the number of registered mailboxes.
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    /// Returns true if no mailbox is registered.
    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }
}

impl<M> Clone for MailboxRegistry<M> {
    fn clone(&self) -> Self {
        Self {
            mailboxes: Arc::clone(&self.mailboxes),
        }
    }
}
