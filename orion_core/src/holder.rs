//! Holder node: keeps idle capital and the latest encrypted intent.
//!
//! ```text
//!          ┌──────────────────┐
//!   ┌─────►│  WaitForMessage  │
//!   │      └────────┬─────────┘
//!   │               │ receive
//!   │      ┌────────▼─────────┐
//!   └──────│     Dispatch     │── unknown kind ──► fatal
//!          └──────────────────┘
//! ```

use crate::error::{ProtocolError, SimResult};
use crate::message::{HolderSnapshot, Mailboxes, Message};
use crate::observer::{NodeSnapshot, StateObserver};
use orion_env::NodeId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State owned by one holder task.
#[derive(Debug, Clone)]
pub struct HolderNode {
    id: NodeId,
    balance: f64,
    last_intent: Option<Vec<u8>>,
}

impl HolderNode {
    pub fn new(id: NodeId, balance: f64) -> Self {
        Self {
            id,
            balance: balance.max(0.0),
            last_intent: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Idle balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Latest ciphertext from the paired submitter.
    pub fn last_intent(&self) -> Option<&[u8]> {
        self.last_intent.as_deref()
    }

    /// Reply payload for `StateRequested`.
    pub fn snapshot(&self) -> HolderSnapshot {
        HolderSnapshot {
            balance: self.balance,
            last_intent: self.last_intent.clone(),
        }
    }

    /// Moves up to `amount` out of the idle balance.
    ///
    /// Requests above the balance are clamped; the return value is what was
    /// actually debited.
    pub fn debit(&mut self, amount: f64) -> Result<f64, ProtocolError> {
        self.check_amount(amount)?;

        let actual = amount.min(self.balance);
        if amount > self.balance {
            warn!(
                "[{}] Debit of {:.2} exceeds balance {:.2}, clamping to {:.2}",
                self.id, amount, self.balance, actual
            );
        }
        self.balance -= actual;
        info!("[{}] Debited {:.2}, idle balance now {:.2}", self.id, actual, self.balance);
        Ok(actual)
    }

    /// Overwrites the idle balance.
    pub fn set_balance(&mut self, amount: f64) -> Result<(), ProtocolError> {
        self.check_amount(amount)?;
        info!("[{}] Balance {:.2} -> {:.2}", self.id, self.balance, amount);
        self.balance = amount;
        Ok(())
    }

    /// Applies one message and returns the reply to send, if any.
    pub fn handle(&mut self, from: NodeId, message: Message) -> Result<Option<(NodeId, Message)>, ProtocolError> {
        match message {
            Message::IntentSubmitted { ciphertext } => {
                debug!("[{}] Stored {}-byte intent from {}", self.id, ciphertext.len(), from);
                self.last_intent = Some(ciphertext);
                Ok(None)
            }
            Message::StateRequested => {
                debug!("[{}] Sending state to {}", self.id, from);
                Ok(Some((from, Message::HolderState(self.snapshot()))))
            }
            Message::DebitRequested { amount } => {
                self.debit(amount)?;
                Ok(None)
            }
            Message::BalanceSet { amount } => {
                self.set_balance(amount)?;
                Ok(None)
            }
            other => Err(ProtocolError::UnexpectedMessage {
                node: self.id,
                from,
                kind: other.kind(),
            }),
        }
    }

    /// Reactive loop. Returns `Ok(())` on cancellation.
    pub async fn run(
        mut self,
        mailboxes: Mailboxes,
        observer: Arc<dyn StateObserver>,
        shutdown: CancellationToken,
    ) -> SimResult<()> {
        info!("[{}] Started with balance {:.2}", self.id, self.balance);

        loop {
            let (from, message) = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = mailboxes.receive(self.id) => received?,
            };

            if let Some((to, reply)) = self.handle(from, message)? {
                mailboxes.send(to, self.id, reply)?;
            }

            observer.observe(
                self.id,
                NodeSnapshot::Holder {
                    balance: self.balance,
                    has_intent: self.last_intent.is_some(),
                },
            );
        }
    }

    fn check_amount(&self, amount: f64) -> Result<(), ProtocolError> {
        if amount.is_finite() && amount >= 0.0 {
            Ok(())
        } else {
            Err(ProtocolError::InvalidAmount { node: self.id, amount })
        }
    }
}
