//! Aggregator node: the rebalancing cycle.
//!
//! Every `cycle_period` time units:
//!
//! ```text
//! 1. SETTLE     sample r_j ~ N(μ, σ) per active holder, BalanceSet(active_j·(1+r_j))
//! 2. GATHER     StateRequested → every holder, wait for N distinct HolderState replies
//! 3. DECRYPT    open each holder's last intent with its key; skip bad ciphertexts
//!               allocation_j = weights_j × balance_j, DebitRequested(balance_j)
//! 4. AGGREGATE  matrix[asset][holder]; row sums → FinalPortfolioComputed → Sink
//! 5. STORE      keep the matrix for the next settlement
//! ```
//!
//! The gather step is the only barrier in the system. Without a configured
//! `gather_timeout` a silent holder stalls the aggregator forever.

use crate::crypto::{decrypt, IntentKey};
use crate::error::{CodecError, ProtocolError, SimError, SimResult};
use crate::intent::AssetId;
use crate::matrix::AllocationMatrix;
use crate::message::{HolderSnapshot, Mailboxes, Message};
use crate::observer::{NodeSnapshot, StateObserver};
use orion_env::{NodeId, NodeKind, OrionContext, MAX_TIME_UNITS};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// RNG stream reserved for the aggregator's return sampling.
pub const AGGREGATOR_RNG_STREAM: u64 = 0;

/// Aggregator configuration.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Time units between cycles (default: 5)
    pub cycle_period: f64,

    /// Mean of the per-holder synthetic return (default: 0.01)
    pub return_mean: f64,

    /// Standard deviation of the synthetic return (default: 0.03)
    pub return_std: f64,

    /// Deadline for the gather barrier in time units (default: none)
    pub gather_timeout: Option<f64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cycle_period: 5.0,
            return_mean: 0.01,
            return_std: 0.03,
            gather_timeout: None,
        }
    }
}

/// Outcome of the decrypt-and-weight step.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    /// Debit instructions, one per contributing holder
    pub debits: Vec<(NodeId, Message)>,

    /// Holders whose ciphertext failed to open this cycle
    pub skipped: Vec<NodeId>,

    /// `None` when no holder contributed
    pub matrix: Option<AllocationMatrix>,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub settled: BTreeMap<NodeId, f64>,
    pub skipped: Vec<NodeId>,
    pub portfolio: Option<BTreeMap<AssetId, f64>>,
}

pub struct AggregatorNode {
    keys: BTreeMap<NodeId, IntentKey>,
    config: AggregatorConfig,
    returns: Normal<f64>,
    last_allocation: Option<AllocationMatrix>,
    last_returns: BTreeMap<NodeId, f64>,
    cycle: u64,
}

impl AggregatorNode {
    /// Creates the aggregator with one key per holder.
    pub fn new(keys: BTreeMap<NodeId, IntentKey>, config: AggregatorConfig) -> SimResult<Self> {
        if let Some(id) = keys.keys().find(|id| id.kind() != NodeKind::Holder) {
            return Err(SimError::Config(format!("key registered for non-holder {}", id)));
        }
        if !(0.0..=MAX_TIME_UNITS).contains(&config.cycle_period) {
            return Err(SimError::Config(format!(
                "cycle period must be in [0, {}], got {}",
                MAX_TIME_UNITS, config.cycle_period
            )));
        }
        if let Some(timeout) = config.gather_timeout {
            if !(timeout > 0.0 && timeout <= MAX_TIME_UNITS) {
                return Err(SimError::Config(format!(
                    "gather timeout must be in (0, {}], got {}",
                    MAX_TIME_UNITS, timeout
                )));
            }
        }
        let returns = Normal::new(config.return_mean, config.return_std)
            .map_err(|e| SimError::Config(format!("invalid return distribution: {}", e)))?;

        Ok(Self {
            keys,
            config,
            returns,
            last_allocation: None,
            last_returns: BTreeMap::new(),
            cycle: 0,
        })
    }

    /// Holders served, in identity order.
    pub fn holders(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.keys.keys().copied()
    }

    pub fn last_allocation(&self) -> Option<&AllocationMatrix> {
        self.last_allocation.as_ref()
    }

    pub fn last_returns(&self) -> &BTreeMap<NodeId, f64> {
        &self.last_returns
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    // =========================================================================
    // 1. SETTLE
    // =========================================================================

    /// Samples one return per holder with a column in the previous matrix.
    pub fn sample_returns<R: Rng + ?Sized>(&self, rng: &mut R) -> BTreeMap<NodeId, f64> {
        match &self.last_allocation {
            Some(matrix) => matrix
                .holders()
                .iter()
                .map(|h| (*h, self.returns.sample(&mut *rng)))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    /// Applies `returns` to the previous matrix and records them.
    ///
    /// Returns the settled balance per holder; empty on the first cycle.
    pub fn settle(&mut self, returns: BTreeMap<NodeId, f64>) -> BTreeMap<NodeId, f64> {
        let settled = match &self.last_allocation {
            Some(matrix) => matrix.settle(&returns),
            None => BTreeMap::new(),
        };
        self.last_returns = returns;
        settled
    }

    // =========================================================================
    // 2. GATHER
    // =========================================================================

    /// Validates one gather reply and files it under its sender.
    ///
    /// A repeated reply from the same holder replaces the earlier one and
    /// does not count twice.
    pub fn accept_reply(
        &self,
        from: NodeId,
        message: Message,
        replies: &mut BTreeMap<NodeId, HolderSnapshot>,
    ) -> Result<(), ProtocolError> {
        let snapshot = match message {
            Message::HolderState(snapshot) => snapshot,
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    node: NodeId::Aggregator,
                    from,
                    kind: other.kind(),
                })
            }
        };

        if !self.keys.contains_key(&from) {
            return Err(ProtocolError::UnknownHolder(from));
        }
        if !snapshot.balance.is_finite() || snapshot.balance < 0.0 {
            return Err(ProtocolError::InvalidSnapshot {
                holder: from,
                reason: format!("balance {} is negative or not finite", snapshot.balance),
            });
        }

        debug!("[{}] Received state from {}", NodeId::Aggregator, from);
        replies.insert(from, snapshot);
        Ok(())
    }

    /// Requests every holder's state and waits for all of them.
    pub async fn gather<Ctx: OrionContext>(
        &self,
        ctx: &Ctx,
        mailboxes: &Mailboxes,
    ) -> SimResult<BTreeMap<NodeId, HolderSnapshot>> {
        for holder in self.holders() {
            mailboxes.send(holder, NodeId::Aggregator, Message::StateRequested)?;
        }

        let expected = self.keys.len();
        let mut replies = BTreeMap::new();

        match self.config.gather_timeout {
            None => self.collect_replies(mailboxes, &mut replies).await?,
            Some(units) => {
                let collected = tokio::select! {
                    result = self.collect_replies(mailboxes, &mut replies) => Some(result),
                    _ = ctx.sleep_units(units) => None,
                };
                match collected {
                    Some(result) => result?,
                    None => {
                        return Err(SimError::GatherTimeout {
                            received: replies.len(),
                            expected,
                        })
                    }
                }
            }
        }

        Ok(replies)
    }

    async fn collect_replies(
        &self,
        mailboxes: &Mailboxes,
        replies: &mut BTreeMap<NodeId, HolderSnapshot>,
    ) -> SimResult<()> {
        while replies.len() < self.keys.len() {
            let (from, message) = mailboxes.receive(NodeId::Aggregator).await?;
            self.accept_reply(from, message, replies)?;
        }
        Ok(())
    }

    // =========================================================================
    // 3. DECRYPT AND WEIGHT / 4. AGGREGATE
    // =========================================================================

    /// Opens every intent, weights it by the holder's balance and assembles
    /// the matrix. The matrix is stored for the next settlement.
    ///
    /// Snapshots are looked up by holder identity, never by arrival order.
    pub fn allocate(&mut self, snapshots: &BTreeMap<NodeId, HolderSnapshot>) -> SimResult<Allocation> {
        let mut columns = BTreeMap::new();
        let mut allocation = Allocation::default();

        for (holder, snapshot) in snapshots {
            let ciphertext = match snapshot.last_intent.as_deref() {
                Some(ct) if !ct.is_empty() => ct,
                _ => {
                    debug!("[{}] No intent found for {}", NodeId::Aggregator, holder);
                    continue;
                }
            };
            let key = self
                .keys
                .get(holder)
                .ok_or(ProtocolError::UnknownHolder(*holder))?;

            let intent = match decrypt(key, ciphertext) {
                Ok(intent) => intent,
                Err(e @ (CodecError::Authentication | CodecError::MalformedPayload(_))) => {
                    warn!("[{}] Skipping {} this cycle: {}", NodeId::Aggregator, holder, e);
                    allocation.skipped.push(*holder);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let amount = snapshot.balance;
            if amount <= 0.0 {
                debug!("[{}] {} has no idle balance to allocate", NodeId::Aggregator, holder);
                continue;
            }

            info!(
                "[{}] Allocating {:.2} from {} across {} assets",
                NodeId::Aggregator,
                amount,
                holder,
                intent.len()
            );
            columns.insert(*holder, intent.allocate(amount));
            allocation.debits.push((*holder, Message::DebitRequested { amount }));
        }

        allocation.matrix = AllocationMatrix::from_columns(columns);
        self.last_allocation = allocation.matrix.clone();
        Ok(allocation)
    }

    // =========================================================================
    // CYCLE
    // =========================================================================

    /// Runs settle → gather → decrypt → aggregate once.
    pub async fn run_cycle<Ctx: OrionContext, R: Rng + Send>(
        &mut self,
        ctx: &Ctx,
        rng: &mut R,
        mailboxes: &Mailboxes,
        observer: &dyn StateObserver,
    ) -> SimResult<CycleReport> {
        self.cycle += 1;
        info!("[{}] Starting cycle {}", NodeId::Aggregator, self.cycle);

        let returns = self.sample_returns(rng);
        let settled = self.settle(returns);
        for (holder, amount) in &settled {
            info!("[{}] Settling {} to {:.2}", NodeId::Aggregator, holder, amount);
            mailboxes.send(*holder, NodeId::Aggregator, Message::BalanceSet { amount: *amount })?;
        }

        let snapshots = self.gather(ctx, mailboxes).await?;
        info!("[{}] Processing {} holder states", NodeId::Aggregator, snapshots.len());

        let allocation = self.allocate(&snapshots)?;
        for (holder, debit) in allocation.debits {
            mailboxes.send(holder, NodeId::Aggregator, debit)?;
        }

        let portfolio = allocation.matrix.as_ref().map(AllocationMatrix::portfolio);
        match &portfolio {
            Some(portfolio) => {
                mailboxes.send(
                    NodeId::Sink,
                    NodeId::Aggregator,
                    Message::FinalPortfolioComputed {
                        portfolio: portfolio.clone(),
                    },
                )?;
                info!("[{}] Sent final portfolio over {} assets", NodeId::Aggregator, portfolio.len());
            }
            None => info!("[{}] No intents to aggregate, matrix cleared", NodeId::Aggregator),
        }

        observer.observe(
            NodeId::Aggregator,
            NodeSnapshot::Aggregator {
                cycle: self.cycle,
                allocation: self.last_allocation.clone(),
                latest_returns: self.last_returns.clone(),
            },
        );

        Ok(CycleReport {
            cycle: self.cycle,
            settled,
            skipped: allocation.skipped,
            portfolio,
        })
    }

    pub async fn run<Ctx: OrionContext>(
        mut self,
        ctx: Arc<Ctx>,
        mailboxes: Mailboxes,
        observer: Arc<dyn StateObserver>,
        shutdown: CancellationToken,
    ) -> SimResult<()> {
        let mut rng = ctx.derive_rng(AGGREGATOR_RNG_STREAM);
        info!("[{}] Started with {} holders", NodeId::Aggregator, self.keys.len());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = ctx.sleep_units(self.config.cycle_period) => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                report = self.run_cycle(ctx.as_ref(), &mut rng, &mailboxes, observer.as_ref()) => {
                    let report = report?;
                    debug!(
                        "[{}] Cycle {} done: {} settled, {} skipped",
                        NodeId::Aggregator,
                        report.cycle,
                        report.settled.len(),
                        report.skipped.len()
                    );
                }
            }
        }
    }
}
