//! Simulation driver: one task per node, supervised as a unit.
//!
//! ```text
//!   start(topology)
//!        │ spawn
//!        ▼
//!   ┌──────────┐  first Err  ┌────────────┐
//!   │ JoinSet  │────────────►│ cancel all │
//!   │ (nodes)  │             └─────┬──────┘
//!   └────┬─────┘                   │ drain
//!        └───────────► supervisor ◄┘
//!                          │
//!                   wait() / stop()
//! ```

use orion_core::{
    AggregatorConfig, AggregatorNode, HolderNode, SimError, SimResult, SinkNode, StateObserver, SubmitterConfig,
    SubmitterNode, Topology,
};
use orion_env::{NodeId, OrionContext};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

struct RunHandle {
    shutdown: CancellationToken,
    supervisor: JoinHandle<SimResult<()>>,
}

/// Owns the node tasks of at most one run at a time.
pub struct Simulation<Ctx: OrionContext> {
    ctx: Arc<Ctx>,
    observer: Arc<dyn StateObserver>,
    submitter: SubmitterConfig,
    aggregator: AggregatorConfig,
    run: Option<RunHandle>,
}

impl<Ctx: OrionContext> Simulation<Ctx> {
    pub fn new(
        ctx: Arc<Ctx>,
        observer: Arc<dyn StateObserver>,
        submitter: SubmitterConfig,
        aggregator: AggregatorConfig,
    ) -> Self {
        Self {
            ctx,
            observer,
            submitter,
            aggregator,
            run: None,
        }
    }

    /// True while node tasks are alive.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.supervisor.is_finished())
    }

    /// Spawns every node of `topology`.
    ///
    /// # Returns
    /// `Ok(false)` without side effects if a run is already active,
    /// `Ok(true)` once all tasks are spawned. If the previous run ended with
    /// a fatal error nobody collected through `wait()` or `stop()`, that
    /// error is returned instead and the next call starts fresh.
    pub async fn start(&mut self, topology: &Topology) -> SimResult<bool> {
        if self.is_running() {
            debug!("Simulation already running, start ignored");
            return Ok(false);
        }
        if let Some(mut finished) = self.run.take() {
            if let Err(e) = join_supervisor(&mut finished.supervisor).await {
                error!("Previous run ended with an uncollected error: {}", e);
                return Err(e);
            }
        }

        // Build every node before spawning so a config error leaves nothing behind
        let aggregator = AggregatorNode::new(topology.aggregator_keys(), self.aggregator.clone())?;
        let submitters = topology
            .chains()
            .iter()
            .map(|chain| SubmitterNode::new(chain.submitter, chain.key.clone(), self.submitter.clone()))
            .collect::<SimResult<Vec<_>>>()?;

        let mailboxes = topology.mailboxes();
        let shutdown = CancellationToken::new();
        let mut tasks: JoinSet<(NodeId, SimResult<()>)> = JoinSet::new();

        for chain in topology.chains() {
            let holder = HolderNode::new(chain.holder, chain.initial_balance);
            let fut = holder.run(mailboxes.clone(), self.observer.clone(), shutdown.clone());
            let id = chain.holder;
            tasks.spawn(async move { (id, fut.await) });
        }

        for submitter in submitters {
            let id = submitter.id();
            let fut = submitter.run(self.ctx.clone(), mailboxes.clone(), self.observer.clone(), shutdown.clone());
            tasks.spawn(async move { (id, fut.await) });
        }

        let fut = aggregator.run(self.ctx.clone(), mailboxes.clone(), self.observer.clone(), shutdown.clone());
        tasks.spawn(async move { (NodeId::Aggregator, fut.await) });

        let fut = SinkNode::new().run(mailboxes, self.observer.clone(), shutdown.clone());
        tasks.spawn(async move { (NodeId::Sink, fut.await) });

        info!(
            "Started simulation with {} holders ({} tasks, seed {})",
            topology.num_holders(),
            tasks.len(),
            self.ctx.seed()
        );

        let supervisor = tokio::spawn(supervise(tasks, shutdown.clone()));
        self.run = Some(RunHandle { shutdown, supervisor });
        Ok(true)
    }

    /// Resolves when the current run ends on its own.
    ///
    /// Node loops only end on cancellation or a fatal error, so without a
    /// `stop()` from elsewhere this returns the first fatal error.
    pub async fn wait(&mut self) -> SimResult<()> {
        let Some(run) = self.run.as_mut() else {
            return Ok(());
        };
        let result = join_supervisor(&mut run.supervisor).await;
        self.run = None;
        result
    }

    /// Cancels every node and joins all tasks. Safe when not running.
    ///
    /// Returns the fatal error if the run had already failed.
    pub async fn stop(&mut self) -> SimResult<()> {
        let Some(mut run) = self.run.take() else {
            return Ok(());
        };
        run.shutdown.cancel();
        let result = join_supervisor(&mut run.supervisor).await;
        info!("Simulation stopped");
        result
    }
}

async fn join_supervisor(supervisor: &mut JoinHandle<SimResult<()>>) -> SimResult<()> {
    match supervisor.await {
        Ok(result) => result,
        Err(e) => Err(SimError::TaskFailed(e.to_string())),
    }
}

/// Drains the task set; the first failure cancels everyone else.
async fn supervise(mut tasks: JoinSet<(NodeId, SimResult<()>)>, shutdown: CancellationToken) -> SimResult<()> {
    let mut first_error: Option<SimError> = None;

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok((_, Ok(()))) => None,
            Ok((node, Err(e))) => {
                error!("[{}] Fatal: {}", node, e);
                Some(e)
            }
            Err(e) => {
                error!("Node task failed: {}", e);
                Some(SimError::TaskFailed(e.to_string()))
            }
        };

        if let Some(e) = failure {
            shutdown.cancel();
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
