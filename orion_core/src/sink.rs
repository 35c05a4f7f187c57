//! Sink node: terminal store of the latest combined portfolio.

use crate::error::{ProtocolError, SimResult};
use crate::intent::AssetId;
use crate::message::{Mailboxes, Message};
use crate::observer::{NodeSnapshot, StateObserver};
use orion_env::NodeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct SinkNode {
    final_portfolio: BTreeMap<AssetId, f64>,
}

impl SinkNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_portfolio(&self) -> &BTreeMap<AssetId, f64> {
        &self.final_portfolio
    }

    /// Replaces the portfolio wholesale; rejects every other message kind.
    pub fn handle(&mut self, from: NodeId, message: Message) -> Result<(), ProtocolError> {
        match message {
            Message::FinalPortfolioComputed { portfolio } => {
                self.final_portfolio = portfolio;
                Ok(())
            }
            other => Err(ProtocolError::UnexpectedMessage {
                node: NodeId::Sink,
                from,
                kind: other.kind(),
            }),
        }
    }

    pub async fn run(
        mut self,
        mailboxes: Mailboxes,
        observer: Arc<dyn StateObserver>,
        shutdown: CancellationToken,
    ) -> SimResult<()> {
        loop {
            let (from, message) = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = mailboxes.receive(NodeId::Sink) => received?,
            };

            self.handle(from, message)?;
            info!(
                "[{}] Final portfolio updated: {} assets, total {:.2}",
                NodeId::Sink,
                self.final_portfolio.len(),
                self.final_portfolio.values().sum::<f64>()
            );

            observer.observe(
                NodeId::Sink,
                NodeSnapshot::Sink {
                    final_portfolio: self.final_portfolio.clone(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingObserver;

    fn portfolio(pairs: &[(&str, f64)]) -> BTreeMap<AssetId, f64> {
        pairs.iter().map(|(a, v)| (a.to_string(), *v)).collect()
    }

    #[test]
    fn test_replaces_wholesale() {
        let mut sink = SinkNode::new();

        sink.handle(
            NodeId::Aggregator,
            Message::FinalPortfolioComputed { portfolio: portfolio(&[("A", 30.0), ("B", 20.0)]) },
        )
        .unwrap();
        sink.handle(
            NodeId::Aggregator,
            Message::FinalPortfolioComputed { portfolio: portfolio(&[("C", 5.0)]) },
        )
        .unwrap();

        assert_eq!(sink.final_portfolio(), &portfolio(&[("C", 5.0)]));
    }

    #[test]
    fn test_rejects_other_kinds() {
        let mut sink = SinkNode::new();
        let err = sink.handle(NodeId::Aggregator, Message::StateRequested).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedMessage { node: NodeId::Sink, .. }));
    }

    #[tokio::test]
    async fn test_run_loop_replaces_and_observes() {
        let mailboxes = Mailboxes::new([NodeId::Aggregator, NodeId::Sink]);
        let observer = Arc::new(RecordingObserver::default());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(SinkNode::new().run(mailboxes.clone(), observer.clone(), shutdown.clone()));

        for pairs in [&[("A", 30.0), ("B", 20.0)][..], &[("C", 5.0)][..]] {
            mailboxes
                .send(
                    NodeId::Sink,
                    NodeId::Aggregator,
                    Message::FinalPortfolioComputed { portfolio: portfolio(pairs) },
                )
                .unwrap();
        }

        while observer.count_for(NodeId::Sink) < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            observer.last_for(NodeId::Sink),
            Some(NodeSnapshot::Sink {
                final_portfolio: portfolio(&[("C", 5.0)])
            })
        );

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_loop_fails_on_unexpected_kind() {
        let mailboxes = Mailboxes::new([NodeId::Aggregator, NodeId::Sink]);
        let task = tokio::spawn(SinkNode::new().run(
            mailboxes.clone(),
            Arc::new(RecordingObserver::default()),
            CancellationToken::new(),
        ));

        mailboxes
            .send(NodeId::Sink, NodeId::Aggregator, Message::DebitRequested { amount: 1.0 })
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(crate::error::SimError::Protocol(ProtocolError::UnexpectedMessage { .. }))
        ));
    }
}
