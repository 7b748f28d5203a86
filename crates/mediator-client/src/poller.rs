//! MiningPoller: bounded wait for a transaction receipt.

use std::{sync::Arc, time::Duration};

use mediator_types::{ContractGateway, TxReceipt};
use tracing::{debug, error, info, warn};

use crate::{broadcast::PendingTx, error::SubmitError};

pub struct MiningPoller<G: ?Sized> {
    gateway: Arc<G>,
    polling_interval: Duration,
    max_polls: u32,
}

impl<G: ContractGateway + ?Sized> MiningPoller<G> {
    pub fn new(gateway: Arc<G>, polling_interval: Duration, max_polls: u32) -> Self {
        Self {
            gateway,
            polling_interval,
            max_polls,
        }
    }

    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    /// Sleep one interval, then read the receipt, at most `max_polls` times.
    /// A failed receipt query counts as an empty poll.
    pub async fn await_inclusion(&self, pending: &PendingTx) -> Result<TxReceipt, SubmitError> {
        if pending.hash.is_zero() {
            error!(nonce = pending.nonce, "pending transaction has no hash");
            return Err(SubmitError::InvariantViolation("pending transaction has no hash"));
        }

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.polling_interval).await;
            match self.gateway.transaction_receipt(pending.hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    info!(
                        tx_hash = %pending.hash,
                        block = receipt.block_number,
                        gas_used = receipt.gas_used,
                        "transaction mined"
                    );
                    return Ok(receipt);
                }
                Ok(Some(receipt)) => {
                    warn!(
                        tx_hash = %pending.hash,
                        block = receipt.block_number,
                        "transaction reverted"
                    );
                    return Err(SubmitError::Reverted {
                        pending: *pending,
                        receipt,
                    });
                }
                Ok(None) => debug!(tx_hash = %pending.hash, poll, "receipt not available yet"),
                Err(e) => warn!(
                    tx_hash = %pending.hash,
                    poll,
                    error = %e,
                    "failed to fetch receipt, will retry"
                ),
            }
        }

        warn!(
            tx_hash = %pending.hash,
            polls = self.max_polls,
            "transaction not mined in time"
        );
        Err(SubmitError::MiningTimeout {
            pending: *pending,
            polls: self.max_polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use mediator_node_mock::{DemoScenario, FakeNode, MiningMode};
    use mediator_types::{ContractCall, ContractGateway, MediatorCall, TxHash, TxOptions, TxRequest};

    use super::MiningPoller;
    use crate::{broadcast::PendingTx, error::SubmitError};

    const INTERVAL: Duration = Duration::from_millis(4_000);

    async fn send(node: &FakeNode) -> PendingTx {
        let sent = node
            .send_transaction(TxRequest {
                call: ContractCall::Mediator(MediatorCall::SkipToNextQuarter),
                options: TxOptions::default(),
            })
            .await
            .unwrap();
        PendingTx {
            hash: sent.hash,
            nonce: sent.nonce,
            gas_price: sent.gas_price,
            gas_limit: sent.gas_limit,
            submitted_at: 0,
        }
    }

    fn poller(scenario: &DemoScenario) -> MiningPoller<FakeNode> {
        MiningPoller::new(Arc::clone(&scenario.node), INTERVAL, 20)
    }

    #[tokio::test(start_paused = true)]
    async fn never_mined_times_out_after_twenty_spaced_polls() {
        let scenario = DemoScenario::new();
        scenario.node.set_mining_mode(MiningMode::Never);
        let pending = send(&scenario.node).await;
        let start = tokio::time::Instant::now();

        let err = poller(&scenario).await_inclusion(&pending).await.unwrap_err();

        assert!(matches!(err, SubmitError::MiningTimeout { polls: 20, .. }));
        let polls = scenario.node.receipt_polls();
        assert_eq!(polls.len(), 20);
        let mut previous = start;
        for (hash, at) in polls {
            assert_eq!(hash, pending.hash);
            assert_eq!(at - previous, INTERVAL);
            previous = at;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn mined_after_some_polls() {
        let scenario = DemoScenario::new();
        scenario.node.set_mining_mode(MiningMode::AfterPolls(3));
        let pending = send(&scenario.node).await;

        let receipt = poller(&scenario).await_inclusion(&pending).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.tx_hash, pending.hash);
        assert_eq!(scenario.node.receipt_polls_for(pending.hash), 4);
        assert_eq!(scenario.node.mediator().quarter.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn revert_is_reported() {
        let scenario = DemoScenario::new();
        scenario.node.set_mining_mode(MiningMode::Revert);
        let pending = send(&scenario.node).await;

        let err = poller(&scenario).await_inclusion(&pending).await.unwrap_err();

        match err {
            SubmitError::Reverted { pending: p, receipt } => {
                assert_eq!(p, pending);
                assert!(!receipt.success);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_query_errors_count_as_empty_polls() {
        let scenario = DemoScenario::new();
        scenario.node.fail_next_receipt_queries(2);
        let pending = send(&scenario.node).await;

        let receipt = poller(&scenario).await_inclusion(&pending).await.unwrap();

        assert!(receipt.success);
        assert_eq!(scenario.node.receipt_polls_for(pending.hash), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_hash_fails_without_polling() {
        let scenario = DemoScenario::new();
        let pending = PendingTx {
            hash: TxHash::ZERO,
            nonce: 0,
            gas_price: 1,
            gas_limit: 1,
            submitted_at: 0,
        };

        let err = poller(&scenario).await_inclusion(&pending).await.unwrap_err();

        assert!(matches!(err, SubmitError::InvariantViolation(_)));
        assert!(scenario.node.receipt_polls().is_empty());
    }
}
