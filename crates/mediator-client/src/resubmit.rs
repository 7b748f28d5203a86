//! Resubmitter: broadcast, wait for inclusion and replace the transaction at
//! an escalated gas price until it is mined or the attempt budget runs out.

use std::sync::Arc;

use mediator_types::{ContractCall, ContractGateway, TxReceipt};
use tracing::{error, info, warn};

use crate::{
    broadcast::{escalate_gas_price, Broadcaster, PendingTx},
    config::SubmissionConfig,
    error::SubmitError,
    nonce_gate::NonceGate,
    poller::MiningPoller,
};

/// Progress of one escalating submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Broadcast+poll cycles started so far.
    pub attempt: u32,
    pub last: Option<PendingTx>,
    /// Earlier attempts at the same nonce, oldest first.
    pub superseded: Vec<PendingTx>,
}

impl RetryState {
    fn record(&mut self, pending: PendingTx) {
        if let Some(previous) = self.last.replace(pending) {
            self.superseded.push(previous);
        }
    }

    fn attempts_at_nonce(&self) -> impl Iterator<Item = &PendingTx> {
        self.superseded.iter().chain(self.last.iter())
    }
}

#[derive(Debug)]
enum Phase {
    Broadcasting,
    AwaitingInclusion(PendingTx),
    Escalating(SubmitError),
    Exhausted(SubmitError),
    Aborted(SubmitError),
}

pub struct Resubmitter<G: ?Sized> {
    broadcaster: Broadcaster<G>,
    poller: MiningPoller<G>,
}

impl<G: ContractGateway + ?Sized> Resubmitter<G> {
    pub fn new(gateway: Arc<G>, gate: Arc<NonceGate>, config: SubmissionConfig) -> Self {
        let poller = MiningPoller::new(
            Arc::clone(&gateway),
            config.polling_interval(),
            config.mining_polls,
        );
        Self {
            broadcaster: Broadcaster::new(gateway, gate, config),
            poller,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster<G> {
        &self.broadcaster
    }

    pub fn poller(&self) -> &MiningPoller<G> {
        &self.poller
    }

    fn config(&self) -> &SubmissionConfig {
        self.broadcaster.config()
    }

    /// One gated broadcast followed by one bounded inclusion wait.
    pub async fn send_once(
        &self,
        call: &ContractCall,
        gas_limit: Option<u64>,
    ) -> Result<TxReceipt, SubmitError> {
        let pending = self.broadcaster.broadcast(call, gas_limit, None).await?;
        self.poller.await_inclusion(&pending).await
    }

    /// Submit `call` and wait for it to be mined, replacing it at the same
    /// nonce with an escalated gas price after each failed wait. At most
    /// `retry_limit` broadcast+poll cycles are run.
    ///
    /// Every failure carries the attempt index and the last accepted
    /// transaction: `ExhaustedRetries` once the budget is spent, `Aborted`
    /// for anything that cannot be escalated.
    pub async fn submit_and_confirm(
        &self,
        call: &ContractCall,
        gas_limit: Option<u64>,
    ) -> Result<TxReceipt, SubmitError> {
        let retry_limit = self.config().retry_limit;
        let mut state = RetryState::default();
        let mut phase = Phase::Broadcasting;

        loop {
            phase = match phase {
                Phase::Broadcasting => {
                    state.attempt += 1;
                    match self
                        .broadcaster
                        .broadcast(call, gas_limit, state.last.as_ref())
                        .await
                    {
                        Ok(pending) => {
                            state.record(pending);
                            Phase::AwaitingInclusion(pending)
                        }
                        Err(err) => Phase::Aborted(err),
                    }
                }
                Phase::AwaitingInclusion(pending) => {
                    match self.poller.await_inclusion(&pending).await {
                        Ok(receipt) => return Ok(receipt),
                        Err(err) if !self.is_retryable(&err) => Phase::Aborted(err),
                        Err(err) => {
                            error!(
                                call = call.name(),
                                tx_hash = %pending.hash,
                                attempt = state.attempt,
                                error = %err,
                                "failed to mine transaction"
                            );
                            if state.attempt >= retry_limit {
                                Phase::Exhausted(err)
                            } else {
                                Phase::Escalating(err)
                            }
                        }
                    }
                }
                Phase::Escalating(cause) => {
                    if let Some(receipt) = self.mined_earlier_attempt(&state).await {
                        return Ok(receipt);
                    }
                    if let Some(last) = &state.last {
                        warn!(
                            call = call.name(),
                            nonce = last.nonce,
                            gas_price = escalate_gas_price(last.gas_price),
                            attempt = state.attempt + 1,
                            cause = %cause,
                            "resubmitting with higher gas price"
                        );
                    }
                    Phase::Broadcasting
                }
                Phase::Exhausted(cause) => {
                    if let Some(receipt) = self.mined_earlier_attempt(&state).await {
                        return Ok(receipt);
                    }
                    let Some(last) = state.last else {
                        return Err(SubmitError::Aborted {
                            attempt: state.attempt,
                            last: None,
                            cause: Box::new(cause),
                        });
                    };
                    error!(
                        call = call.name(),
                        attempts = state.attempt,
                        tx_hash = %last.hash,
                        "giving up on transaction"
                    );
                    return Err(SubmitError::ExhaustedRetries {
                        attempts: state.attempt,
                        last,
                        cause: Box::new(cause),
                    });
                }
                Phase::Aborted(cause) => {
                    // A rejected replacement may mean an earlier copy already
                    // took the nonce.
                    if let Some(receipt) = self.mined_earlier_attempt(&state).await {
                        return Ok(receipt);
                    }
                    error!(
                        call = call.name(),
                        attempt = state.attempt,
                        last = ?state.last.map(|last| last.hash),
                        error = %cause,
                        "submission aborted"
                    );
                    return Err(SubmitError::Aborted {
                        attempt: state.attempt,
                        last: state.last,
                        cause: Box::new(cause),
                    });
                }
            };
        }
    }

    fn is_retryable(&self, err: &SubmitError) -> bool {
        match err {
            SubmitError::MiningTimeout { .. } => true,
            SubmitError::Reverted { .. } => self.config().retry_on_revert,
            _ => false,
        }
    }

    /// A replaced transaction can still be mined after its wait timed out;
    /// check every attempt at the nonce once before escalating or giving up.
    async fn mined_earlier_attempt(&self, state: &RetryState) -> Option<TxReceipt> {
        for pending in state.attempts_at_nonce() {
            match self.broadcaster.gateway().transaction_receipt(pending.hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    info!(
                        tx_hash = %pending.hash,
                        gas_price = pending.gas_price,
                        "earlier attempt was mined"
                    );
                    return Some(receipt);
                }
                Ok(_) => {}
                Err(e) => warn!(tx_hash = %pending.hash, error = %e, "failed to fetch receipt"),
            }
        }
        None
    }
}
