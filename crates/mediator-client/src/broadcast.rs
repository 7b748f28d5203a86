//! Broadcaster: gets a transaction accepted by the node, retrying transport
//! failures, and escalates fees when replacing a stuck transaction.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use mediator_types::{ContractCall, ContractGateway, SentTx, TxHash, TxOptions, TxRequest};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{config::SubmissionConfig, error::SubmitError, nonce_gate::NonceGate};

/// A transaction accepted by the node and not yet known to be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub hash: TxHash,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub submitted_at: u64,
}

impl PendingTx {
    fn from_sent(sent: SentTx) -> Self {
        Self {
            hash: sent.hash,
            nonce: sent.nonce,
            gas_price: sent.gas_price,
            gas_limit: sent.gas_limit,
            submitted_at: unix_millis(),
        }
    }
}

/// Gas price for the replacement of a transaction priced at `previous`:
/// `ceil(1.1 * previous)`, in integer arithmetic.
pub fn escalate_gas_price(previous: u128) -> u128 {
    previous.saturating_mul(11).saturating_add(9) / 10
}

pub struct Broadcaster<G: ?Sized> {
    gateway: Arc<G>,
    gate: Arc<NonceGate>,
    config: SubmissionConfig,
}

impl<G: ContractGateway + ?Sized> Broadcaster<G> {
    pub fn new(gateway: Arc<G>, gate: Arc<NonceGate>, config: SubmissionConfig) -> Self {
        Self {
            gateway,
            gate,
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn gate(&self) -> &Arc<NonceGate> {
        &self.gate
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Broadcast `call`. Without `previous` a fresh nonce is taken through the
    /// gate and the configured fees apply, `gas_limit` overriding the
    /// configured limit. With `previous` the transaction replaces it: same
    /// nonce and limit, escalated gas price.
    pub async fn broadcast(
        &self,
        call: &ContractCall,
        gas_limit: Option<u64>,
        previous: Option<&PendingTx>,
    ) -> Result<PendingTx, SubmitError> {
        let limit = self.config.submission_limit;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = match previous {
                Some(previous) => self.replace(call, previous).await,
                None => self.send_fresh(call, gas_limit).await,
            };
            match result {
                Ok(sent) => {
                    let pending = PendingTx::from_sent(sent);
                    info!(
                        call = call.name(),
                        nonce = pending.nonce,
                        gas_price = pending.gas_price,
                        gas_limit = pending.gas_limit,
                        tx_hash = %pending.hash,
                        "transaction sent"
                    );
                    return Ok(pending);
                }
                Err(source) if attempt >= limit => {
                    error!(
                        call = call.name(),
                        attempts = attempt,
                        error = %source,
                        "failed to submit transaction"
                    );
                    return Err(SubmitError::Submission {
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        call = call.name(),
                        attempt,
                        error = %e,
                        "failed to submit transaction, retrying"
                    );
                    tokio::time::sleep(self.config.polling_interval()).await;
                }
            }
        }
    }

    async fn send_fresh(
        &self,
        call: &ContractCall,
        gas_limit: Option<u64>,
    ) -> Result<SentTx, mediator_types::GatewayError> {
        let gateway = self.gateway.as_ref();
        self.gate
            .with_nonce(gateway, |nonce| {
                let request = TxRequest {
                    call: call.clone(),
                    options: TxOptions {
                        nonce: Some(nonce),
                        gas_price: self.config.gas_price_override(),
                        gas_limit: gas_limit.or(self.config.gas_limit_override()),
                    },
                };
                gateway.send_transaction(request)
            })
            .await
    }

    async fn replace(
        &self,
        call: &ContractCall,
        previous: &PendingTx,
    ) -> Result<SentTx, mediator_types::GatewayError> {
        let request = TxRequest {
            call: call.clone(),
            options: TxOptions {
                nonce: Some(previous.nonce),
                gas_price: Some(escalate_gas_price(previous.gas_price)),
                gas_limit: Some(previous.gas_limit),
            },
        };
        self.gateway.send_transaction(request).await
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
