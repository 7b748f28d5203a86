//! TokenClient: ERC-20 style token reads and writes for one token.

use std::sync::Arc;

use mediator_types::{Address, ContractCall, ContractGateway, TokenCall, TxReceipt, U256};
use tracing::info;

use crate::{
    config::SubmissionConfig,
    error::{MediatorError, SubmitError},
    nonce_gate::NonceGate,
    resubmit::Resubmitter,
};

pub struct TokenClient<G: ?Sized> {
    token: Address,
    gateway: Arc<G>,
    submitter: Resubmitter<G>,
}

impl<G: ContractGateway + ?Sized> TokenClient<G> {
    pub fn new(
        gateway: Arc<G>,
        gate: Arc<NonceGate>,
        token: Address,
        config: SubmissionConfig,
    ) -> Result<Self, MediatorError> {
        config.validate()?;
        Ok(Self {
            token,
            gateway: Arc::clone(&gateway),
            submitter: Resubmitter::new(gateway, gate, config),
        })
    }

    pub fn address(&self) -> Address {
        self.token
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, MediatorError> {
        Ok(self.gateway.token_balance_of(self.token, owner).await?)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, MediatorError> {
        Ok(self
            .gateway
            .token_allowance(self.token, owner, spender)
            .await?)
    }

    pub async fn approve(&self, spender: Address, amount: U256) -> Result<TxReceipt, MediatorError> {
        let receipt = self.send(TokenCall::Approve { spender, amount }).await?;
        info!(token = %self.token, spender = %spender, amount = %amount, "allowance approved");
        Ok(receipt)
    }

    /// Withdraw the caller's wrapped balance; returns the gas used.
    pub async fn withdraw(&self) -> Result<u64, MediatorError> {
        let receipt = self.send(TokenCall::Withdraw).await?;
        Ok(receipt.gas_used)
    }

    async fn send(&self, call: TokenCall) -> Result<TxReceipt, SubmitError> {
        let call = ContractCall::Token {
            token: self.token,
            call,
        };
        self.submitter.send_once(&call, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mediator_node_mock::DemoScenario;
    use mediator_types::U256;

    use super::TokenClient;
    use crate::{config::SubmissionConfig, nonce_gate::NonceGate};

    #[tokio::test(start_paused = true)]
    async fn approve_then_read_allowance() {
        let scenario = DemoScenario::new();
        let accounts = scenario.accounts;
        let token = TokenClient::new(
            Arc::clone(&scenario.node),
            Arc::new(NonceGate::new()),
            accounts.oax,
            SubmissionConfig::default(),
        )
        .unwrap();

        assert_eq!(
            token.balance_of(accounts.alice).await.unwrap(),
            U256::from(150u64)
        );
        token
            .approve(accounts.mediator, U256::from(40u64))
            .await
            .unwrap();
        assert_eq!(
            token
                .allowance(accounts.operator, accounts.mediator)
                .await
                .unwrap(),
            U256::from(40u64)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn withdraw_reports_gas_used() {
        let scenario = DemoScenario::new();
        let token = TokenClient::new(
            Arc::clone(&scenario.node),
            Arc::new(NonceGate::new()),
            scenario.accounts.weth,
            SubmissionConfig::default(),
        )
        .unwrap();
        assert!(token.withdraw().await.unwrap() > 0);
    }
}
