//! MediatorClient: state-changing calls on the mediator contract.

use std::sync::Arc;

use mediator_types::{
    Address, Approval, AuthorizationMessage, ContractCall, ContractGateway, Fill, MediatorCall,
    Proof, Round, RootInfo, Signature, TxReceipt, U256,
};
use tracing::info;

use crate::{
    config::SubmissionConfig,
    error::{MediatorError, SubmitError},
    nonce_gate::NonceGate,
    queries::MediatorQueries,
    resubmit::Resubmitter,
};

pub struct MediatorClient<G: ?Sized> {
    queries: MediatorQueries<G>,
    submitter: Resubmitter<G>,
    commit_gas_limit: u64,
}

impl<G: ContractGateway + ?Sized> MediatorClient<G> {
    /// Build a client with a gate of its own. Nonces are only serialized
    /// among writes of this client: when several clients sign with the same
    /// key, build them with [`Self::with_gate`] and one shared gate.
    pub fn new(gateway: Arc<G>, config: SubmissionConfig) -> Result<Self, MediatorError> {
        Self::with_gate(gateway, Arc::new(NonceGate::new()), config)
    }

    /// Build a client that allocates nonces through `gate`, shared with
    /// other clients signing with the same key.
    pub fn with_gate(
        gateway: Arc<G>,
        gate: Arc<NonceGate>,
        config: SubmissionConfig,
    ) -> Result<Self, MediatorError> {
        config.validate()?;
        info!(
            gas_price = config.gas_price,
            gas_limit = config.gas_limit,
            mediator = %gateway.mediator_address(),
            "mediator client ready"
        );
        Ok(Self {
            queries: MediatorQueries::new(Arc::clone(&gateway)),
            commit_gas_limit: config.commit_gas_limit,
            submitter: Resubmitter::new(gateway, gate, config),
        })
    }

    pub fn queries(&self) -> &MediatorQueries<G> {
        &self.queries
    }

    pub fn gate(&self) -> &Arc<NonceGate> {
        self.submitter.broadcaster().gate()
    }

    pub fn config(&self) -> &SubmissionConfig {
        self.submitter.broadcaster().config()
    }

    pub fn address(&self) -> Address {
        self.queries.mediator_address()
    }

    /// Submit with gas escalation until mined or the retry budget is spent.
    pub async fn submit_and_confirm(
        &self,
        call: MediatorCall,
        gas_limit: Option<u64>,
    ) -> Result<TxReceipt, SubmitError> {
        self.submitter
            .submit_and_confirm(&ContractCall::Mediator(call), gas_limit)
            .await
    }

    /// One broadcast and one bounded wait for inclusion.
    pub async fn send_once(&self, call: MediatorCall) -> Result<TxReceipt, SubmitError> {
        let call = ContractCall::Mediator(call);
        let receipt = self.submitter.send_once(&call, None).await?;
        info!(call = call.name(), tx_hash = %receipt.tx_hash, "transaction confirmed");
        Ok(receipt)
    }

    pub async fn commit(&self, root: RootInfo, token: Address) -> Result<TxReceipt, MediatorError> {
        let content = root.content;
        let receipt = self
            .submit_and_confirm(
                MediatorCall::Commit { root, token },
                Some(self.commit_gas_limit),
            )
            .await?;
        info!(token = %token, content = %content, "root committed");
        Ok(receipt)
    }

    pub async fn initiate_withdrawal(
        &self,
        proof: Proof,
        amount: U256,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::InitiateWithdrawal { proof, amount })
            .await?)
    }

    pub async fn confirm_withdrawal(&self, token: Address) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::ConfirmWithdrawal { token })
            .await?)
    }

    pub async fn cancel_withdrawal(
        &self,
        approvals: Vec<Approval>,
        signatures: Vec<Signature>,
        token: Address,
        client: Address,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::CancelWithdrawal {
                approvals,
                signatures,
                token,
                client,
            })
            .await?)
    }

    pub async fn deposit_tokens(
        &self,
        token: Address,
        amount: U256,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::DepositTokens { token, amount })
            .await?)
    }

    pub async fn register_token(&self, token: Address) -> Result<TxReceipt, MediatorError> {
        Ok(self.send_once(MediatorCall::RegisterToken { token }).await?)
    }

    pub async fn unregister_token(&self, token: Address) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::UnregisterToken { token })
            .await?)
    }

    pub async fn skip_to_next_round(&self) -> Result<TxReceipt, MediatorError> {
        Ok(self.send_once(MediatorCall::SkipToNextRound).await?)
    }

    pub async fn skip_to_next_quarter(&self) -> Result<TxReceipt, MediatorError> {
        Ok(self.send_once(MediatorCall::SkipToNextQuarter).await?)
    }

    /// Ask the contract to re-evaluate its halt condition; returns the halted
    /// flag as read after the call was mined.
    pub async fn update_halted_state(&self) -> Result<bool, MediatorError> {
        self.send_once(MediatorCall::UpdateHaltedState).await?;
        let halted = self.queries.is_halted().await?;
        info!(halted, "halted state updated");
        Ok(halted)
    }

    pub async fn open_dispute(
        &self,
        proofs: Vec<Proof>,
        fills: Vec<Fill>,
        fill_signatures: Vec<Signature>,
        authorization: AuthorizationMessage,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::OpenDispute {
                proofs,
                fills,
                fill_signatures,
                authorization,
            })
            .await?)
    }

    pub async fn close_dispute(
        &self,
        proofs: Vec<Proof>,
        approvals: Vec<Approval>,
        approval_signatures: Vec<Signature>,
        fills: Vec<Fill>,
        fill_signatures: Vec<Signature>,
        client: Address,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::CloseDispute {
                proofs,
                approvals,
                approval_signatures,
                fills,
                fill_signatures,
                client,
            })
            .await?)
    }

    pub async fn recover_all_funds(&self, proof: Proof) -> Result<TxReceipt, MediatorError> {
        Ok(self.send_once(MediatorCall::RecoverAllFunds { proof }).await?)
    }

    pub async fn recover_on_chain_funds_only(
        &self,
        token: Address,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::RecoverOnChainFundsOnly { token })
            .await?)
    }

    pub async fn halt(&self) -> Result<TxReceipt, MediatorError> {
        Ok(self.send_once(MediatorCall::Halt).await?)
    }

    // Setters below exist only on the test build of the contract.

    pub async fn set_open_dispute_counter(
        &self,
        round: Round,
        count: u64,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::SetOpenDisputeCounter { round, count })
            .await?)
    }

    pub async fn set_dispute_summary_counter(
        &self,
        client: Address,
        counter: u64,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::SetDisputeSummaryCounter { client, counter })
            .await?)
    }

    pub async fn set_previous_opening_balance_client(
        &self,
        client: Address,
        opening_balance: U256,
        position: u64,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::SetPreviousOpeningBalanceClient {
                client,
                opening_balance,
                position,
            })
            .await?)
    }

    pub async fn set_total_withdrawal_amount(
        &self,
        round: Round,
        token: Address,
        amount: U256,
    ) -> Result<TxReceipt, MediatorError> {
        Ok(self
            .send_once(MediatorCall::SetTotalWithdrawalAmount {
                round,
                token,
                amount,
            })
            .await?)
    }
}
