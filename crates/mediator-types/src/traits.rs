//! The node/contract boundary consumed by the client.

use alloy_primitives::U256;
use async_trait::async_trait;

use crate::{
    calls::{DisputeSummary, SentTx, TxReceipt, TxRequest},
    error::GatewayError,
    ids::{Address, ContentHash, TxHash},
    protocol::{Approval, Fill, Proof, Quarter, Round, Signature},
};

/// Call surface over a node and a deployed mediator contract, bound to one
/// signing key. Implementations may use an in-memory fake or a JSON-RPC node.
///
/// Futures are not required to be `Send`; callers drive them cooperatively.
#[async_trait(?Send)]
pub trait ContractGateway {
    fn signer_address(&self) -> Address;

    fn mediator_address(&self) -> Address;

    async fn pending_nonce(&self, address: Address) -> Result<u64, GatewayError>;

    async fn send_transaction(&self, request: TxRequest) -> Result<SentTx, GatewayError>;

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, GatewayError>;

    async fn ether_balance(&self, address: Address) -> Result<U256, GatewayError>;

    async fn current_round(&self) -> Result<Round, GatewayError>;

    async fn current_quarter(&self) -> Result<Quarter, GatewayError>;

    async fn halted(&self) -> Result<bool, GatewayError>;

    async fn halted_round(&self) -> Result<Round, GatewayError>;

    async fn halted_quarter(&self) -> Result<Quarter, GatewayError>;

    async fn round_size(&self) -> Result<U256, GatewayError>;

    async fn block_number_at_creation(&self) -> Result<u64, GatewayError>;

    async fn commits(&self, round: Round, token: Address) -> Result<ContentHash, GatewayError>;

    async fn active_withdrawal_rounds(
        &self,
        token: Address,
        client: Address,
    ) -> Result<Round, GatewayError>;

    async fn client_deposits(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError>;

    async fn total_deposits(&self, round: Round, token: Address) -> Result<U256, GatewayError>;

    async fn total_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
    ) -> Result<U256, GatewayError>;

    async fn client_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError>;

    async fn total_disputes(&self) -> Result<u64, GatewayError>;

    async fn dispute_summary(&self, client: Address) -> Result<DisputeSummary, GatewayError>;

    async fn number_of_fills_from_dispute(&self, client: Address) -> Result<u64, GatewayError>;

    async fn balances_array_length_from_dispute(
        &self,
        client: Address,
    ) -> Result<u64, GatewayError>;

    async fn balance_from_dispute(&self, client: Address, index: u64)
        -> Result<U256, GatewayError>;

    /// Entry `index` of the registered token array; the zero address marks
    /// the end.
    async fn registered_token_address(&self, index: u64) -> Result<Address, GatewayError>;

    async fn dispute_fill(&self, dispute_id: u64, fill_id: u64) -> Result<Fill, GatewayError>;

    async fn open_dispute_counters(&self, round: Round) -> Result<u64, GatewayError>;

    async fn compute_balances_induced_by_fills(
        &self,
        fills: &[Fill],
    ) -> Result<Vec<U256>, GatewayError>;

    async fn check_approval_sig(
        &self,
        approval: &Approval,
        signature: &Signature,
        client: Address,
    ) -> Result<bool, GatewayError>;

    async fn is_proof_valid(&self, proof: &Proof, round: Round) -> Result<bool, GatewayError>;

    async fn token_balance_of(&self, token: Address, owner: Address)
        -> Result<U256, GatewayError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError>;
}
