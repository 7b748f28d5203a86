//! MediatorQueries: read-side access to mediator and chain state.
//!
//! Reads are passed straight through, without retry. The token registry and
//! dispute balances are walked one index at a time since each step depends
//! on the previous answer.

use std::sync::Arc;

use futures::{stream, Stream, StreamExt, TryStreamExt};
use mediator_types::{
    Address, Approval, ContentHash, ContractGateway, Dispute, Fill, GatewayError, Proof, Quarter,
    Round, Signature, U256,
};
use tracing::debug;

pub struct MediatorQueries<G: ?Sized> {
    gateway: Arc<G>,
}

impl<G: ContractGateway + ?Sized> MediatorQueries<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn mediator_address(&self) -> Address {
        self.gateway.mediator_address()
    }

    pub async fn current_round(&self) -> Result<Round, GatewayError> {
        self.gateway.current_round().await
    }

    pub async fn current_quarter(&self) -> Result<Quarter, GatewayError> {
        self.gateway.current_quarter().await
    }

    pub async fn is_halted(&self) -> Result<bool, GatewayError> {
        self.gateway.halted().await
    }

    /// Last round before the contract halted.
    pub async fn last_active_round(&self) -> Result<Round, GatewayError> {
        self.gateway.halted_round().await
    }

    pub async fn last_active_quarter(&self) -> Result<Quarter, GatewayError> {
        self.gateway.halted_quarter().await
    }

    pub async fn round_size(&self) -> Result<U256, GatewayError> {
        self.gateway.round_size().await
    }

    pub async fn block_number_at_creation(&self) -> Result<u64, GatewayError> {
        self.gateway.block_number_at_creation().await
    }

    pub async fn commit(&self, round: Round, token: Address) -> Result<ContentHash, GatewayError> {
        self.gateway.commits(round, token).await
    }

    pub async fn active_withdrawal_round(
        &self,
        token: Address,
        client: Address,
    ) -> Result<Round, GatewayError> {
        self.gateway.active_withdrawal_rounds(token, client).await
    }

    pub async fn client_deposits(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        self.gateway.client_deposits(round, token, client).await
    }

    pub async fn total_deposits(&self, round: Round, token: Address) -> Result<U256, GatewayError> {
        self.gateway.total_deposits(round, token).await
    }

    pub async fn total_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
    ) -> Result<U256, GatewayError> {
        self.gateway.total_requested_withdrawals(round, token).await
    }

    pub async fn requested_withdrawal(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        self.gateway
            .client_requested_withdrawals(round, token, client)
            .await
    }

    pub async fn total_disputes(&self) -> Result<u64, GatewayError> {
        self.gateway.total_disputes().await
    }

    pub async fn open_dispute_counter(&self, round: Round) -> Result<u64, GatewayError> {
        self.gateway.open_dispute_counters(round).await
    }

    /// Ether held by the mediator contract.
    pub async fn contract_balance(&self) -> Result<U256, GatewayError> {
        self.gateway
            .ether_balance(self.gateway.mediator_address())
            .await
    }

    pub async fn balances_induced_by_fills(
        &self,
        fills: &[Fill],
    ) -> Result<Vec<U256>, GatewayError> {
        self.gateway.compute_balances_induced_by_fills(fills).await
    }

    pub async fn check_approval_signature(
        &self,
        approval: &Approval,
        signature: &Signature,
        client: Address,
    ) -> Result<bool, GatewayError> {
        self.gateway
            .check_approval_sig(approval, signature, client)
            .await
    }

    pub async fn is_proof_valid(&self, proof: &Proof, round: Round) -> Result<bool, GatewayError> {
        self.gateway.is_proof_valid(proof, round).await
    }

    /// Registered tokens in registry order. Each element is read only when
    /// polled; the stream ends at the first zero address or error.
    pub fn registered_tokens_stream(
        &self,
    ) -> impl Stream<Item = Result<Address, GatewayError>> + '_ {
        let gateway = &self.gateway;
        stream::unfold(Some(0u64), move |next| async move {
            let index = next?;
            match gateway.registered_token_address(index).await {
                Ok(token) if token.is_zero() => None,
                Ok(token) => Some((Ok(token), index.checked_add(1))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    pub async fn registered_tokens(&self) -> Result<Vec<Address>, GatewayError> {
        let tokens: Vec<Address> = self.registered_tokens_stream().try_collect().await?;
        debug!(count = tokens.len(), "read token registry");
        Ok(tokens)
    }

    /// Opening balances recorded for `client`'s dispute, indices `0..len`
    /// read in order.
    pub fn dispute_balances_stream(
        &self,
        client: Address,
        len: u64,
    ) -> impl Stream<Item = Result<U256, GatewayError>> + '_ {
        let gateway = &self.gateway;
        stream::iter(0..len).then(move |index| gateway.balance_from_dispute(client, index))
    }

    /// Assemble the dispute record for `client`. Fill bodies are not read;
    /// use [`Self::fill_from_dispute`] for those.
    pub async fn dispute(&self, client: Address) -> Result<Dispute, GatewayError> {
        let summary = self.gateway.dispute_summary(client).await?;
        let fill_count = self.gateway.number_of_fills_from_dispute(client).await?;
        let len = self
            .gateway
            .balances_array_length_from_dispute(client)
            .await?;
        let opening_balances: Vec<U256> = self
            .dispute_balances_stream(client, len)
            .try_collect()
            .await?;
        debug!(
            client = %client,
            open = summary.open,
            fill_count,
            balances = opening_balances.len(),
            "assembled dispute"
        );
        Ok(Dispute {
            client,
            open: summary.open,
            round: summary.round,
            quarter: summary.quarter,
            fill_count,
            opening_balances,
        })
    }

    pub async fn fill_from_dispute(
        &self,
        dispute_id: u64,
        fill_id: u64,
    ) -> Result<Fill, GatewayError> {
        self.gateway.dispute_fill(dispute_id, fill_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use mediator_node_mock::{DemoScenario, FakeNode, MockMediator};
    use mediator_types::{Address, DisputeSummary, Fill, Quarter, U256};

    use super::MediatorQueries;

    fn node_with(mediator: MockMediator) -> Arc<FakeNode> {
        Arc::new(FakeNode::new(
            Address::new([0x0a; 20]),
            Address::new([0x4d; 20]),
            mediator,
        ))
    }

    #[tokio::test]
    async fn token_scan_stops_at_zero_address() {
        let a = Address::new([0xaa; 20]);
        let b = Address::new([0xbb; 20]);
        let node = node_with(MockMediator {
            registered_tokens: vec![a, b],
            ..MockMediator::default()
        });
        let queries = MediatorQueries::new(Arc::clone(&node));

        assert_eq!(queries.registered_tokens().await.unwrap(), vec![a, b]);
        let reads = node.reads();
        assert_eq!(reads, vec!["registeredTokensAddresses"; 3]);
    }

    #[tokio::test]
    async fn token_scan_of_empty_registry() {
        let node = node_with(MockMediator::default());
        let queries = MediatorQueries::new(Arc::clone(&node));

        assert!(queries.registered_tokens().await.unwrap().is_empty());
        assert_eq!(node.reads().len(), 1);
    }

    #[tokio::test]
    async fn token_stream_is_lazy() {
        let scenario = DemoScenario::new();
        let queries = MediatorQueries::new(Arc::clone(&scenario.node));

        let mut tokens = Box::pin(queries.registered_tokens_stream());
        assert!(scenario.node.reads().is_empty());
        let first = tokens.next().await.unwrap().unwrap();
        assert_eq!(first, scenario.accounts.oax);
        assert_eq!(scenario.node.reads().len(), 1);
    }

    #[tokio::test]
    async fn dispute_assembly_reads_balances_but_not_fills() {
        let client = Address::new([0x01; 20]);
        let b0 = U256::from(150u64);
        let b1 = U256::from(15u64);
        let mut mediator = MockMediator::default();
        mediator.insert_dispute(
            client,
            DisputeSummary {
                open: true,
                round: 4,
                quarter: Quarter::new(2).unwrap(),
            },
            3,
            vec![b0, b1],
        );
        let node = node_with(mediator);
        let queries = MediatorQueries::new(Arc::clone(&node));

        let dispute = queries.dispute(client).await.unwrap();

        assert_eq!(dispute.client, client);
        assert!(dispute.open);
        assert_eq!(dispute.round, 4);
        assert_eq!(dispute.quarter.get(), 2);
        assert_eq!(dispute.fill_count, 3);
        assert_eq!(dispute.opening_balances, vec![b0, b1]);
        assert_eq!(
            node.reads(),
            vec![
                "disputes",
                "getNumberOfFillsFromDispute",
                "getBalancesArrayLengthFromDispute",
                "getBalanceFromDispute",
                "getBalanceFromDispute",
            ]
        );
    }

    #[tokio::test]
    async fn fill_lookup_by_dispute_and_fill_id() {
        let client = Address::new([0x01; 20]);
        let fill = Fill {
            fill_id: U256::from(9u64),
            approval_id: U256::from(3u64),
            round: 1,
            buy_amount: U256::from(10u64),
            buy_asset: Address::new([0xaa; 20]),
            sell_amount: U256::from(2u64),
            sell_asset: Address::new([0xbb; 20]),
            client,
            instance_id: Address::new([0x4d; 20]),
        };
        let mut mediator = MockMediator::default();
        mediator.dispute_fills.insert((1, 9), fill.clone());
        let queries = MediatorQueries::new(node_with(mediator));

        assert_eq!(queries.fill_from_dispute(1, 9).await.unwrap(), fill);
        assert!(queries.fill_from_dispute(1, 10).await.is_err());
    }

    #[tokio::test]
    async fn scalar_reads_pass_through() {
        let scenario = DemoScenario::new();
        let queries = MediatorQueries::new(Arc::clone(&scenario.node));

        assert_eq!(queries.current_round().await.unwrap(), 1);
        assert_eq!(queries.current_quarter().await.unwrap().get(), 0);
        assert!(!queries.is_halted().await.unwrap());
        assert_eq!(queries.block_number_at_creation().await.unwrap(), 12);
        assert_eq!(queries.round_size().await.unwrap(), U256::from(100u64));
        assert_eq!(
            queries.contract_balance().await.unwrap(),
            U256::from(5_000_000u64)
        );
        assert_eq!(queries.total_disputes().await.unwrap(), 0);
    }
}
