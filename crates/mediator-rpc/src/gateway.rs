//! RpcGateway: `ContractGateway` over a JSON-RPC node, signing legacy
//! transactions with a local private key.

use alloy_consensus::{transaction::SignableTransaction, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address as AlloyAddress, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use mediator_types::{
    Address, Approval, ContentHash, ContractGateway, DisputeSummary, Fill, GatewayError, Proof,
    Quarter, Round, SentTx, Signature, TxHash, TxReceipt, TxRequest,
};
use tracing::{debug, info};
use url::Url;

use crate::abi::{
    self, approval_to_sol, fill_from_sol, fill_to_sol, from_alloy_address, from_b256,
    proof_to_sol, round_to_u256, sol, to_alloy_address, to_b256, u256_to_quarter, u256_to_u64,
};

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: Url,
    pub mediator: Address,
    /// Hex-encoded secp256k1 key, with or without `0x`.
    pub private_key: String,
}

pub struct RpcGateway {
    provider: DynProvider,
    signer: PrivateKeySigner,
    mediator: AlloyAddress,
    chain_id: u64,
}

fn rpc_error(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Rpc(err.to_string())
}

impl RpcGateway {
    pub fn new(
        provider: DynProvider,
        signer: PrivateKeySigner,
        mediator: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            provider,
            signer,
            mediator: to_alloy_address(mediator),
            chain_id,
        }
    }

    /// Connect over HTTP and read the chain id.
    pub async fn connect(config: &RpcConfig) -> Result<Self, GatewayError> {
        let signer: PrivateKeySigner = config
            .private_key
            .trim()
            .parse()
            .map_err(|e| GatewayError::Rpc(format!("invalid private key: {e}")))?;
        let provider = ProviderBuilder::new()
            .connect_http(config.url.clone())
            .erased();
        let chain_id = provider.get_chain_id().await.map_err(rpc_error)?;
        info!(
            url = config.url.as_str(),
            chain_id,
            signer = %signer.address(),
            mediator = %config.mediator,
            "connected to node"
        );
        Ok(Self::new(provider, signer, config.mediator, chain_id))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn request(&self, to: AlloyAddress, input: Bytes) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.signer.address())
            .to(to)
            .input(input.into())
    }

    async fn call_at<C: SolCall>(&self, to: AlloyAddress, call: C) -> Result<C::Return, GatewayError> {
        let output = self
            .provider
            .call(self.request(to, call.abi_encode().into()))
            .await
            .map_err(rpc_error)?;
        C::abi_decode_returns(&output).map_err(|e| GatewayError::Decode {
            call: C::SIGNATURE,
            message: e.to_string(),
        })
    }

    async fn mediator_call<C: SolCall>(&self, call: C) -> Result<C::Return, GatewayError> {
        self.call_at(self.mediator, call).await
    }
}

#[async_trait(?Send)]
impl ContractGateway for RpcGateway {
    fn signer_address(&self) -> Address {
        from_alloy_address(self.signer.address())
    }

    fn mediator_address(&self) -> Address {
        from_alloy_address(self.mediator)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, GatewayError> {
        self.provider
            .get_transaction_count(to_alloy_address(address))
            .pending()
            .await
            .map_err(rpc_error)
    }

    async fn send_transaction(&self, request: TxRequest) -> Result<SentTx, GatewayError> {
        let (to, input) = abi::encode_call(self.mediator, &request.call);
        let nonce = match request.options.nonce {
            Some(nonce) => nonce,
            None => self.pending_nonce(self.signer_address()).await?,
        };
        let gas_price = match request.options.gas_price {
            Some(price) => price,
            None => self.provider.get_gas_price().await.map_err(rpc_error)?,
        };
        let gas_limit = match request.options.gas_limit {
            Some(limit) => limit,
            None => self
                .provider
                .estimate_gas(self.request(to, input.clone()))
                .await
                .map_err(rpc_error)?,
        };

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: to.into(),
            value: U256::ZERO,
            input,
        };
        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| GatewayError::Rpc(format!("signing failed: {e}")))?;
        let signed = tx.into_signed(signature);
        let hash = from_b256(*signed.hash());

        self.provider
            .send_raw_transaction(&signed.encoded_2718())
            .await
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;
        debug!(call = request.call.name(), tx_hash = %hash, nonce, "raw transaction accepted");

        Ok(SentTx {
            hash,
            nonce,
            gas_price,
            gas_limit,
        })
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, GatewayError> {
        let receipt = self
            .provider
            .get_transaction_receipt(to_b256(hash))
            .await
            .map_err(rpc_error)?;
        Ok(receipt.map(|r| TxReceipt {
            tx_hash: from_b256(r.transaction_hash),
            success: r.status(),
            block_number: r.block_number,
            gas_used: r.gas_used,
            contract_address: r.contract_address.map(from_alloy_address),
        }))
    }

    async fn ether_balance(&self, address: Address) -> Result<U256, GatewayError> {
        self.provider
            .get_balance(to_alloy_address(address))
            .await
            .map_err(rpc_error)
    }

    async fn current_round(&self) -> Result<Round, GatewayError> {
        let round = self
            .mediator_call(sol::IMediator::getCurrentRoundCall {})
            .await?;
        u256_to_u64(round, "round")
    }

    async fn current_quarter(&self) -> Result<Quarter, GatewayError> {
        let quarter = self
            .mediator_call(sol::IMediator::getCurrentQuarterCall {})
            .await?;
        u256_to_quarter(quarter, "quarter")
    }

    async fn halted(&self) -> Result<bool, GatewayError> {
        self.mediator_call(sol::IMediator::haltedCall {}).await
    }

    async fn halted_round(&self) -> Result<Round, GatewayError> {
        let round = self.mediator_call(sol::IMediator::haltedRoundCall {}).await?;
        u256_to_u64(round, "haltedRound")
    }

    async fn halted_quarter(&self) -> Result<Quarter, GatewayError> {
        let quarter = self
            .mediator_call(sol::IMediator::haltedQuarterCall {})
            .await?;
        u256_to_quarter(quarter, "haltedQuarter")
    }

    async fn round_size(&self) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::roundSizeCall {}).await
    }

    async fn block_number_at_creation(&self) -> Result<u64, GatewayError> {
        let block = self
            .mediator_call(sol::IMediator::blockNumberAtCreationCall {})
            .await?;
        u256_to_u64(block, "blockNumberAtCreation")
    }

    async fn commits(&self, round: Round, token: Address) -> Result<ContentHash, GatewayError> {
        let content = self
            .mediator_call(sol::IMediator::commitsCall {
                round: round_to_u256(round),
                tokenAddress: to_alloy_address(token),
            })
            .await?;
        Ok(ContentHash::new(content.0))
    }

    async fn active_withdrawal_rounds(
        &self,
        token: Address,
        client: Address,
    ) -> Result<Round, GatewayError> {
        let round = self
            .mediator_call(sol::IMediator::activeWithdrawalRoundsCall {
                tokenAddress: to_alloy_address(token),
                clientAddress: to_alloy_address(client),
            })
            .await?;
        u256_to_u64(round, "activeWithdrawalRounds")
    }

    async fn client_deposits(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::clientDepositsCall {
            round: round_to_u256(round),
            tokenAddress: to_alloy_address(token),
            clientAddress: to_alloy_address(client),
        })
        .await
    }

    async fn total_deposits(&self, round: Round, token: Address) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::totalDepositsCall {
            round: round_to_u256(round),
            tokenAddress: to_alloy_address(token),
        })
        .await
    }

    async fn total_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
    ) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::totalRequestedWithdrawalsCall {
            round: round_to_u256(round),
            tokenAddress: to_alloy_address(token),
        })
        .await
    }

    async fn client_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::clientRequestedWithdrawalsCall {
            round: round_to_u256(round),
            tokenAddress: to_alloy_address(token),
            clientAddress: to_alloy_address(client),
        })
        .await
    }

    async fn total_disputes(&self) -> Result<u64, GatewayError> {
        let total = self
            .mediator_call(sol::IMediator::totalDisputesCall {})
            .await?;
        u256_to_u64(total, "totalDisputes")
    }

    async fn dispute_summary(&self, client: Address) -> Result<DisputeSummary, GatewayError> {
        let summary = self
            .mediator_call(sol::IMediator::disputesCall {
                clientAddress: to_alloy_address(client),
            })
            .await?;
        Ok(DisputeSummary {
            open: summary.open,
            round: u256_to_u64(summary.round, "disputes.round")?,
            quarter: u256_to_quarter(summary.quarter, "disputes.quarter")?,
        })
    }

    async fn number_of_fills_from_dispute(&self, client: Address) -> Result<u64, GatewayError> {
        let count = self
            .mediator_call(sol::IMediator::getNumberOfFillsFromDisputeCall {
                clientAddress: to_alloy_address(client),
            })
            .await?;
        u256_to_u64(count, "numberOfFills")
    }

    async fn balances_array_length_from_dispute(
        &self,
        client: Address,
    ) -> Result<u64, GatewayError> {
        let len = self
            .mediator_call(sol::IMediator::getBalancesArrayLengthFromDisputeCall {
                clientAddress: to_alloy_address(client),
            })
            .await?;
        u256_to_u64(len, "balancesArrayLength")
    }

    async fn balance_from_dispute(
        &self,
        client: Address,
        index: u64,
    ) -> Result<U256, GatewayError> {
        self.mediator_call(sol::IMediator::getBalanceFromDisputeCall {
            clientAddress: to_alloy_address(client),
            index: U256::from(index),
        })
        .await
    }

    async fn registered_token_address(&self, index: u64) -> Result<Address, GatewayError> {
        let token = self
            .mediator_call(sol::IMediator::registeredTokensAddressesCall {
                index: U256::from(index),
            })
            .await?;
        Ok(from_alloy_address(token))
    }

    async fn dispute_fill(&self, dispute_id: u64, fill_id: u64) -> Result<Fill, GatewayError> {
        let fill = self
            .mediator_call(sol::IMediator::disputeFillsCall {
                disputeId: U256::from(dispute_id),
                fillIndex: U256::from(fill_id),
            })
            .await?;
        fill_from_sol(fill)
    }

    async fn open_dispute_counters(&self, round: Round) -> Result<u64, GatewayError> {
        let count = self
            .mediator_call(sol::IMediator::openDisputeCountersCall {
                round: round_to_u256(round),
            })
            .await?;
        u256_to_u64(count, "openDisputeCounters")
    }

    async fn compute_balances_induced_by_fills(
        &self,
        fills: &[Fill],
    ) -> Result<Vec<U256>, GatewayError> {
        self.mediator_call(sol::IMediator::computeBalancesInducedByFillsCall {
            fills: fills.iter().map(fill_to_sol).collect(),
        })
        .await
    }

    async fn check_approval_sig(
        &self,
        approval: &Approval,
        signature: &Signature,
        client: Address,
    ) -> Result<bool, GatewayError> {
        self.mediator_call(sol::IMediator::checkApprovalSigCall {
            approval: approval_to_sol(approval),
            sig: Bytes::copy_from_slice(signature.as_bytes()),
            clientAddress: to_alloy_address(client),
        })
        .await
    }

    async fn is_proof_valid(&self, proof: &Proof, round: Round) -> Result<bool, GatewayError> {
        self.mediator_call(sol::IMediator::isProofValidCall {
            proof: proof_to_sol(proof),
            round: round_to_u256(round),
        })
        .await
    }

    async fn token_balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<U256, GatewayError> {
        self.call_at(
            to_alloy_address(token),
            sol::IToken::balanceOfCall {
                owner: to_alloy_address(owner),
            },
        )
        .await
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError> {
        self.call_at(
            to_alloy_address(token),
            sol::IToken::allowanceCall {
                owner: to_alloy_address(owner),
                spender: to_alloy_address(spender),
            },
        )
        .await
    }
}
