//! FakeNode: in-memory node hosting a `MockMediator`, with scripted broadcast
//! failures, configurable mining behaviour and call recording.

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use mediator_types::{
    Address, Approval, ContentHash, ContractCall, ContractGateway, DisputeSummary, Fill,
    GatewayError, Proof, Quarter, Round, SentTx, Signature, TxHash, TxReceipt, TxRequest, U256,
};
use tokio::time::Instant;

use crate::mock_mediator::MockMediator;

pub const DEFAULT_GAS_PRICE: u128 = 1_000_000_000;
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;
const BASE_GAS_USED: u64 = 21_000;

/// How a broadcast transaction behaves when its receipt is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Mined successfully on the first receipt query.
    #[default]
    Instant,
    /// Never mined.
    Never,
    /// Absent for the first `n` receipt queries, mined successfully after.
    AfterPolls(u32),
    /// Mined on the first receipt query with a failed status.
    Revert,
}

/// A transaction accepted by the fake node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub hash: TxHash,
    pub call: ContractCall,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub at: Instant,
}

#[derive(Debug)]
struct Mempool {
    record: SentRecord,
    mode: MiningMode,
    polls: u32,
}

#[derive(Debug)]
struct NodeState {
    mediator: MockMediator,
    base_nonce: u64,
    used_nonces: BTreeSet<u64>,
    /// Nonces consumed by a mined transaction, reverted or not.
    mined_nonces: BTreeSet<u64>,
    failing_broadcasts: u32,
    failing_receipt_queries: u32,
    default_mode: MiningMode,
    scripted_modes: VecDeque<MiningMode>,
    gas_price: u128,
    gas_limit: u64,
    mempool: HashMap<TxHash, Mempool>,
    receipts: HashMap<TxHash, TxReceipt>,
    replaced: HashSet<TxHash>,
    sent: Vec<SentRecord>,
    broadcast_attempts: Vec<Instant>,
    receipt_polls: Vec<(TxHash, Instant)>,
    reads: Vec<&'static str>,
    block_number: u64,
}

impl NodeState {
    fn pending_nonce(&self) -> u64 {
        self.used_nonces
            .iter()
            .next_back()
            .map_or(self.base_nonce, |n| (n + 1).max(self.base_nonce))
    }

    fn next_hash(&self) -> TxHash {
        let seq = self.sent.len() as u64 + 1;
        let mut bytes = [0u8; TxHash::LEN];
        bytes[..8].copy_from_slice(&seq.to_be_bytes());
        bytes[TxHash::LEN - 1] = 0xee;
        TxHash::new(bytes)
    }

    fn mine(&mut self, sender: Address, hash: TxHash, success: bool) -> Option<TxReceipt> {
        let entry = self.mempool.remove(&hash)?;
        let nonce = entry.record.nonce;
        let replaced: Vec<TxHash> = self
            .mempool
            .iter()
            .filter(|(_, other)| other.record.nonce == nonce)
            .map(|(other, _)| *other)
            .collect();
        for other in replaced {
            self.mempool.remove(&other);
            self.replaced.insert(other);
        }

        self.mined_nonces.insert(nonce);
        self.block_number += 1;
        if success {
            self.mediator.apply(sender, &entry.record.call);
        }
        let receipt = TxReceipt {
            tx_hash: hash,
            success,
            block_number: Some(self.block_number),
            gas_used: BASE_GAS_USED.min(entry.record.gas_limit),
            contract_address: None,
        };
        self.receipts.insert(hash, receipt.clone());
        Some(receipt)
    }
}

/// Fake node bound to one signer and one mediator deployment.
#[derive(Debug)]
pub struct FakeNode {
    signer: Address,
    mediator_address: Address,
    state: Mutex<NodeState>,
}

impl FakeNode {
    pub fn new(signer: Address, mediator_address: Address, mediator: MockMediator) -> Self {
        Self {
            signer,
            mediator_address,
            state: Mutex::new(NodeState {
                mediator,
                base_nonce: 0,
                used_nonces: BTreeSet::new(),
                mined_nonces: BTreeSet::new(),
                failing_broadcasts: 0,
                failing_receipt_queries: 0,
                default_mode: MiningMode::default(),
                scripted_modes: VecDeque::new(),
                gas_price: DEFAULT_GAS_PRICE,
                gas_limit: DEFAULT_GAS_LIMIT,
                mempool: HashMap::new(),
                receipts: HashMap::new(),
                replaced: HashSet::new(),
                sent: Vec::new(),
                broadcast_attempts: Vec::new(),
                receipt_polls: Vec::new(),
                reads: Vec::new(),
                block_number: 0,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        let mut lock = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut lock)
    }

    fn read<R>(&self, name: &'static str, f: impl FnOnce(&MockMediator) -> R) -> R {
        self.with_state(|state| {
            state.reads.push(name);
            f(&state.mediator)
        })
    }

    pub fn with_mediator<R>(&self, f: impl FnOnce(&mut MockMediator) -> R) -> R {
        self.with_state(|state| f(&mut state.mediator))
    }

    pub fn set_base_nonce(&self, nonce: u64) {
        self.with_state(|state| state.base_nonce = nonce);
    }

    /// The next `count` broadcasts fail with a transient RPC error.
    pub fn fail_next_broadcasts(&self, count: u32) {
        self.with_state(|state| state.failing_broadcasts = count);
    }

    /// The next `count` receipt queries fail with an RPC error.
    pub fn fail_next_receipt_queries(&self, count: u32) {
        self.with_state(|state| state.failing_receipt_queries = count);
    }

    pub fn set_mining_mode(&self, mode: MiningMode) {
        self.with_state(|state| state.default_mode = mode);
    }

    /// Modes consumed one per accepted broadcast before falling back to the
    /// default mode.
    pub fn script_mining(&self, modes: impl IntoIterator<Item = MiningMode>) {
        self.with_state(|state| state.scripted_modes.extend(modes));
    }

    pub fn set_default_gas(&self, gas_price: u128, gas_limit: u64) {
        self.with_state(|state| {
            state.gas_price = gas_price;
            state.gas_limit = gas_limit;
        });
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.with_state(|state| state.sent.clone())
    }

    /// Instants of every broadcast attempt, failed ones included.
    pub fn broadcast_attempts(&self) -> Vec<Instant> {
        self.with_state(|state| state.broadcast_attempts.clone())
    }

    pub fn receipt_polls(&self) -> Vec<(TxHash, Instant)> {
        self.with_state(|state| state.receipt_polls.clone())
    }

    pub fn receipt_polls_for(&self, hash: TxHash) -> usize {
        self.with_state(|state| {
            state
                .receipt_polls
                .iter()
                .filter(|(polled, _)| *polled == hash)
                .count()
        })
    }

    /// Names of the contract getters read so far, in order.
    pub fn reads(&self) -> Vec<&'static str> {
        self.with_state(|state| state.reads.clone())
    }

    pub fn mediator(&self) -> MockMediator {
        self.with_state(|state| state.mediator.clone())
    }
}

#[async_trait(?Send)]
impl ContractGateway for FakeNode {
    fn signer_address(&self) -> Address {
        self.signer
    }

    fn mediator_address(&self) -> Address {
        self.mediator_address
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, GatewayError> {
        if address != self.signer {
            return Ok(0);
        }
        let nonce = self.with_state(|state| state.pending_nonce());
        // Suspend between the read and the caller's use of it, as a real
        // round trip would.
        tokio::task::yield_now().await;
        Ok(nonce)
    }

    async fn send_transaction(&self, request: TxRequest) -> Result<SentTx, GatewayError> {
        tokio::task::yield_now().await;
        let now = Instant::now();
        self.with_state(|state| {
            state.broadcast_attempts.push(now);
            if state.failing_broadcasts > 0 {
                state.failing_broadcasts -= 1;
                return Err(GatewayError::Rpc("connection reset by peer".to_string()));
            }

            let nonce = request
                .options
                .nonce
                .unwrap_or_else(|| state.pending_nonce());
            if state.mined_nonces.contains(&nonce) {
                return Err(GatewayError::Rejected(format!(
                    "nonce too low: {nonce} already mined"
                )));
            }
            let gas_price = request.options.gas_price.unwrap_or(state.gas_price);
            let gas_limit = request.options.gas_limit.unwrap_or(state.gas_limit);
            let hash = state.next_hash();
            let mode = state
                .scripted_modes
                .pop_front()
                .unwrap_or(state.default_mode);

            let record = SentRecord {
                hash,
                call: request.call,
                nonce,
                gas_price,
                gas_limit,
                at: now,
            };
            state.used_nonces.insert(nonce);
            state.sent.push(record.clone());
            state.mempool.insert(
                hash,
                Mempool {
                    record,
                    mode,
                    polls: 0,
                },
            );
            Ok(SentTx {
                hash,
                nonce,
                gas_price,
                gas_limit,
            })
        })
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, GatewayError> {
        let signer = self.signer;
        self.with_state(|state| {
            state.receipt_polls.push((hash, Instant::now()));
            if state.failing_receipt_queries > 0 {
                state.failing_receipt_queries -= 1;
                return Err(GatewayError::Rpc("receipt query timed out".to_string()));
            }
            if let Some(receipt) = state.receipts.get(&hash) {
                return Ok(Some(receipt.clone()));
            }
            if state.replaced.contains(&hash) {
                return Ok(None);
            }
            let Some(entry) = state.mempool.get_mut(&hash) else {
                return Ok(None);
            };
            entry.polls += 1;
            let outcome = match entry.mode {
                MiningMode::Instant => Some(true),
                MiningMode::Never => None,
                MiningMode::AfterPolls(n) => (entry.polls > n).then_some(true),
                MiningMode::Revert => Some(false),
            };
            Ok(outcome.and_then(|success| state.mine(signer, hash, success)))
        })
    }

    async fn ether_balance(&self, address: Address) -> Result<U256, GatewayError> {
        Ok(self.read("balance", |m| {
            m.ether_balances.get(&address).copied().unwrap_or_default()
        }))
    }

    async fn current_round(&self) -> Result<Round, GatewayError> {
        Ok(self.read("getCurrentRound", |m| m.round))
    }

    async fn current_quarter(&self) -> Result<Quarter, GatewayError> {
        Ok(self.read("getCurrentQuarter", |m| m.quarter))
    }

    async fn halted(&self) -> Result<bool, GatewayError> {
        Ok(self.read("halted", |m| m.halted))
    }

    async fn halted_round(&self) -> Result<Round, GatewayError> {
        Ok(self.read("haltedRound", |m| m.halted_round))
    }

    async fn halted_quarter(&self) -> Result<Quarter, GatewayError> {
        Ok(self.read("haltedQuarter", |m| m.halted_quarter))
    }

    async fn round_size(&self) -> Result<U256, GatewayError> {
        Ok(self.read("roundSize", |m| m.round_size))
    }

    async fn block_number_at_creation(&self) -> Result<u64, GatewayError> {
        Ok(self.read("blockNumberAtCreation", |m| m.block_number_at_creation))
    }

    async fn commits(&self, round: Round, token: Address) -> Result<ContentHash, GatewayError> {
        Ok(self.read("commits", |m| {
            m.commits.get(&(round, token)).copied().unwrap_or_default()
        }))
    }

    async fn active_withdrawal_rounds(
        &self,
        token: Address,
        client: Address,
    ) -> Result<Round, GatewayError> {
        Ok(self.read("activeWithdrawalRounds", |m| {
            m.active_withdrawal_rounds
                .get(&(token, client))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn client_deposits(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.read("clientDeposits", |m| {
            m.client_deposits
                .get(&(round, token, client))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn total_deposits(&self, round: Round, token: Address) -> Result<U256, GatewayError> {
        Ok(self.read("totalDeposits", |m| {
            m.total_deposits
                .get(&(round, token))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn total_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.read("totalRequestedWithdrawals", |m| {
            m.total_requested_withdrawals
                .get(&(round, token))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn client_requested_withdrawals(
        &self,
        round: Round,
        token: Address,
        client: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.read("clientRequestedWithdrawals", |m| {
            m.client_requested_withdrawals
                .get(&(round, token, client))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn total_disputes(&self) -> Result<u64, GatewayError> {
        Ok(self.read("totalDisputes", |m| m.total_disputes))
    }

    async fn dispute_summary(&self, client: Address) -> Result<DisputeSummary, GatewayError> {
        Ok(self.read("disputes", |m| {
            m.disputes
                .get(&client)
                .map_or(
                    DisputeSummary {
                        open: false,
                        round: 0,
                        quarter: Quarter::default(),
                    },
                    |entry| entry.summary,
                )
        }))
    }

    async fn number_of_fills_from_dispute(&self, client: Address) -> Result<u64, GatewayError> {
        Ok(self.read("getNumberOfFillsFromDispute", |m| {
            m.disputes.get(&client).map_or(0, |entry| entry.fill_count)
        }))
    }

    async fn balances_array_length_from_dispute(
        &self,
        client: Address,
    ) -> Result<u64, GatewayError> {
        Ok(self.read("getBalancesArrayLengthFromDispute", |m| {
            m.disputes
                .get(&client)
                .map_or(0, |entry| entry.opening_balances.len() as u64)
        }))
    }

    async fn balance_from_dispute(
        &self,
        client: Address,
        index: u64,
    ) -> Result<U256, GatewayError> {
        self.read("getBalanceFromDispute", |m| {
            m.disputes
                .get(&client)
                .and_then(|entry| {
                    usize::try_from(index)
                        .ok()
                        .and_then(|i| entry.opening_balances.get(i).copied())
                })
                .ok_or_else(|| {
                    GatewayError::Rejected(format!("balance index {index} out of bounds"))
                })
        })
    }

    async fn registered_token_address(&self, index: u64) -> Result<Address, GatewayError> {
        Ok(self.read("registeredTokensAddresses", |m| {
            m.registered_token_at(index)
        }))
    }

    async fn dispute_fill(&self, dispute_id: u64, fill_id: u64) -> Result<Fill, GatewayError> {
        self.read("getFillFromDispute", |m| {
            m.dispute_fills
                .get(&(dispute_id, fill_id))
                .cloned()
                .ok_or_else(|| {
                    GatewayError::Rejected(format!("no fill {fill_id} in dispute {dispute_id}"))
                })
        })
    }

    async fn open_dispute_counters(&self, round: Round) -> Result<u64, GatewayError> {
        Ok(self.read("openDisputeCounters", |m| {
            m.open_dispute_counters
                .get(&round)
                .copied()
                .unwrap_or_default()
        }))
    }

    /// Returns `[total bought, total sold]` across the given fills.
    async fn compute_balances_induced_by_fills(
        &self,
        fills: &[Fill],
    ) -> Result<Vec<U256>, GatewayError> {
        self.read("computeBalancesInducedByFills", |_| ());
        let bought = fills
            .iter()
            .fold(U256::ZERO, |acc, fill| acc.saturating_add(fill.buy_amount));
        let sold = fills
            .iter()
            .fold(U256::ZERO, |acc, fill| acc.saturating_add(fill.sell_amount));
        Ok(vec![bought, sold])
    }

    async fn check_approval_sig(
        &self,
        approval: &Approval,
        signature: &Signature,
        client: Address,
    ) -> Result<bool, GatewayError> {
        self.read("checkApprovalSig", |_| ());
        Ok(approval.owner == client && !signature.as_bytes().is_empty())
    }

    async fn is_proof_valid(&self, proof: &Proof, round: Round) -> Result<bool, GatewayError> {
        Ok(self.read("isProofValid", |m| {
            proof.round == round && m.commits.contains_key(&(round, proof.token))
        }))
    }

    async fn token_balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.read("balanceOf", |m| {
            m.token_balances
                .get(&(token, owner))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.read("allowance", |m| {
            m.token_allowances
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or_default()
        }))
    }
}
