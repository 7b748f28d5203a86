//! State-changing contract calls and the transaction envelope around them.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{Address, TxHash},
    protocol::{Approval, AuthorizationMessage, Fill, Proof, Quarter, RootInfo, Round, Signature},
};

/// Mediator contract functions that mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediatorCall {
    Commit {
        root: RootInfo,
        token: Address,
    },
    InitiateWithdrawal {
        proof: Proof,
        amount: U256,
    },
    DepositTokens {
        token: Address,
        amount: U256,
    },
    RegisterToken {
        token: Address,
    },
    UnregisterToken {
        token: Address,
    },
    SkipToNextRound,
    SkipToNextQuarter,
    UpdateHaltedState,
    CancelWithdrawal {
        approvals: Vec<Approval>,
        signatures: Vec<Signature>,
        token: Address,
        client: Address,
    },
    ConfirmWithdrawal {
        token: Address,
    },
    OpenDispute {
        proofs: Vec<Proof>,
        fills: Vec<Fill>,
        fill_signatures: Vec<Signature>,
        authorization: AuthorizationMessage,
    },
    CloseDispute {
        proofs: Vec<Proof>,
        approvals: Vec<Approval>,
        approval_signatures: Vec<Signature>,
        fills: Vec<Fill>,
        fill_signatures: Vec<Signature>,
        client: Address,
    },
    RecoverAllFunds {
        proof: Proof,
    },
    RecoverOnChainFundsOnly {
        token: Address,
    },
    Halt,
    // Helpers exposed by the test build of the contract.
    SetOpenDisputeCounter {
        round: Round,
        count: u64,
    },
    SetDisputeSummaryCounter {
        client: Address,
        counter: u64,
    },
    SetPreviousOpeningBalanceClient {
        client: Address,
        opening_balance: U256,
        position: u64,
    },
    SetTotalWithdrawalAmount {
        round: Round,
        token: Address,
        amount: U256,
    },
}

impl MediatorCall {
    /// Solidity function name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Commit { .. } => "commit",
            Self::InitiateWithdrawal { .. } => "initiateWithdrawal",
            Self::DepositTokens { .. } => "depositTokens",
            Self::RegisterToken { .. } => "registerToken",
            Self::UnregisterToken { .. } => "unregisterToken",
            Self::SkipToNextRound => "skipToNextRound",
            Self::SkipToNextQuarter => "skipToNextQuarter",
            Self::UpdateHaltedState => "updateHaltedState",
            Self::CancelWithdrawal { .. } => "cancelWithdrawal",
            Self::ConfirmWithdrawal { .. } => "confirmWithdrawal",
            Self::OpenDispute { .. } => "openDispute",
            Self::CloseDispute { .. } => "closeDispute",
            Self::RecoverAllFunds { .. } => "recoverAllFunds",
            Self::RecoverOnChainFundsOnly { .. } => "recoverOnChainFundsOnly",
            Self::Halt => "halt",
            Self::SetOpenDisputeCounter { .. } => "setOpenDisputeCounter",
            Self::SetDisputeSummaryCounter { .. } => "setDisputeSummaryCounter",
            Self::SetPreviousOpeningBalanceClient { .. } => "setPreviousOpeningBalanceClient",
            Self::SetTotalWithdrawalAmount { .. } => "setTotalWithdrawalAmount",
        }
    }
}

/// ERC-20 style token functions that mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCall {
    Approve { spender: Address, amount: U256 },
    Withdraw,
}

impl TokenCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    Mediator(MediatorCall),
    Token { token: Address, call: TokenCall },
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mediator(call) => call.name(),
            Self::Token { call, .. } => call.name(),
        }
    }
}

impl From<MediatorCall> for ContractCall {
    fn from(value: MediatorCall) -> Self {
        Self::Mediator(value)
    }
}

/// Fee and ordering parameters for one broadcast. `None` leaves the choice
/// to the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    pub nonce: Option<u64>,
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub call: ContractCall,
    pub options: TxOptions,
}

/// What the node accepted: the hash plus the fee parameters actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentTx {
    pub hash: TxHash,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
}

/// Scalar part of a dispute as returned by the `disputes(address)` getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeSummary {
    pub open: bool,
    pub round: Round,
    pub quarter: Quarter,
}
