//! ABI bindings for the mediator and token contracts, and conversions between
//! protocol records and their Solidity counterparts.

use alloy_primitives::{Address as AlloyAddress, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use mediator_types::{
    Address, Approval, AuthorizationMessage, ContentHash, ContractCall, Fill, GatewayError,
    MediatorCall, Proof, Quarter, RootInfo, Round, Signature, TokenCall, TxHash, ValidationError,
};

pub mod sol {
    alloy_sol_types::sol! {
        struct RootInfo {
            bytes32 content;
            uint256 height;
            uint256 width;
        }

        struct Proof {
            uint256 clientOpeningBalance;
            address tokenAddress;
            address clientAddress;
            bytes32[] hashes;
            uint256[] sums;
            uint256 height;
            uint256 width;
            uint256 round;
        }

        struct Fill {
            uint256 fillId;
            uint256 approvalId;
            uint256 round;
            uint256 buyAmount;
            address buyAsset;
            uint256 sellAmount;
            address sellAsset;
            address clientAddress;
            address instanceId;
        }

        struct Approval {
            uint256 approvalId;
            uint256 round;
            uint256 buyAmount;
            address buyAsset;
            uint256 sellAmount;
            address sellAsset;
            bool intentToBuy;
            address owner;
            address instanceId;
        }

        struct AuthorizationMessage {
            uint256 round;
            address clientAddress;
            bytes sig;
        }

        interface IMediator {
            function commit(RootInfo rootInfo, address tokenAddress) external;
            function initiateWithdrawal(Proof proof, uint256 withdrawalAmount) external;
            function depositTokens(address tokenAddress, uint256 amount) external;
            function registerToken(address tokenAddress) external;
            function unregisterToken(address tokenAddress) external;
            function skipToNextRound() external;
            function skipToNextQuarter() external;
            function updateHaltedState() external returns (bool);
            function cancelWithdrawal(
                Approval[] approvals,
                bytes[] sigs,
                address tokenAddress,
                address clientAddress
            ) external;
            function confirmWithdrawal(address tokenAddress) external;
            function openDispute(
                Proof[] proofs,
                Fill[] fills,
                bytes[] sigFills,
                AuthorizationMessage authorizationMessage
            ) external;
            function closeDispute(
                Proof[] proofs,
                Approval[] approvals,
                bytes[] sigApprovals,
                Fill[] fills,
                bytes[] sigFills,
                address clientAddress
            ) external;
            function recoverAllFunds(Proof proof) external;
            function recoverOnChainFundsOnly(address tokenAddress) external;
            function halt() external;
            function setOpenDisputeCounter(uint256 round, uint256 n) external;
            function setDisputeSummaryCounter(address clientAddress, uint256 counter) external;
            function setPreviousOpeningBalanceClient(
                address clientAddress,
                uint256 openingBalance,
                uint256 pos
            ) external;
            function setTotalWithdrawalAmount(
                uint256 round,
                address tokenAddress,
                uint256 amount
            ) external;

            function getCurrentRound() external view returns (uint256);
            function getCurrentQuarter() external view returns (uint256);
            function halted() external view returns (bool);
            function haltedRound() external view returns (uint256);
            function haltedQuarter() external view returns (uint256);
            function roundSize() external view returns (uint256);
            function blockNumberAtCreation() external view returns (uint256);
            function commits(uint256 round, address tokenAddress) external view returns (bytes32);
            function activeWithdrawalRounds(address tokenAddress, address clientAddress)
                external view returns (uint256);
            function clientDeposits(uint256 round, address tokenAddress, address clientAddress)
                external view returns (uint256);
            function totalDeposits(uint256 round, address tokenAddress)
                external view returns (uint256);
            function totalRequestedWithdrawals(uint256 round, address tokenAddress)
                external view returns (uint256);
            function clientRequestedWithdrawals(
                uint256 round,
                address tokenAddress,
                address clientAddress
            ) external view returns (uint256);
            function totalDisputes() external view returns (uint256);
            function disputes(address clientAddress)
                external view returns (uint256 quarter, uint256 round, bool open);
            function getNumberOfFillsFromDispute(address clientAddress)
                external view returns (uint256);
            function getBalancesArrayLengthFromDispute(address clientAddress)
                external view returns (uint256);
            function getBalanceFromDispute(address clientAddress, uint256 index)
                external view returns (uint256);
            function registeredTokensAddresses(uint256 index) external view returns (address);
            function disputeFills(uint256 disputeId, uint256 fillIndex)
                external view returns (
                    uint256 fillId,
                    uint256 approvalId,
                    uint256 round,
                    uint256 buyAmount,
                    address buyAsset,
                    uint256 sellAmount,
                    address sellAsset,
                    address clientAddress,
                    address instanceId
                );
            function openDisputeCounters(uint256 round) external view returns (uint256);
            function computeBalancesInducedByFills(Fill[] fills)
                external view returns (uint256[]);
            function checkApprovalSig(Approval approval, bytes sig, address clientAddress)
                external view returns (bool);
            function isProofValid(Proof proof, uint256 round) external view returns (bool);
        }

        interface IToken {
            function balanceOf(address owner) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
            function approve(address spender, uint256 value) external returns (bool);
            function withdraw() external;
        }
    }
}

pub fn to_alloy_address(address: Address) -> AlloyAddress {
    AlloyAddress::from(address.into_inner())
}

pub fn from_alloy_address(address: AlloyAddress) -> Address {
    Address::new(address.into_array())
}

pub fn to_b256(hash: TxHash) -> B256 {
    B256::from(hash.into_inner())
}

pub fn from_b256(hash: B256) -> TxHash {
    TxHash::new(hash.0)
}

pub fn round_to_u256(round: Round) -> U256 {
    U256::from(round)
}

pub fn u256_to_u64(value: U256, field: &'static str) -> Result<u64, GatewayError> {
    u64::try_from(value).map_err(|_| {
        GatewayError::Validation(ValidationError::Overflow {
            field,
            target: "u64",
        })
    })
}

pub fn u256_to_quarter(value: U256, field: &'static str) -> Result<Quarter, GatewayError> {
    Ok(Quarter::try_from(u256_to_u64(value, field)?)?)
}

fn signature_bytes(signature: &Signature) -> Bytes {
    Bytes::copy_from_slice(signature.as_bytes())
}

fn signatures(signatures: &[Signature]) -> Vec<Bytes> {
    signatures.iter().map(signature_bytes).collect()
}

pub fn root_info_to_sol(root: &RootInfo) -> sol::RootInfo {
    sol::RootInfo {
        content: B256::from(root.content.into_inner()),
        height: root.height,
        width: root.width,
    }
}

pub fn proof_to_sol(proof: &Proof) -> sol::Proof {
    sol::Proof {
        clientOpeningBalance: proof.client_opening_balance,
        tokenAddress: to_alloy_address(proof.token),
        clientAddress: to_alloy_address(proof.client),
        hashes: proof
            .hashes
            .iter()
            .map(|h: &ContentHash| B256::from(h.into_inner()))
            .collect(),
        sums: proof.sums.clone(),
        height: proof.height,
        width: proof.width,
        round: round_to_u256(proof.round),
    }
}

fn proofs_to_sol(proofs: &[Proof]) -> Vec<sol::Proof> {
    proofs.iter().map(proof_to_sol).collect()
}

pub fn fill_to_sol(fill: &Fill) -> sol::Fill {
    sol::Fill {
        fillId: fill.fill_id,
        approvalId: fill.approval_id,
        round: round_to_u256(fill.round),
        buyAmount: fill.buy_amount,
        buyAsset: to_alloy_address(fill.buy_asset),
        sellAmount: fill.sell_amount,
        sellAsset: to_alloy_address(fill.sell_asset),
        clientAddress: to_alloy_address(fill.client),
        instanceId: to_alloy_address(fill.instance_id),
    }
}

fn fills_to_sol(fills: &[Fill]) -> Vec<sol::Fill> {
    fills.iter().map(fill_to_sol).collect()
}

pub fn fill_from_sol(fill: sol::IMediator::disputeFillsReturn) -> Result<Fill, GatewayError> {
    Ok(Fill {
        fill_id: fill.fillId,
        approval_id: fill.approvalId,
        round: u256_to_u64(fill.round, "fill.round")?,
        buy_amount: fill.buyAmount,
        buy_asset: from_alloy_address(fill.buyAsset),
        sell_amount: fill.sellAmount,
        sell_asset: from_alloy_address(fill.sellAsset),
        client: from_alloy_address(fill.clientAddress),
        instance_id: from_alloy_address(fill.instanceId),
    })
}

pub fn approval_to_sol(approval: &Approval) -> sol::Approval {
    sol::Approval {
        approvalId: approval.approval_id,
        round: round_to_u256(approval.round),
        buyAmount: approval.buy_amount,
        buyAsset: to_alloy_address(approval.buy_asset),
        sellAmount: approval.sell_amount,
        sellAsset: to_alloy_address(approval.sell_asset),
        intentToBuy: approval.intent_to_buy,
        owner: to_alloy_address(approval.owner),
        instanceId: to_alloy_address(approval.instance_id),
    }
}

fn approvals_to_sol(approvals: &[Approval]) -> Vec<sol::Approval> {
    approvals.iter().map(approval_to_sol).collect()
}

fn authorization_to_sol(message: &AuthorizationMessage) -> sol::AuthorizationMessage {
    sol::AuthorizationMessage {
        round: round_to_u256(message.round),
        clientAddress: to_alloy_address(message.client),
        sig: signature_bytes(&message.signature),
    }
}

/// Destination and calldata for a state-changing call.
pub fn encode_call(mediator: AlloyAddress, call: &ContractCall) -> (AlloyAddress, Bytes) {
    match call {
        ContractCall::Mediator(call) => (mediator, encode_mediator_call(call).into()),
        ContractCall::Token { token, call } => {
            (to_alloy_address(*token), encode_token_call(call).into())
        }
    }
}

fn encode_mediator_call(call: &MediatorCall) -> Vec<u8> {
    use sol::IMediator as M;

    match call {
        MediatorCall::Commit { root, token } => M::commitCall {
            rootInfo: root_info_to_sol(root),
            tokenAddress: to_alloy_address(*token),
        }
        .abi_encode(),
        MediatorCall::InitiateWithdrawal { proof, amount } => M::initiateWithdrawalCall {
            proof: proof_to_sol(proof),
            withdrawalAmount: *amount,
        }
        .abi_encode(),
        MediatorCall::DepositTokens { token, amount } => M::depositTokensCall {
            tokenAddress: to_alloy_address(*token),
            amount: *amount,
        }
        .abi_encode(),
        MediatorCall::RegisterToken { token } => M::registerTokenCall {
            tokenAddress: to_alloy_address(*token),
        }
        .abi_encode(),
        MediatorCall::UnregisterToken { token } => M::unregisterTokenCall {
            tokenAddress: to_alloy_address(*token),
        }
        .abi_encode(),
        MediatorCall::SkipToNextRound => M::skipToNextRoundCall {}.abi_encode(),
        MediatorCall::SkipToNextQuarter => M::skipToNextQuarterCall {}.abi_encode(),
        MediatorCall::UpdateHaltedState => M::updateHaltedStateCall {}.abi_encode(),
        MediatorCall::CancelWithdrawal {
            approvals,
            signatures: sigs,
            token,
            client,
        } => M::cancelWithdrawalCall {
            approvals: approvals_to_sol(approvals),
            sigs: signatures(sigs),
            tokenAddress: to_alloy_address(*token),
            clientAddress: to_alloy_address(*client),
        }
        .abi_encode(),
        MediatorCall::ConfirmWithdrawal { token } => M::confirmWithdrawalCall {
            tokenAddress: to_alloy_address(*token),
        }
        .abi_encode(),
        MediatorCall::OpenDispute {
            proofs,
            fills,
            fill_signatures,
            authorization,
        } => M::openDisputeCall {
            proofs: proofs_to_sol(proofs),
            fills: fills_to_sol(fills),
            sigFills: signatures(fill_signatures),
            authorizationMessage: authorization_to_sol(authorization),
        }
        .abi_encode(),
        MediatorCall::CloseDispute {
            proofs,
            approvals,
            approval_signatures,
            fills,
            fill_signatures,
            client,
        } => M::closeDisputeCall {
            proofs: proofs_to_sol(proofs),
            approvals: approvals_to_sol(approvals),
            sigApprovals: signatures(approval_signatures),
            fills: fills_to_sol(fills),
            sigFills: signatures(fill_signatures),
            clientAddress: to_alloy_address(*client),
        }
        .abi_encode(),
        MediatorCall::RecoverAllFunds { proof } => M::recoverAllFundsCall {
            proof: proof_to_sol(proof),
        }
        .abi_encode(),
        MediatorCall::RecoverOnChainFundsOnly { token } => M::recoverOnChainFundsOnlyCall {
            tokenAddress: to_alloy_address(*token),
        }
        .abi_encode(),
        MediatorCall::Halt => M::haltCall {}.abi_encode(),
        MediatorCall::SetOpenDisputeCounter { round, count } => M::setOpenDisputeCounterCall {
            round: round_to_u256(*round),
            n: U256::from(*count),
        }
        .abi_encode(),
        MediatorCall::SetDisputeSummaryCounter { client, counter } => {
            M::setDisputeSummaryCounterCall {
                clientAddress: to_alloy_address(*client),
                counter: U256::from(*counter),
            }
            .abi_encode()
        }
        MediatorCall::SetPreviousOpeningBalanceClient {
            client,
            opening_balance,
            position,
        } => M::setPreviousOpeningBalanceClientCall {
            clientAddress: to_alloy_address(*client),
            openingBalance: *opening_balance,
            pos: U256::from(*position),
        }
        .abi_encode(),
        MediatorCall::SetTotalWithdrawalAmount {
            round,
            token,
            amount,
        } => M::setTotalWithdrawalAmountCall {
            round: round_to_u256(*round),
            tokenAddress: to_alloy_address(*token),
            amount: *amount,
        }
        .abi_encode(),
    }
}

fn encode_token_call(call: &TokenCall) -> Vec<u8> {
    use sol::IToken as T;

    match call {
        TokenCall::Approve { spender, amount } => T::approveCall {
            spender: to_alloy_address(*spender),
            value: *amount,
        }
        .abi_encode(),
        TokenCall::Withdraw => T::withdrawCall {}.abi_encode(),
    }
}
