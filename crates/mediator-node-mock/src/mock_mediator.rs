//! MockMediator: in-memory mediator and token contract state with the
//! effects of mined calls applied synchronously.

use std::collections::HashMap;

use mediator_types::{
    Address, ContentHash, ContractCall, DisputeSummary, Fill, MediatorCall, Quarter, Round,
    TokenCall, U256,
};

/// Dispute entry as stored by the fake contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeEntry {
    pub summary: DisputeSummary,
    pub fill_count: u64,
    pub opening_balances: Vec<U256>,
}

#[derive(Debug, Clone)]
pub struct MockMediator {
    pub round: Round,
    pub quarter: Quarter,
    pub halted: bool,
    pub halted_round: Round,
    pub halted_quarter: Quarter,
    /// Applied by the next mined `updateHaltedState`.
    pub halt_on_update: bool,
    pub round_size: U256,
    pub block_number_at_creation: u64,
    pub registered_tokens: Vec<Address>,
    pub commits: HashMap<(Round, Address), ContentHash>,
    pub client_deposits: HashMap<(Round, Address, Address), U256>,
    pub total_deposits: HashMap<(Round, Address), U256>,
    pub client_requested_withdrawals: HashMap<(Round, Address, Address), U256>,
    pub total_requested_withdrawals: HashMap<(Round, Address), U256>,
    pub active_withdrawal_rounds: HashMap<(Address, Address), Round>,
    pub disputes: HashMap<Address, DisputeEntry>,
    pub dispute_fills: HashMap<(u64, u64), Fill>,
    pub total_disputes: u64,
    pub open_dispute_counters: HashMap<Round, u64>,
    pub ether_balances: HashMap<Address, U256>,
    pub token_balances: HashMap<(Address, Address), U256>,
    pub token_allowances: HashMap<(Address, Address, Address), U256>,
}

impl Default for MockMediator {
    fn default() -> Self {
        Self {
            round: 0,
            quarter: Quarter::default(),
            halted: false,
            halted_round: 0,
            halted_quarter: Quarter::default(),
            halt_on_update: false,
            round_size: U256::from(100u64),
            block_number_at_creation: 0,
            registered_tokens: Vec::new(),
            commits: HashMap::new(),
            client_deposits: HashMap::new(),
            total_deposits: HashMap::new(),
            client_requested_withdrawals: HashMap::new(),
            total_requested_withdrawals: HashMap::new(),
            active_withdrawal_rounds: HashMap::new(),
            disputes: HashMap::new(),
            dispute_fills: HashMap::new(),
            total_disputes: 0,
            open_dispute_counters: HashMap::new(),
            ether_balances: HashMap::new(),
            token_balances: HashMap::new(),
            token_allowances: HashMap::new(),
        }
    }
}

impl MockMediator {
    pub fn registered_token_at(&self, index: u64) -> Address {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.registered_tokens.get(i).copied())
            .unwrap_or(Address::ZERO)
    }

    pub fn insert_dispute(
        &mut self,
        client: Address,
        summary: DisputeSummary,
        fill_count: u64,
        opening_balances: Vec<U256>,
    ) {
        if !self.disputes.contains_key(&client) {
            self.total_disputes += 1;
        }
        self.disputes.insert(
            client,
            DisputeEntry {
                summary,
                fill_count,
                opening_balances,
            },
        );
    }

    /// Apply the effect of a successfully mined call sent by `sender`.
    pub fn apply(&mut self, sender: Address, call: &ContractCall) {
        match call {
            ContractCall::Mediator(call) => self.apply_mediator(sender, call),
            ContractCall::Token { token, call } => self.apply_token(sender, *token, call),
        }
    }

    fn apply_mediator(&mut self, sender: Address, call: &MediatorCall) {
        match call {
            MediatorCall::Commit { root, token } => {
                self.commits.insert((self.round, *token), root.content);
            }
            MediatorCall::RegisterToken { token } => {
                if !self.registered_tokens.contains(token) {
                    self.registered_tokens.push(*token);
                }
            }
            MediatorCall::UnregisterToken { token } => {
                self.registered_tokens.retain(|t| t != token);
            }
            MediatorCall::SkipToNextRound => {
                self.round += 1;
                self.quarter = Quarter::default();
            }
            MediatorCall::SkipToNextQuarter => {
                let next = self.quarter.get() + 1;
                match Quarter::new(next) {
                    Ok(quarter) => self.quarter = quarter,
                    Err(_) => {
                        self.round += 1;
                        self.quarter = Quarter::default();
                    }
                }
            }
            MediatorCall::Halt => self.halt(),
            MediatorCall::UpdateHaltedState => {
                if self.halt_on_update {
                    self.halt();
                }
            }
            MediatorCall::DepositTokens { token, amount } => {
                *self
                    .client_deposits
                    .entry((self.round, *token, sender))
                    .or_default() += *amount;
                *self.total_deposits.entry((self.round, *token)).or_default() += *amount;
            }
            MediatorCall::InitiateWithdrawal { proof, amount } => {
                *self
                    .client_requested_withdrawals
                    .entry((self.round, proof.token, proof.client))
                    .or_default() += *amount;
                *self
                    .total_requested_withdrawals
                    .entry((self.round, proof.token))
                    .or_default() += *amount;
                self.active_withdrawal_rounds
                    .insert((proof.token, proof.client), self.round);
            }
            MediatorCall::ConfirmWithdrawal { token } => {
                self.active_withdrawal_rounds.remove(&(*token, sender));
            }
            MediatorCall::CancelWithdrawal { token, client, .. } => {
                self.active_withdrawal_rounds.remove(&(*token, *client));
            }
            MediatorCall::SetOpenDisputeCounter { round, count } => {
                self.open_dispute_counters.insert(*round, *count);
            }
            MediatorCall::SetTotalWithdrawalAmount {
                round,
                token,
                amount,
            } => {
                self.total_requested_withdrawals
                    .insert((*round, *token), *amount);
            }
            MediatorCall::SetPreviousOpeningBalanceClient {
                client,
                opening_balance,
                position,
            } => {
                let entry = self.disputes.entry(*client).or_insert_with(|| DisputeEntry {
                    summary: DisputeSummary {
                        open: false,
                        round: 0,
                        quarter: Quarter::default(),
                    },
                    fill_count: 0,
                    opening_balances: Vec::new(),
                });
                if let Ok(position) = usize::try_from(*position) {
                    if position >= entry.opening_balances.len() {
                        entry.opening_balances.resize(position + 1, U256::ZERO);
                    }
                    entry.opening_balances[position] = *opening_balance;
                }
            }
            MediatorCall::OpenDispute { fills, .. } => {
                let summary = DisputeSummary {
                    open: true,
                    round: self.round,
                    quarter: self.quarter,
                };
                self.insert_dispute(sender, summary, fills.len() as u64, Vec::new());
                *self.open_dispute_counters.entry(self.round).or_default() += 1;
            }
            MediatorCall::CloseDispute { client, .. } => {
                if let Some(entry) = self.disputes.get_mut(client) {
                    entry.summary.open = false;
                }
            }
            MediatorCall::SetDisputeSummaryCounter { .. }
            | MediatorCall::RecoverAllFunds { .. }
            | MediatorCall::RecoverOnChainFundsOnly { .. } => {}
        }
    }

    fn apply_token(&mut self, sender: Address, token: Address, call: &TokenCall) {
        match call {
            TokenCall::Approve { spender, amount } => {
                self.token_allowances
                    .insert((token, sender, *spender), *amount);
            }
            TokenCall::Withdraw => {
                self.token_balances.insert((token, sender), U256::ZERO);
            }
        }
    }

    fn halt(&mut self) {
        if !self.halted {
            self.halted = true;
            self.halted_round = self.round;
            self.halted_quarter = self.quarter;
        }
    }
}

#[cfg(test)]
mod tests {
    use mediator_types::{Address, ContractCall, MediatorCall, Quarter};

    use super::MockMediator;

    #[test]
    fn registry_is_zero_terminated() {
        let mut mediator = MockMediator::default();
        let token = Address::new([0xaa; 20]);
        mediator.apply(
            Address::ZERO,
            &ContractCall::Mediator(MediatorCall::RegisterToken { token }),
        );
        assert_eq!(mediator.registered_token_at(0), token);
        assert!(mediator.registered_token_at(1).is_zero());
        assert!(mediator.registered_token_at(u64::MAX).is_zero());
    }

    #[test]
    fn quarter_skip_wraps_into_next_round() {
        let mut mediator = MockMediator::default();
        for _ in 0..4 {
            mediator.apply(
                Address::ZERO,
                &ContractCall::Mediator(MediatorCall::SkipToNextQuarter),
            );
        }
        assert_eq!(mediator.round, 1);
        assert_eq!(mediator.quarter, Quarter::new(0).unwrap());
    }

    #[test]
    fn halt_records_last_active_round() {
        let mut mediator = MockMediator {
            round: 7,
            quarter: Quarter::new(2).unwrap(),
            ..MockMediator::default()
        };
        mediator.apply(Address::ZERO, &ContractCall::Mediator(MediatorCall::Halt));
        assert!(mediator.halted);
        assert_eq!(mediator.halted_round, 7);
        assert_eq!(mediator.halted_quarter.get(), 2);
    }
}
