use std::sync::Arc;

use mediator_types::{Address, U256};

use crate::{fake_node::FakeNode, mock_mediator::MockMediator};

#[derive(Debug, Clone, Copy)]
pub struct DemoAccounts {
    pub operator: Address,
    pub alice: Address,
    pub bob: Address,
    pub mediator: Address,
    pub oax: Address,
    pub weth: Address,
}

/// An operator-signed fake node with two registered tokens, in round 1.
#[derive(Debug, Clone)]
pub struct DemoScenario {
    pub accounts: DemoAccounts,
    pub node: Arc<FakeNode>,
}

impl DemoScenario {
    pub fn new() -> Self {
        let accounts = DemoAccounts {
            operator: Address::new([0x0a; 20]),
            alice: Address::new([0x01; 20]),
            bob: Address::new([0x02; 20]),
            mediator: Address::new([0x4d; 20]),
            oax: Address::new([0xaa; 20]),
            weth: Address::new([0xbb; 20]),
        };
        let node = FakeNode::new(accounts.operator, accounts.mediator, demo_mediator(accounts));
        Self {
            accounts,
            node: Arc::new(node),
        }
    }
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self::new()
    }
}

fn demo_mediator(accounts: DemoAccounts) -> MockMediator {
    let mut mediator = MockMediator {
        round: 1,
        block_number_at_creation: 12,
        registered_tokens: vec![accounts.oax, accounts.weth],
        ..MockMediator::default()
    };
    mediator
        .ether_balances
        .insert(accounts.mediator, U256::from(5_000_000u64));
    for (holder, amount) in [(accounts.alice, 150u64), (accounts.bob, 50)] {
        mediator
            .token_balances
            .insert((accounts.oax, holder), U256::from(amount));
        mediator
            .token_balances
            .insert((accounts.weth, holder), U256::from(amount / 10));
    }
    mediator
}
