use std::{collections::BTreeSet, sync::Arc};

use futures::future::join_all;
use mediator_client::{MediatorClient, NonceGate, SubmissionConfig, SubmitError, TokenClient};
use mediator_node_mock::{DemoScenario, FakeNode, LogCapture, MiningMode};
use mediator_types::{
    Address, AuthorizationMessage, ContentHash, ContractCall, MediatorCall, Proof, RootInfo,
    Signature, U256,
};
use tracing::Level;

fn client(scenario: &DemoScenario) -> MediatorClient<FakeNode> {
    MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap()
}

fn root(byte: u8) -> RootInfo {
    RootInfo {
        content: ContentHash::new([byte; 32]),
        height: U256::from(3u64),
        width: U256::from(4u64),
    }
}

fn proof(token: Address, client: Address, round: u64) -> Proof {
    Proof {
        client_opening_balance: U256::from(100u64),
        token,
        client,
        hashes: vec![ContentHash::new([0x11; 32])],
        sums: vec![U256::from(100u64)],
        height: U256::from(1u64),
        width: U256::from(1u64),
        round,
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_writes_get_distinct_consecutive_nonces() {
    let scenario = DemoScenario::new();
    scenario.node.set_base_nonce(40);
    let client = client(&scenario);

    let results = join_all((0..8).map(|_| client.skip_to_next_quarter())).await;
    assert!(results.iter().all(Result::is_ok));

    let nonces: Vec<u64> = scenario.node.sent().iter().map(|s| s.nonce).collect();
    let distinct: BTreeSet<u64> = nonces.iter().copied().collect();
    assert_eq!(nonces.len(), 8);
    assert_eq!(distinct, (40..48).collect());
    assert_eq!(scenario.node.mediator().round, 3);
}

#[tokio::test(start_paused = true)]
async fn mediator_and_token_clients_share_one_gate() {
    let scenario = DemoScenario::new();
    let gate = Arc::new(NonceGate::new());
    let mediator = MediatorClient::with_gate(
        Arc::clone(&scenario.node),
        Arc::clone(&gate),
        SubmissionConfig::default(),
    )
    .unwrap();
    let token = TokenClient::new(
        Arc::clone(&scenario.node),
        gate,
        scenario.accounts.oax,
        SubmissionConfig::default(),
    )
    .unwrap();

    let (a, b, c) = futures::join!(
        mediator.register_token(Address::new([0xcc; 20])),
        token.approve(scenario.accounts.mediator, U256::from(5u64)),
        mediator.skip_to_next_round(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let nonces: BTreeSet<u64> = scenario.node.sent().iter().map(|s| s.nonce).collect();
    assert_eq!(nonces, (0..3).collect());
}

#[tokio::test(start_paused = true)]
async fn clients_with_their_own_gates_race_for_one_nonce() {
    let scenario = DemoScenario::new();
    let first = client(&scenario);
    let second = client(&scenario);

    let (a, b) = futures::join!(first.skip_to_next_round(), second.skip_to_next_round());

    // Both read the same pending nonce; only one of the two can be mined.
    let nonces: Vec<u64> = scenario.node.sent().iter().map(|s| s.nonce).collect();
    assert_eq!(nonces, vec![0, 0]);
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(mediator_client::MediatorError::Submit(SubmitError::MiningTimeout { .. }))
    )));
    assert_eq!(scenario.node.mediator().round, 2);
}

#[tokio::test(start_paused = true)]
async fn commit_uses_its_own_gas_limit_and_escalates() {
    let scenario = DemoScenario::new();
    scenario.node.script_mining([MiningMode::Never, MiningMode::Instant]);
    let client = MediatorClient::new(
        Arc::clone(&scenario.node),
        SubmissionConfig {
            gas_limit: 90_000,
            ..SubmissionConfig::default()
        },
    )
    .unwrap();

    let receipt = client.commit(root(0x5a), scenario.accounts.oax).await.unwrap();

    let sent = scenario.node.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|s| s.gas_limit == 200_000));
    assert_eq!(sent[0].nonce, sent[1].nonce);
    assert!(sent[1].gas_price > sent[0].gas_price);
    assert_eq!(receipt.tx_hash, sent[1].hash);
    assert_eq!(
        client
            .queries()
            .commit(1, scenario.accounts.oax)
            .await
            .unwrap(),
        ContentHash::new([0x5a; 32])
    );
}

#[tokio::test(start_paused = true)]
async fn commit_that_never_mines_reports_exhaustion() {
    let (logs, _guard) = LogCapture::install();
    let scenario = DemoScenario::new();
    scenario.node.set_mining_mode(MiningMode::Never);
    let client = client(&scenario);

    let err = client
        .commit(root(0x01), scenario.accounts.weth)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        mediator_client::MediatorError::Submit(SubmitError::ExhaustedRetries { attempts: 5, .. })
    ));
    assert_eq!(scenario.node.sent().len(), 5);
    assert!(logs
        .messages(Level::WARN)
        .iter()
        .filter(|m| m.as_str() == "resubmitting with higher gas price")
        .count()
        == 4);
}

#[tokio::test(start_paused = true)]
async fn single_shot_writes_do_not_resubmit() {
    let scenario = DemoScenario::new();
    scenario.node.set_mining_mode(MiningMode::Never);
    let client = client(&scenario);

    let err = client
        .register_token(Address::new([0xcc; 20]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        mediator_client::MediatorError::Submit(SubmitError::MiningTimeout { polls: 20, .. })
    ));
    assert_eq!(scenario.node.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn update_halted_state_reports_flag_after_mining() {
    let scenario = DemoScenario::new();
    let client = client(&scenario);
    assert!(!client.update_halted_state().await.unwrap());

    scenario.node.with_mediator(|m| m.halt_on_update = true);
    assert!(client.update_halted_state().await.unwrap());
    assert_eq!(client.queries().last_active_round().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn token_registration_round_trip() {
    let scenario = DemoScenario::new();
    let client = client(&scenario);
    let extra = Address::new([0xcc; 20]);

    client.register_token(extra).await.unwrap();
    assert_eq!(
        client.queries().registered_tokens().await.unwrap(),
        vec![scenario.accounts.oax, scenario.accounts.weth, extra]
    );

    client.unregister_token(scenario.accounts.oax).await.unwrap();
    assert_eq!(
        client.queries().registered_tokens().await.unwrap(),
        vec![scenario.accounts.weth, extra]
    );
}

#[tokio::test(start_paused = true)]
async fn withdrawal_and_deposit_flows() {
    let scenario = DemoScenario::new();
    let accounts = scenario.accounts;
    let client = client(&scenario);

    client
        .deposit_tokens(accounts.oax, U256::from(30u64))
        .await
        .unwrap();
    client
        .initiate_withdrawal(proof(accounts.oax, accounts.operator, 1), U256::from(10u64))
        .await
        .unwrap();

    let queries = client.queries();
    assert_eq!(
        queries
            .client_deposits(1, accounts.oax, accounts.operator)
            .await
            .unwrap(),
        U256::from(30u64)
    );
    assert_eq!(
        queries.total_deposits(1, accounts.oax).await.unwrap(),
        U256::from(30u64)
    );
    assert_eq!(
        queries
            .requested_withdrawal(1, accounts.oax, accounts.operator)
            .await
            .unwrap(),
        U256::from(10u64)
    );
    assert_eq!(
        queries
            .active_withdrawal_round(accounts.oax, accounts.operator)
            .await
            .unwrap(),
        1
    );

    client.confirm_withdrawal(accounts.oax).await.unwrap();
    assert_eq!(
        queries
            .active_withdrawal_round(accounts.oax, accounts.operator)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn dispute_lifecycle() {
    let scenario = DemoScenario::new();
    let accounts = scenario.accounts;
    let client = client(&scenario);
    let operator = accounts.operator;

    client
        .open_dispute(
            vec![proof(accounts.oax, operator, 1)],
            Vec::new(),
            Vec::new(),
            AuthorizationMessage {
                round: 1,
                client: operator,
                signature: Signature(vec![0x1b; 65]),
            },
        )
        .await
        .unwrap();
    client
        .set_previous_opening_balance_client(operator, U256::from(77u64), 0)
        .await
        .unwrap();

    let dispute = client.queries().dispute(operator).await.unwrap();
    assert!(dispute.open);
    assert_eq!(dispute.round, 1);
    assert_eq!(dispute.opening_balances, vec![U256::from(77u64)]);
    assert_eq!(client.queries().total_disputes().await.unwrap(), 1);
    assert_eq!(client.queries().open_dispute_counter(1).await.unwrap(), 1);

    client
        .close_dispute(Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), operator)
        .await
        .unwrap();
    assert!(!client.queries().dispute(operator).await.unwrap().open);
}

#[tokio::test(start_paused = true)]
async fn halt_and_recovery_calls_are_sent() {
    let scenario = DemoScenario::new();
    let accounts = scenario.accounts;
    let client = client(&scenario);

    client.halt().await.unwrap();
    client
        .recover_on_chain_funds_only(accounts.oax)
        .await
        .unwrap();
    client
        .recover_all_funds(proof(accounts.oax, accounts.operator, 1))
        .await
        .unwrap();

    assert!(client.queries().is_halted().await.unwrap());
    let names: Vec<&str> = scenario
        .node
        .sent()
        .iter()
        .map(|s| s.call.name())
        .collect();
    assert_eq!(
        names,
        vec!["halt", "recoverOnChainFundsOnly", "recoverAllFunds"]
    );
}

#[tokio::test(start_paused = true)]
async fn explicit_modes_are_available_for_any_call() {
    let scenario = DemoScenario::new();
    scenario.node.script_mining([MiningMode::Never]);
    let client = MediatorClient::new(
        Arc::clone(&scenario.node),
        SubmissionConfig {
            mining_polls: 2,
            ..SubmissionConfig::default()
        },
    )
    .unwrap();

    client
        .submit_and_confirm(MediatorCall::SkipToNextRound, None)
        .await
        .unwrap();
    assert_eq!(scenario.node.sent().len(), 2);
    assert_eq!(
        scenario.node.sent()[1].call,
        ContractCall::Mediator(MediatorCall::SkipToNextRound)
    );
    assert_eq!(scenario.node.mediator().round, 2);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let scenario = DemoScenario::new();
    let result = MediatorClient::new(
        Arc::clone(&scenario.node),
        SubmissionConfig {
            retry_limit: 0,
            ..SubmissionConfig::default()
        },
    );
    assert!(result.is_err());
}
