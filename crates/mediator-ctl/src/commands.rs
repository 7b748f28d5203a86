//! Subcommand execution against any `ContractGateway`.

use mediator_client::{MediatorClient, MediatorError};
use mediator_types::{Address, ContractGateway, RootInfo, TxReceipt};
use thiserror::Error;

use crate::{
    cli::Command,
    deployment::{Deployment, DeploymentError},
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Mediator(#[from] MediatorError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

impl From<mediator_types::GatewayError> for CommandError {
    fn from(err: mediator_types::GatewayError) -> Self {
        Self::Mediator(err.into())
    }
}

fn resolve_token(deployment: Option<&Deployment>, token: &str) -> Result<Address, CommandError> {
    match deployment {
        Some(deployment) => Ok(deployment.resolve_token(token)?),
        None => token
            .parse()
            .map_err(|err| CommandError::Mediator(MediatorError::Validation(err))),
    }
}

fn receipt_line(receipt: &TxReceipt) -> String {
    format!(
        "tx {} mined in block {} (gas used {})",
        receipt.tx_hash,
        receipt
            .block_number
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        receipt.gas_used
    )
}

/// Run one subcommand and return the lines to print.
pub async fn run<G: ContractGateway + ?Sized>(
    client: &MediatorClient<G>,
    deployment: Option<&Deployment>,
    command: Command,
) -> Result<Vec<String>, CommandError> {
    let queries = client.queries();
    let lines = match command {
        Command::Status => {
            let mut lines = vec![
                format!("mediator: {}", client.address()),
                format!("round: {}", queries.current_round().await?),
                format!("quarter: {}", queries.current_quarter().await?),
                format!("round size: {}", queries.round_size().await?),
                format!(
                    "created at block: {}",
                    queries.block_number_at_creation().await?
                ),
                format!("disputes: {}", queries.total_disputes().await?),
                format!("balance: {}", queries.contract_balance().await?),
            ];
            if queries.is_halted().await? {
                lines.push(format!(
                    "halted after round {} quarter {}",
                    queries.last_active_round().await?,
                    queries.last_active_quarter().await?
                ));
            } else {
                lines.push("halted: false".to_string());
            }
            lines
        }
        Command::Tokens => {
            let tokens = queries.registered_tokens().await?;
            let symbols = deployment
                .map(Deployment::asset_addresses)
                .transpose()?
                .unwrap_or_default();
            tokens
                .into_iter()
                .map(|token| {
                    match symbols.iter().find(|(_, address)| *address == token) {
                        Some((symbol, _)) => format!("{token} {symbol}"),
                        None => token.to_string(),
                    }
                })
                .collect()
        }
        Command::Dispute { client: disputer } => {
            let dispute = queries.dispute(disputer).await?;
            let mut lines = vec![
                format!("client: {}", dispute.client),
                format!("open: {}", dispute.open),
                format!("round: {} quarter: {}", dispute.round, dispute.quarter),
                format!("fills: {}", dispute.fill_count),
            ];
            lines.extend(
                dispute
                    .opening_balances
                    .iter()
                    .enumerate()
                    .map(|(i, balance)| format!("opening balance[{i}]: {balance}")),
            );
            lines
        }
        Command::Fill {
            dispute_id,
            fill_id,
        } => {
            let fill = queries.fill_from_dispute(dispute_id, fill_id).await?;
            vec![
                format!("fill {} approval {} round {}", fill.fill_id, fill.approval_id, fill.round),
                format!("buy {} of {}", fill.buy_amount, fill.buy_asset),
                format!("sell {} of {}", fill.sell_amount, fill.sell_asset),
                format!("client {} instance {}", fill.client, fill.instance_id),
            ]
        }
        Command::Balances {
            token,
            client: holder,
            round,
        } => {
            let token = resolve_token(deployment, &token)?;
            let round = match round {
                Some(round) => round,
                None => queries.current_round().await?,
            };
            vec![
                format!(
                    "deposits: {}",
                    queries.client_deposits(round, token, holder).await?
                ),
                format!(
                    "requested withdrawal: {}",
                    queries.requested_withdrawal(round, token, holder).await?
                ),
                format!(
                    "active withdrawal round: {}",
                    queries.active_withdrawal_round(token, holder).await?
                ),
            ]
        }
        Command::Commit {
            token,
            content,
            height,
            width,
        } => {
            let token = resolve_token(deployment, &token)?;
            let root = RootInfo {
                content,
                height,
                width,
            };
            vec![receipt_line(&client.commit(root, token).await?)]
        }
        Command::RegisterToken { token } => {
            let token = resolve_token(deployment, &token)?;
            vec![receipt_line(&client.register_token(token).await?)]
        }
        Command::UnregisterToken { token } => {
            let token = resolve_token(deployment, &token)?;
            vec![receipt_line(&client.unregister_token(token).await?)]
        }
        Command::SkipRound => vec![receipt_line(&client.skip_to_next_round().await?)],
        Command::SkipQuarter => vec![receipt_line(&client.skip_to_next_quarter().await?)],
        Command::UpdateHalted => {
            let halted = client.update_halted_state().await?;
            vec![format!("halted: {halted}")]
        }
    };
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mediator_client::{MediatorClient, SubmissionConfig};
    use mediator_node_mock::DemoScenario;
    use mediator_types::{Address, ContentHash, U256};

    use super::{run, CommandError};
    use crate::{cli::Command, deployment::Deployment};

    fn deployment(scenario: &DemoScenario) -> Deployment {
        Deployment {
            assets: [
                ("OAX".to_string(), scenario.accounts.oax.to_string()),
                ("WETH".to_string(), scenario.accounts.weth.to_string()),
            ]
            .into_iter()
            .collect(),
            mediator: scenario.accounts.mediator.to_string(),
            operator: Some(scenario.accounts.operator.to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_are_listed_with_symbols() {
        let scenario = DemoScenario::new();
        let client =
            MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap();
        let lines = run(&client, Some(&deployment(&scenario)), Command::Tokens)
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec![
                format!("{} OAX", scenario.accounts.oax),
                format!("{} WETH", scenario.accounts.weth),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_round_and_balance() {
        let scenario = DemoScenario::new();
        let client =
            MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap();
        let lines = run(&client, None, Command::Status).await.unwrap();
        assert!(lines.contains(&"round: 1".to_string()));
        assert!(lines.contains(&"balance: 5000000".to_string()));
        assert!(lines.contains(&"halted: false".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn commit_by_symbol_lands_for_current_round() {
        let scenario = DemoScenario::new();
        let client =
            MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap();
        let content = ContentHash::new([0x11; 32]);
        let command = Command::Commit {
            token: "oax".to_string(),
            content,
            height: U256::from(3u64),
            width: U256::from(8u64),
        };
        let lines = run(&client, Some(&deployment(&scenario)), command)
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("tx "));
        assert_eq!(
            client
                .queries()
                .commit(1, scenario.accounts.oax)
                .await
                .unwrap(),
            content
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_symbol_without_deployment_is_rejected() {
        let scenario = DemoScenario::new();
        let client =
            MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap();
        let err = run(
            &client,
            None,
            Command::RegisterToken {
                token: "DAI".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Mediator(_)));
        assert!(scenario.node.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_round_advances_round() {
        let scenario = DemoScenario::new();
        let client =
            MediatorClient::new(Arc::clone(&scenario.node), SubmissionConfig::default()).unwrap();
        run(&client, None, Command::SkipRound).await.unwrap();
        let lines = run(
            &client,
            None,
            Command::Balances {
                token: scenario.accounts.weth.to_string(),
                client: Address::new([0x01; 20]),
                round: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(lines[0], "deposits: 0");
        assert_eq!(client.queries().current_round().await.unwrap(), 2);
    }
}
