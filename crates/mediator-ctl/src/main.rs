mod cli;
mod commands;
mod deployment;

use std::sync::Arc;

use clap::Parser;
use mediator_client::MediatorClient;
use mediator_rpc::{RpcConfig, RpcGateway};
use mediator_types::ContractGateway;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{cli::Cli, deployment::Deployment};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let deployment = cli.deployment.as_deref().map(Deployment::load).transpose()?;
    let mediator = match (cli.mediator, &deployment) {
        (Some(mediator), _) => mediator,
        (None, Some(deployment)) => deployment.mediator_address()?,
        (None, None) => return Err("no mediator address: pass --mediator or --deployment".into()),
    };

    let gateway = RpcGateway::connect(&RpcConfig {
        url: cli.rpc_url.clone(),
        mediator,
        private_key: cli.private_key.clone(),
    })
    .await?;
    if let Some(operator) = deployment
        .as_ref()
        .map(Deployment::operator_address)
        .transpose()?
        .flatten()
    {
        if operator != gateway.signer_address() {
            warn!(
                %operator,
                signer = %gateway.signer_address(),
                "signing key is not the deployment operator"
            );
        }
    }
    info!(chain_id = gateway.chain_id(), "running {:?}", cli.command);

    let client = MediatorClient::new(Arc::new(gateway), cli.submission_config())?;
    for line in commands::run(&client, deployment.as_ref(), cli.command).await? {
        println!("{line}");
    }
    Ok(())
}
