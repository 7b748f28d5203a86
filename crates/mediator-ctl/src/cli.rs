use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mediator_client::SubmissionConfig;
use mediator_types::{Address, ContentHash, U256};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "mediator-ctl", about = "Operate the mediator contract of an off-chain exchange")]
pub struct Cli {
    /// JSON-RPC endpoint of the node.
    #[arg(long, env = "GETH_RPC_URL", default_value = "http://127.0.0.1:8545")]
    pub rpc_url: Url,

    /// Mediator contract address; falls back to the deployment file.
    #[arg(long, env = "MEDIATOR_ADDRESS")]
    pub mediator: Option<Address>,

    /// Deployment record with the mediator and asset addresses.
    #[arg(long, env = "MEDIATOR_DEPLOYMENT")]
    pub deployment: Option<PathBuf>,

    /// Signing key of the operator account.
    #[arg(long, env = "MEDIATOR_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Gas price in wei; 0 asks the node.
    #[arg(long, env = "GAS_PRICE", default_value_t = 0)]
    pub gas_price: u128,

    /// Gas limit; 0 asks the node for an estimate.
    #[arg(long, env = "GAS_LIMIT", default_value_t = 0)]
    pub gas_limit: u64,

    /// Broadcast+poll cycles for commits.
    #[arg(long, default_value_t = mediator_client::config::DEFAULT_RETRY_LIMIT)]
    pub retry_limit: u32,

    /// Interval between receipt polls.
    #[arg(long, default_value_t = mediator_client::config::DEFAULT_POLLING_INTERVAL_MS)]
    pub polling_interval_ms: u64,

    /// Receipt polls before a transaction counts as stuck.
    #[arg(long, default_value_t = mediator_client::config::DEFAULT_MINING_POLLS)]
    pub mining_polls: u32,

    /// Treat a reverted commit as final instead of resubmitting it.
    #[arg(long)]
    pub no_retry_on_revert: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Round, quarter, halt state and contract balance.
    Status,
    /// Tokens registered with the mediator.
    Tokens,
    /// Dispute opened by a client.
    Dispute { client: Address },
    /// One fill attached to a dispute.
    Fill { dispute_id: u64, fill_id: u64 },
    /// Deposits and withdrawal requests of a client for a token.
    Balances {
        /// Token address or asset symbol.
        token: String,
        client: Address,
        /// Defaults to the current round.
        #[arg(long)]
        round: Option<u64>,
    },
    /// Commit a balance tree root for the current round.
    Commit {
        /// Token address or asset symbol.
        token: String,
        content: ContentHash,
        height: U256,
        width: U256,
    },
    RegisterToken {
        token: String,
    },
    UnregisterToken {
        token: String,
    },
    SkipRound,
    SkipQuarter,
    /// Ask the contract to re-evaluate its halted state.
    UpdateHalted,
}

impl Cli {
    pub fn submission_config(&self) -> SubmissionConfig {
        SubmissionConfig {
            retry_limit: self.retry_limit,
            polling_interval_ms: self.polling_interval_ms,
            mining_polls: self.mining_polls,
            retry_on_revert: !self.no_retry_on_revert,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            ..SubmissionConfig::default()
        }
    }
}
