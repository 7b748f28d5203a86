//! Client for the mediator contract of an off-chain exchange.
//!
//! Writes go through a nonce gate and a broadcaster that retries transport
//! failures; `commit` additionally replaces stuck transactions at an
//! escalated gas price. Reads go straight to the gateway.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod mediator;
pub mod nonce_gate;
pub mod poller;
pub mod queries;
pub mod resubmit;
pub mod token;

pub use broadcast::{escalate_gas_price, Broadcaster, PendingTx};
pub use config::SubmissionConfig;
pub use error::{ConfigError, MediatorError, SubmitError};
pub use mediator::MediatorClient;
pub use nonce_gate::NonceGate;
pub use poller::MiningPoller;
pub use queries::MediatorQueries;
pub use resubmit::{Resubmitter, RetryState};
pub use token::TokenClient;
