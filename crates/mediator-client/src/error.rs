use mediator_types::{GatewayError, TxReceipt, ValidationError};
use thiserror::Error;

use crate::broadcast::PendingTx;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

/// Failures of the submission pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("failed to broadcast transaction after {attempts} attempts: {source}")]
    Submission {
        attempts: u32,
        #[source]
        source: GatewayError,
    },
    #[error("transaction {} not mined after {polls} polls", .pending.hash)]
    MiningTimeout { pending: PendingTx, polls: u32 },
    #[error("transaction {} reverted", .pending.hash)]
    Reverted { pending: PendingTx, receipt: TxReceipt },
    #[error("gave up after {attempts} attempts, last tx {}: {cause}", .last.hash)]
    ExhaustedRetries {
        attempts: u32,
        last: PendingTx,
        #[source]
        cause: Box<SubmitError>,
    },
    /// A non-retryable failure inside an escalating submission.
    #[error("submission failed at attempt {attempt}: {cause}")]
    Aborted {
        attempt: u32,
        last: Option<PendingTx>,
        #[source]
        cause: Box<SubmitError>,
    },
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

impl SubmitError {
    /// The most recent transaction the node accepted, if any.
    pub fn last_pending(&self) -> Option<&PendingTx> {
        match self {
            Self::MiningTimeout { pending, .. } | Self::Reverted { pending, .. } => Some(pending),
            Self::ExhaustedRetries { last, .. } => Some(last),
            Self::Aborted { last, cause, .. } => last.as_ref().or_else(|| cause.last_pending()),
            Self::Submission { .. } | Self::InvariantViolation(_) => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediatorError {
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
