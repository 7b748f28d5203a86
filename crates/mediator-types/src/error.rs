//! Error types for gateway calls and record validation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid length for {kind}: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("quarter out of range: {0}")]
    InvalidQuarter(u64),
    #[error("value for `{field}` does not fit in {target}")]
    Overflow {
        field: &'static str,
        target: &'static str,
    },
    #[error("{0}")]
    Message(String),
}

/// Failures reported by a `ContractGateway` implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction rejected by node: {0}")]
    Rejected(String),
    #[error("failed to decode `{call}` response: {message}")]
    Decode { call: &'static str, message: String },
    #[error("unsupported call `{0}`")]
    Unsupported(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
