//! Protocol records exchanged with the mediator contract.

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    ids::{Address, ContentHash},
};

/// Protocol epoch as observed on chain.
pub type Round = u64;

/// Sub-phase within a round, always in `0..4`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quarter(u8);

impl Quarter {
    pub const COUNT: u8 = 4;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value >= Self::COUNT {
            return Err(ValidationError::InvalidQuarter(value.into()));
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Quarter {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<u64> for Quarter {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ValidationError::InvalidQuarter(value))
            .and_then(Self::new)
    }
}

impl From<Quarter> for u8 {
    fn from(value: Quarter) -> Self {
        value.0
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit payload for one round and token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootInfo {
    pub content: ContentHash,
    pub height: U256,
    pub width: U256,
}

/// Membership evidence for a client's balance in a committed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub client_opening_balance: U256,
    pub token: Address,
    pub client: Address,
    pub hashes: Vec<ContentHash>,
    pub sums: Vec<U256>,
    pub height: U256,
    pub width: U256,
    pub round: Round,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: U256,
    pub approval_id: U256,
    pub round: Round,
    pub buy_amount: U256,
    pub buy_asset: Address,
    pub sell_amount: U256,
    pub sell_asset: Address,
    pub client: Address,
    pub instance_id: Address,
}

/// Client-signed authorization for an order; paired with a `Signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: U256,
    pub round: Round,
    pub buy_amount: U256,
    pub buy_asset: Address,
    pub sell_amount: U256,
    pub sell_asset: Address,
    pub intent_to_buy: bool,
    pub owner: Address,
    pub instance_id: Address,
}

/// Raw signature bytes as accepted by the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Signature {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Operator authorization a client presents when opening a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    pub round: Round,
    pub client: Address,
    pub signature: Signature,
}

/// Dispute record assembled from several sequential contract reads.
///
/// `fill_count` is the on-chain counter only; fill bodies are fetched one at
/// a time by `(dispute_id, fill_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub client: Address,
    pub open: bool,
    pub round: Round,
    pub quarter: Quarter,
    pub fill_count: u64,
    pub opening_balances: Vec<U256>,
}

#[cfg(test)]
mod tests {
    use super::Quarter;

    #[test]
    fn quarter_accepts_only_four_values() {
        for q in 0u8..4 {
            assert_eq!(Quarter::new(q).unwrap().get(), q);
        }
        assert!(Quarter::new(4).is_err());
        assert!(Quarter::try_from(300u64).is_err());
        assert_eq!(Quarter::try_from(3u64).unwrap().get(), 3);
    }

    #[test]
    fn quarter_serde_validates() {
        let q: Quarter = serde_json::from_str("2").unwrap();
        assert_eq!(q.get(), 2);
        assert!(serde_json::from_str::<Quarter>("7").is_err());
        assert_eq!(serde_json::to_string(&q).unwrap(), "2");
    }
}
