//! Submission tuning shared by the broadcaster, poller and resubmitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_MINING_POLLS: u32 = 20;
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 4_000;
pub const DEFAULT_COMMIT_GAS_LIMIT: u64 = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Broadcast+poll cycles for an escalated submission.
    pub retry_limit: u32,
    /// Broadcast attempts before a transport failure is fatal.
    pub submission_limit: u32,
    pub polling_interval_ms: u64,
    /// Receipt polls per inclusion wait.
    pub mining_polls: u32,
    /// Escalate a reverted transaction like a stuck one instead of failing.
    pub retry_on_revert: bool,
    /// Zero lets the node pick.
    pub gas_price: u128,
    /// Zero lets the node estimate.
    pub gas_limit: u64,
    pub commit_gas_limit: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            submission_limit: DEFAULT_RETRY_LIMIT,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            mining_polls: DEFAULT_MINING_POLLS,
            retry_on_revert: true,
            gas_price: 0,
            gas_limit: 0,
            commit_gas_limit: DEFAULT_COMMIT_GAS_LIMIT,
        }
    }
}

impl SubmissionConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn gas_price_override(&self) -> Option<u128> {
        (self.gas_price != 0).then_some(self.gas_price)
    }

    pub fn gas_limit_override(&self) -> Option<u64> {
        (self.gas_limit != 0).then_some(self.gas_limit)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_limit == 0 {
            return Err(ConfigError::Zero("retry_limit"));
        }
        if self.submission_limit == 0 {
            return Err(ConfigError::Zero("submission_limit"));
        }
        if self.mining_polls == 0 {
            return Err(ConfigError::Zero("mining_polls"));
        }
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::Zero("polling_interval_ms"));
        }
        if self.commit_gas_limit == 0 {
            return Err(ConfigError::Zero("commit_gas_limit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SubmissionConfig;
    use crate::error::ConfigError;

    #[test]
    fn defaults_are_valid() {
        let config = SubmissionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.mining_polls, 20);
        assert!(config.retry_on_revert);
        assert_eq!(config.gas_price_override(), None);
        assert_eq!(config.gas_limit_override(), None);
    }

    #[test]
    fn rejects_zero_limits() {
        for (config, field) in [
            (
                SubmissionConfig {
                    retry_limit: 0,
                    ..SubmissionConfig::default()
                },
                "retry_limit",
            ),
            (
                SubmissionConfig {
                    submission_limit: 0,
                    ..SubmissionConfig::default()
                },
                "submission_limit",
            ),
            (
                SubmissionConfig {
                    mining_polls: 0,
                    ..SubmissionConfig::default()
                },
                "mining_polls",
            ),
        ] {
            assert_eq!(config.validate(), Err(ConfigError::Zero(field)));
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SubmissionConfig =
            serde_json::from_str(r#"{"gas_price": 20000000000, "retry_on_revert": false}"#)
                .unwrap();
        assert_eq!(config.gas_price_override(), Some(20_000_000_000));
        assert!(!config.retry_on_revert);
        assert_eq!(config.commit_gas_limit, 200_000);
    }
}
