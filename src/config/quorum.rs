//! Validation quorum configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Same-decision votes required to resolve a task. Zero switches the
    /// deployment to auto-approval at the deadline sweep.
    pub threshold: u32,
    /// Stake locked per accepted vote, in whole tokens.
    pub stake_per_vote: Decimal,
    /// Voting window from task creation, in seconds.
    pub deadline_secs: u64,
    /// Dispute window attached to the order at proof submission.
    pub dispute_window_secs: u64,
    /// Stake locks past this horizon may be force-released by an
    /// operator sweep.
    pub stake_lock_secs: u64,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            stake_per_vote: dec!(10),
            deadline_secs: 2 * 60 * 60,
            dispute_window_secs: 24 * 60 * 60,
            stake_lock_secs: 72 * 60 * 60,
        }
    }
}

impl QuorumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stake_per_vote.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                field: "quorum.stake_per_vote",
                reason: "must be non-negative".into(),
            });
        }
        if self.deadline_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "quorum.deadline_secs",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
