//! Fraud-risk engine configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Hard velocity caps; exceeding either blocks outright.
    pub max_orders_per_hour: u32,
    pub max_orders_per_day: u32,
    /// Requested amount above this multiple of the user's average adds a
    /// deviation penalty.
    pub deviation_multiplier: Decimal,
    /// Wallets younger than this many days add an age penalty.
    pub new_wallet_age_days: i64,
    /// Dispute ratio above this adds a dispute penalty.
    pub dispute_ratio_threshold: f64,
    /// Scores at or above this are blocked regardless of level.
    pub block_score: u8,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_orders_per_hour: 6,
            max_orders_per_day: 20,
            deviation_multiplier: dec!(5),
            new_wallet_age_days: 7,
            dispute_ratio_threshold: 0.2,
            block_score: 75,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_orders_per_hour == 0 || self.max_orders_per_day == 0 {
            return Err(ConfigError::InvalidValue {
                field: "risk.max_orders_per_hour",
                reason: "velocity caps must be positive".into(),
            });
        }
        if self.max_orders_per_day < self.max_orders_per_hour {
            return Err(ConfigError::InvalidValue {
                field: "risk.max_orders_per_day",
                reason: "daily cap must be at least the hourly cap".into(),
            });
        }
        Ok(())
    }
}
