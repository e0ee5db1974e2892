//! Rate-lock and fee configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// Proportional fee in percent (0.5 = 0.5%).
    pub fee_percent: Decimal,
    /// Orders below this many whole tokens pay the flat surcharge.
    pub small_order_threshold: Decimal,
    /// Flat surcharge in whole tokens.
    pub small_order_fee: Decimal,
    /// How long a locked rate stays quotable, in seconds.
    pub lock_window_secs: u64,
    /// Oracle readings younger than this are served from cache.
    pub cache_secs: u64,
    /// Labeled fallback rate when the oracle is unreachable.
    pub fallback_rate: Decimal,
    pub fiat_currency: String,
    pub oracle_url: String,
    /// Order size bounds in whole tokens.
    pub min_order: Decimal,
    pub max_order: Decimal,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            fee_percent: dec!(0.5),
            small_order_threshold: dec!(10),
            small_order_fee: dec!(0.12),
            lock_window_secs: 300,
            cache_secs: 30,
            fallback_rate: dec!(17.00),
            fiat_currency: "MXN".into(),
            oracle_url: "https://api.coingecko.com/api/v3/simple/price?ids=usd-coin&vs_currencies=mxn".into(),
            min_order: dec!(1),
            max_order: dec!(10000),
        }
    }
}

impl QuoteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_percent.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                field: "quote.fee_percent",
                reason: "must be non-negative".into(),
            });
        }
        if self.fallback_rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "quote.fallback_rate",
                reason: "must be positive".into(),
            });
        }
        if self.min_order <= Decimal::ZERO || self.max_order < self.min_order {
            return Err(ConfigError::InvalidValue {
                field: "quote.min_order",
                reason: "require 0 < min_order <= max_order".into(),
            });
        }
        Ok(())
    }
}
