//! Rate locking and quote derivation.
//!
//! The oracle is treated as an unreliable external source: a failed fetch
//! falls back to the configured rate, labeled [`RateSource::Fallback`], so
//! quoting never fails. Fresh readings are cached briefly per instance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::QuoteConfig;
use crate::domain::{LockedRate, RateQuote, RateSource, TokenAmount};
use crate::error::Result;

/// Fiat/stablecoin price source.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Current fiat units per whole stablecoin token.
    async fn fetch_rate(&self) -> Result<Decimal>;
}

/// Price oracle over a JSON HTTP endpoint shaped like
/// `{"usd-coin": {"mxn": 17.45}}`.
pub struct HttpPriceOracle {
    client: reqwest::Client,
    url: String,
    currency: String,
}

impl HttpPriceOracle {
    #[must_use]
    pub fn new(url: impl Into<String>, currency: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn fetch_rate(&self) -> Result<Decimal> {
        let body: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let currency = self.currency.to_lowercase();
        body.as_object()
            .and_then(|top| top.values().next())
            .and_then(|pair| pair.get(&currency))
            .and_then(|rate| rate.as_str().map(str::to_owned).or_else(|| rate.as_f64().map(|f| f.to_string())))
            .and_then(|s| s.parse::<Decimal>().ok())
            .ok_or_else(|| {
                crate::error::Error::Input(crate::error::InputError::InvalidValue {
                    field: "oracle response",
                    reason: format!("no {currency} rate in payload"),
                })
            })
    }
}

/// Freezes an exchange rate and fee for the lifetime of an order.
pub struct RateLockService {
    oracle: Arc<dyn PriceOracle>,
    config: QuoteConfig,
    cache: Mutex<Option<LockedRate>>,
}

impl RateLockService {
    #[must_use]
    pub fn new(oracle: Arc<dyn PriceOracle>, config: QuoteConfig) -> Self {
        Self {
            oracle,
            config,
            cache: Mutex::new(None),
        }
    }

    /// Lock a rate. Never fails: an unreachable oracle yields the
    /// configured fallback rate with a `Fallback` label.
    pub async fn lock_rate(&self) -> LockedRate {
        let now = Utc::now();
        let cache_window = chrono::Duration::seconds(self.config.cache_secs as i64);
        if let Some(cached) = *self.cache.lock() {
            if now - cached.locked_at < cache_window {
                debug!(rate = %cached.rate, "serving cached rate");
                return LockedRate {
                    source: RateSource::Cached,
                    ..cached
                };
            }
        }

        let valid_until = now + chrono::Duration::seconds(self.config.lock_window_secs as i64);
        match self.oracle.fetch_rate().await {
            Ok(rate) => {
                let locked = LockedRate::new(rate, RateSource::Oracle, now, valid_until);
                *self.cache.lock() = Some(locked);
                locked
            }
            Err(error) => {
                warn!(error = %error, fallback = %self.config.fallback_rate, "oracle fetch failed, using fallback rate");
                LockedRate::new(self.config.fallback_rate, RateSource::Fallback, now, valid_until)
            }
        }
    }

    /// Derive a quote from a locked rate using the configured fee schedule.
    #[must_use]
    pub fn create_quote(&self, rate: &LockedRate, amount: TokenAmount) -> RateQuote {
        RateQuote::derive(
            rate,
            amount,
            self.config.fee_percent,
            TokenAmount::from_decimal(self.config.small_order_threshold)
                .unwrap_or(TokenAmount::ZERO),
            TokenAmount::from_decimal(self.config.small_order_fee).unwrap_or(TokenAmount::ZERO),
            self.config.fiat_currency.clone(),
        )
    }

    /// Lock a rate and quote `amount` in one step.
    pub async fn quote(&self, amount: TokenAmount) -> RateQuote {
        let rate = self.lock_rate().await;
        self.create_quote(&rate, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::testkit::ScriptedOracle;

    #[tokio::test]
    async fn healthy_oracle_rate_is_labeled_oracle() {
        let service = RateLockService::new(
            Arc::new(ScriptedOracle::healthy(dec!(17.45))),
            QuoteConfig::default(),
        );
        let rate = service.lock_rate().await;
        assert_eq!(rate.rate, dec!(17.45));
        assert_eq!(rate.source, RateSource::Oracle);
        assert!(rate.valid_until > rate.locked_at);
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_configured_rate() {
        let config = QuoteConfig::default();
        let fallback = config.fallback_rate;
        let service = RateLockService::new(Arc::new(ScriptedOracle::down()), config);

        let rate = service.lock_rate().await;
        assert_eq!(rate.rate, fallback);
        assert_eq!(rate.source, RateSource::Fallback);
    }

    #[tokio::test]
    async fn second_lock_within_window_hits_the_cache() {
        let oracle = Arc::new(ScriptedOracle::healthy(dec!(17.45)));
        let service = RateLockService::new(oracle.clone(), QuoteConfig::default());

        let first = service.lock_rate().await;
        let second = service.lock_rate().await;
        assert_eq!(oracle.calls(), 1);
        assert_eq!(second.source, RateSource::Cached);
        assert_eq!(second.rate, first.rate);
    }

    #[tokio::test]
    async fn quote_uses_configured_fee_schedule() {
        let service = RateLockService::new(
            Arc::new(ScriptedOracle::healthy(dec!(1))),
            QuoteConfig::default(),
        );
        // Defaults: 0.5% fee, threshold 10, surcharge 0.12.
        let quote = service.quote(TokenAmount::from_tokens(100)).await;
        assert_eq!(quote.fee, TokenAmount::from_units(500_000));
        assert_eq!(quote.total_payable, TokenAmount::from_units(100_500_000));
    }
}
