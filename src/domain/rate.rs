//! Rate locks and derived quotes.
//!
//! A [`LockedRate`] freezes one oracle reading with a validity window; a
//! [`RateQuote`] is derived from it once and never recomputed. Downstream
//! consumers must use the embedded rate and fee verbatim, which is the
//! anti-gaming guarantee against rate movement between quote and settlement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::TokenAmount;

/// Where a locked rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Fresh oracle reading.
    Oracle,
    /// Served from the short-lived in-process cache.
    Cached,
    /// Configured fallback, used when the oracle is unreachable.
    Fallback,
}

/// An exchange rate frozen at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockedRate {
    /// Fiat units per whole stablecoin token.
    pub rate: Decimal,
    pub source: RateSource,
    pub locked_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl LockedRate {
    #[must_use]
    pub fn new(
        rate: Decimal,
        source: RateSource,
        locked_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            rate,
            source,
            locked_at,
            valid_until,
        }
    }

    /// Validity is a pure function of the clock: `now < valid_until`.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}

/// A quote for one trade size, derived from a locked rate.
///
/// Immutable once issued. Repeated derivation with identical inputs yields
/// identical output, rounding included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate: Decimal,
    pub rate_source: RateSource,
    /// Fiat owed, rounded to the currency's minor unit.
    pub fiat_amount: Decimal,
    pub fiat_currency: String,
    /// Proportional fee plus any small-order surcharge, in smallest units.
    pub fee: TokenAmount,
    /// Amount plus fee, in smallest units.
    pub total_payable: TokenAmount,
    pub locked_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl RateQuote {
    /// Derive a quote for `amount` tokens.
    ///
    /// The fee is `amount * fee_percent`, plus `small_order_fee` flat when
    /// the amount is below `small_order_threshold`.
    #[must_use]
    pub fn derive(
        rate: &LockedRate,
        amount: TokenAmount,
        fee_percent: Decimal,
        small_order_threshold: TokenAmount,
        small_order_fee: TokenAmount,
        fiat_currency: impl Into<String>,
    ) -> Self {
        let mut fee = amount.percent_of(fee_percent);
        if amount < small_order_threshold {
            fee += small_order_fee;
        }
        let fiat_amount = (amount.to_decimal() * rate.rate).round_dp(2);

        Self {
            rate: rate.rate,
            rate_source: rate.source,
            fiat_amount,
            fiat_currency: fiat_currency.into(),
            fee,
            total_payable: amount + fee,
            locked_at: rate.locked_at,
            valid_until: rate.valid_until,
        }
    }

    /// Whether the embedded lock is still live.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}
