//! Fixed-point monetary types.
//!
//! Stablecoin amounts and validator stakes are integers in the token's
//! smallest unit (six decimals, USDC-style). All stake accounting is
//! integer-only; `rust_decimal` is used at the edges for rate and fee
//! arithmetic, never for balances.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places in the token's smallest unit.
pub const TOKEN_DECIMALS: u32 = 6;

/// Smallest units per whole token.
pub const UNITS_PER_TOKEN: u64 = 1_000_000;

/// A stablecoin amount in smallest units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Create from a raw smallest-unit count.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Create from a whole-token count.
    #[must_use]
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens * UNITS_PER_TOKEN)
    }

    /// Convert a decimal token amount, rejecting negatives and values
    /// with sub-unit precision left after rounding to six places.
    #[must_use]
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            return None;
        }
        let units = (value * Decimal::from(UNITS_PER_TOKEN))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        units.to_u64().map(Self)
    }

    /// Raw smallest-unit count.
    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Whole-token decimal representation.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(UNITS_PER_TOKEN)
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// A percentage of this amount, rounded half-up to the smallest unit.
    ///
    /// `pct` is expressed in percent: `percent_of(dec!(0.5))` is 0.5%.
    #[must_use]
    pub fn percent_of(self, pct: Decimal) -> Self {
        let units = Decimal::from(self.0) * pct / Decimal::from(100);
        let rounded = units.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self(rounded.to_u64().unwrap_or(0))
    }
}

impl Add for TokenAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TokenAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TokenAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for TokenAmount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_round_trip() {
        let amount = TokenAmount::from_decimal(dec!(100.50)).unwrap();
        assert_eq!(amount.units(), 100_500_000);
        assert_eq!(amount.to_decimal(), dec!(100.50));
    }

    #[test]
    fn rejects_negative() {
        assert!(TokenAmount::from_decimal(dec!(-1)).is_none());
    }

    #[test]
    fn percent_is_exact_for_scenario_amounts() {
        // 100.00 tokens at 0.5% -> 0.50
        let fee = TokenAmount::from_tokens(100).percent_of(dec!(0.5));
        assert_eq!(fee, TokenAmount::from_units(500_000));

        // 5.00 tokens at 0.5% -> 0.025
        let fee = TokenAmount::from_tokens(5).percent_of(dec!(0.5));
        assert_eq!(fee, TokenAmount::from_units(25_000));
    }

    #[test]
    fn checked_sub_underflow_is_none() {
        let a = TokenAmount::from_units(1);
        let b = TokenAmount::from_units(2);
        assert!(a.checked_sub(b).is_none());
    }
}
