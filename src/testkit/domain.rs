//! Builders for domain values used across the test suites.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use crate::domain::{
    Direction, LockedRate, Order, RateQuote, RateSource, SolverId, TokenAmount, UserHistory,
    ValidatorProfile, WalletAddress,
};

/// A freshly created stablecoin-sell order for `tokens` whole tokens,
/// quoted against a fixed 17.00 rate.
pub fn open_order(requester: &str, tokens: u64) -> Order {
    let now = Utc::now();
    let rate = LockedRate {
        rate: dec!(17.00),
        source: RateSource::Oracle,
        locked_at: now,
        valid_until: now + Duration::seconds(300),
    };
    let amount = TokenAmount::from_tokens(tokens);
    let quote = RateQuote::derive(
        &rate,
        amount,
        dec!(0.5),
        TokenAmount::from_tokens(10),
        TokenAmount::from_decimal(dec!(0.12)).unwrap_or(TokenAmount::ZERO),
        "MXN",
    );
    Order::new(
        Direction::Sell,
        "requester-1",
        WalletAddress::new(requester),
        amount,
        quote,
        "spei",
        Some("CLABE 000000000000000000".into()),
        now,
    )
}

/// An order already matched with a solver.
pub fn matched_order(requester: &str, solver: &str, tokens: u64) -> Order {
    let mut order = open_order(requester, tokens);
    order
        .match_with(
            SolverId::from(solver),
            WalletAddress::new(&format!("0xs-{solver}")),
            Utc::now(),
        )
        .expect("fresh order accepts a match");
    order
}

/// A history record with the given velocity counters, first seen
/// `age_days` ago.
pub fn history_with_counts(
    address: &str,
    orders_last_hour: u32,
    orders_last_day: u32,
    age_days: i64,
) -> UserHistory {
    let mut history = UserHistory::new(
        WalletAddress::new(address),
        Utc::now() - Duration::days(age_days),
    );
    history.orders_last_hour = orders_last_hour;
    history.orders_last_day = orders_last_day;
    history
}

/// An active validator profile with `staked` whole tokens.
pub fn registered_profile(address: &str, staked: u64) -> ValidatorProfile {
    ValidatorProfile::new(
        WalletAddress::new(address),
        TokenAmount::from_tokens(staked),
        Utc::now(),
    )
}
