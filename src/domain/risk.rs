//! Fraud-risk records: rolling per-requester history and assessment output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::WalletAddress;
use super::money::TokenAmount;

/// Rolling counters kept per requester address.
///
/// The hourly and daily counters are zeroed by the scheduler's idempotent
/// reset tasks; the record itself carries no timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHistory {
    pub address: WalletAddress,
    pub orders_last_hour: u32,
    pub orders_last_day: u32,
    pub completed_orders: u64,
    pub disputed_orders: u64,
    /// Lifetime volume in smallest units.
    pub total_volume: TokenAmount,
    pub first_seen: DateTime<Utc>,
    pub version: u64,
}

impl UserHistory {
    #[must_use]
    pub fn new(address: WalletAddress, now: DateTime<Utc>) -> Self {
        Self {
            address,
            orders_last_hour: 0,
            orders_last_day: 0,
            completed_orders: 0,
            disputed_orders: 0,
            total_volume: TokenAmount::ZERO,
            first_seen: now,
            version: 0,
        }
    }

    /// Average completed order size, zero with no completions.
    #[must_use]
    pub fn average_order(&self) -> TokenAmount {
        if self.completed_orders == 0 {
            return TokenAmount::ZERO;
        }
        TokenAmount::from_units(self.total_volume.units() / self.completed_orders)
    }

    /// Disputes as a share of completed orders, in [0, 1].
    #[must_use]
    pub fn dispute_ratio(&self) -> f64 {
        let total = self.completed_orders + self.disputed_orders;
        if total == 0 {
            return 0.0;
        }
        self.disputed_orders as f64 / total as f64
    }

    /// Wallet age at `now`, in whole days.
    #[must_use]
    pub fn wallet_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.first_seen).num_days()
    }
}

/// Optional device/IP signals attached to an order request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSignals {
    /// Device fingerprint already seen on another requester.
    pub shared_device: bool,
    /// Request arrived through an anonymizing proxy or VPN exit.
    pub anonymous_ip: bool,
}

/// Discrete risk level derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Level bands over the [0, 100] score.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => Self::Low,
            25..=49 => Self::Medium,
            50..=74 => Self::High,
            _ => Self::Critical,
        }
    }
}

/// Remediation the caller must satisfy before the order can proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RequiredAction {
    /// Hourly or daily order cap exceeded; retry after the window resets.
    VelocityCooldown,
    /// Identity verification before larger orders.
    AdditionalVerification,
    /// Cap the order at a reduced amount.
    ReducedLimit { max_units: u64 },
    /// Route to a human reviewer.
    ManualReview,
}

/// Verdict for one prospective order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub blocked: bool,
    pub required_actions: Vec<RequiredAction>,
    /// Human-readable reasons for each contributing penalty.
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bands_cover_the_score_range() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(24), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn average_and_dispute_ratio_handle_empty_history() {
        let history = UserHistory::new(WalletAddress::new("0xnew"), Utc::now());
        assert_eq!(history.average_order(), TokenAmount::ZERO);
        assert_eq!(history.dispute_ratio(), 0.0);
    }

    #[test]
    fn average_order_divides_volume_by_completions() {
        let mut history = UserHistory::new(WalletAddress::new("0xuser"), Utc::now());
        history.completed_orders = 4;
        history.total_volume = TokenAmount::from_tokens(200);
        assert_eq!(history.average_order(), TokenAmount::from_tokens(50));
    }
}
