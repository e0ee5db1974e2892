//! Pre-trade fraud risk engine.
//!
//! [`FraudRiskEngine::assess`] is a pure function of the request and the
//! requester's rolling history: no hidden state, no clocks of its own, no
//! side effects. History mutation is a separate, explicit set of operations
//! invoked by the lifecycle once order outcomes are known, and the
//! hourly/daily counter resets are idempotent scheduler tasks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::RiskConfig;
use crate::domain::{
    DeviceSignals, RequiredAction, RiskAssessment, RiskLevel, TokenAmount, UserHistory,
};

/// Scores a prospective order against the requester's rolling history.
pub struct FraudRiskEngine {
    config: RiskConfig,
}

impl FraudRiskEngine {
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Assess one prospective order. Deterministic for fixed inputs.
    #[must_use]
    pub fn assess(
        &self,
        amount: TokenAmount,
        history: &UserHistory,
        signals: Option<DeviceSignals>,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let mut score: u32 = 0;
        let mut reasons = Vec::new();
        let mut required_actions = Vec::new();
        let mut velocity_exceeded = false;

        // Velocity: hard caps block outright.
        if history.orders_last_hour >= self.config.max_orders_per_hour {
            score += 40;
            velocity_exceeded = true;
            reasons.push(format!(
                "hourly velocity cap exceeded: {} orders in the last hour (cap {})",
                history.orders_last_hour, self.config.max_orders_per_hour
            ));
        } else if history.orders_last_hour + 1 >= self.config.max_orders_per_hour {
            score += 15;
            reasons.push("approaching hourly velocity cap".into());
        }

        if history.orders_last_day >= self.config.max_orders_per_day {
            score += 30;
            velocity_exceeded = true;
            reasons.push(format!(
                "daily velocity cap exceeded: {} orders in the last day (cap {})",
                history.orders_last_day, self.config.max_orders_per_day
            ));
        }

        // Deviation from the user's historical average order size.
        let average = history.average_order();
        if !average.is_zero() {
            let ceiling = average.to_decimal() * self.config.deviation_multiplier;
            if amount.to_decimal() > ceiling {
                score += 20;
                reasons.push(format!(
                    "amount {} deviates from historical average {}",
                    amount,
                    average
                ));
                required_actions.push(RequiredAction::ReducedLimit {
                    max_units: TokenAmount::from_decimal(ceiling)
                        .unwrap_or(average)
                        .units(),
                });
            }
        }

        // Wallet age.
        let age_days = history.wallet_age_days(now);
        if age_days < self.config.new_wallet_age_days {
            score += 15;
            reasons.push(format!("wallet first seen {age_days} days ago"));
        }

        // Prior dispute ratio.
        if history.dispute_ratio() > self.config.dispute_ratio_threshold {
            score += 25;
            reasons.push(format!(
                "dispute ratio {:.2} above threshold",
                history.dispute_ratio()
            ));
            required_actions.push(RequiredAction::ManualReview);
        }

        // Device/IP signals, when present.
        if let Some(signals) = signals {
            if signals.shared_device {
                score += 10;
                reasons.push("device fingerprint shared with another requester".into());
            }
            if signals.anonymous_ip {
                score += 10;
                reasons.push("request via anonymizing IP".into());
            }
        }

        let score = score.min(100) as u8;
        let blocked = velocity_exceeded || score >= self.config.block_score;

        if velocity_exceeded {
            required_actions.insert(0, RequiredAction::VelocityCooldown);
        }
        if score >= 50 && !required_actions.contains(&RequiredAction::AdditionalVerification) {
            required_actions.push(RequiredAction::AdditionalVerification);
        }

        RiskAssessment {
            score,
            level: RiskLevel::from_score(score),
            blocked,
            required_actions,
            reasons,
        }
    }

    /// Bump velocity counters for a newly created order.
    pub fn record_created(&self, history: &mut UserHistory) {
        history.orders_last_hour += 1;
        history.orders_last_day += 1;
    }

    /// Fold a completed order into the rolling averages.
    pub fn record_completed(&self, history: &mut UserHistory, amount: TokenAmount) {
        history.completed_orders += 1;
        history.total_volume = history
            .total_volume
            .checked_add(amount)
            .unwrap_or(history.total_volume);
    }

    /// Count a disputed order against the requester.
    pub fn record_disputed(&self, history: &mut UserHistory) {
        history.disputed_orders += 1;
    }

    /// Zero the hourly counter. Idempotent; invoked by the scheduler.
    pub fn reset_hourly(&self, history: &mut UserHistory) {
        history.orders_last_hour = 0;
    }

    /// Zero the daily counter. Idempotent; invoked by the scheduler.
    pub fn reset_daily(&self, history: &mut UserHistory) {
        history.orders_last_day = 0;
    }

    /// Requested-amount ceiling currently applied to this user, if any.
    #[must_use]
    pub fn deviation_ceiling(&self, history: &UserHistory) -> Option<Decimal> {
        let average = history.average_order();
        if average.is_zero() {
            None
        } else {
            Some(average.to_decimal() * self.config.deviation_multiplier)
        }
    }
}
