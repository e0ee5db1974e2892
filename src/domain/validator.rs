//! Validator standing: stake, per-task locks, slashing.
//!
//! Invariants maintained by every method here:
//! `locked_amount == sum(locked_tasks[].amount)`, `locked_amount <= staked`,
//! and a slashed validator is permanently inactive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuorumError;

use super::id::{TaskId, WalletAddress};
use super::money::TokenAmount;

/// Stake locked against one open validation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeLock {
    pub task_id: TaskId,
    pub amount: TokenAmount,
    /// Past this instant an operator sweep may force-release the lock.
    pub expires_at: DateTime<Utc>,
}

/// One registered validator's standing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorProfile {
    pub address: WalletAddress,
    pub total_reviews: u64,
    pub accurate_reviews: u64,
    /// Total stake deposited, in smallest units.
    pub staked: TokenAmount,
    /// Stake currently locked against open tasks.
    pub locked_amount: TokenAmount,
    pub locked_tasks: Vec<StakeLock>,
    /// Terminal. A slashed validator can never accept new tasks.
    pub slashed: bool,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub version: u64,
}

impl ValidatorProfile {
    #[must_use]
    pub fn new(address: WalletAddress, staked: TokenAmount, now: DateTime<Utc>) -> Self {
        Self {
            address,
            total_reviews: 0,
            accurate_reviews: 0,
            staked,
            locked_amount: TokenAmount::ZERO,
            locked_tasks: Vec::new(),
            slashed: false,
            active: true,
            registered_at: now,
            version: 0,
        }
    }

    /// Stake not locked against any task.
    #[must_use]
    pub fn free_stake(&self) -> TokenAmount {
        self.staked - self.locked_amount
    }

    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.active && !self.slashed
    }

    /// Lock `amount` against `task_id` until `expires_at`.
    pub fn lock_stake(
        &mut self,
        task_id: TaskId,
        amount: TokenAmount,
        expires_at: DateTime<Utc>,
    ) -> Result<(), QuorumError> {
        if !self.is_eligible() {
            return Err(QuorumError::NotEligible {
                validator: self.address.to_string(),
                reason: if self.slashed { "slashed" } else { "inactive" }.into(),
            });
        }
        if self.free_stake() < amount {
            return Err(QuorumError::InsufficientStake {
                validator: self.address.to_string(),
                needed: amount.units(),
                available: self.free_stake().units(),
            });
        }
        self.locked_amount += amount;
        self.locked_tasks.push(StakeLock {
            task_id,
            amount,
            expires_at,
        });
        Ok(())
    }

    /// Release the lock held for `task_id`, if any. Idempotent.
    pub fn release_stake(&mut self, task_id: &TaskId) {
        if let Some(pos) = self.locked_tasks.iter().position(|l| &l.task_id == task_id) {
            let lock = self.locked_tasks.remove(pos);
            self.locked_amount -= lock.amount;
        }
    }

    /// Forfeit the stake locked for `task_id` and permanently deactivate.
    ///
    /// The forfeited amount leaves both the lock list and the total stake,
    /// so the locked-sum invariant holds afterwards.
    pub fn slash(&mut self, task_id: &TaskId) {
        if let Some(pos) = self.locked_tasks.iter().position(|l| &l.task_id == task_id) {
            let lock = self.locked_tasks.remove(pos);
            self.locked_amount -= lock.amount;
            self.staked -= lock.amount;
        }
        self.slashed = true;
        self.active = false;
    }

    /// Bump review counters after a task this validator voted on resolves.
    pub fn record_review(&mut self, accurate: bool) {
        self.total_reviews += 1;
        if accurate {
            self.accurate_reviews += 1;
        }
    }

    /// Lifetime accuracy in [0, 1]; 1.0 with no reviews yet.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_reviews == 0 {
            return 1.0;
        }
        self.accurate_reviews as f64 / self.total_reviews as f64
    }
}
