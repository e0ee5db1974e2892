//! Decentralized validation quorum.
//!
//! Manages proof-of-payment validation tasks: vote collection, threshold
//! resolution, and validator stake lock/release/slash. Resolution feeds the
//! order lifecycle through its settlement entry point. Stake accounting is
//! integer smallest units throughout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::QuorumConfig;
use crate::domain::{
    EvidenceBundle, Order, SettlementOutcome, TaskId, TaskStatus, TokenAmount, ValidationTask,
    ValidationVote, ValidatorProfile, VoteDecision, WalletAddress,
};
use crate::error::{Error, QuorumError, Result};
use crate::repository::ValidatorRepository;
use crate::service::lifecycle::OrderLifecycle;

/// Vote collection and stake management over validation tasks.
pub struct ValidationQuorum {
    validators: Arc<ValidatorRepository>,
    lifecycle: Arc<OrderLifecycle>,
    config: QuorumConfig,
}

impl ValidationQuorum {
    #[must_use]
    pub fn new(
        validators: Arc<ValidatorRepository>,
        lifecycle: Arc<OrderLifecycle>,
        config: QuorumConfig,
    ) -> Self {
        Self {
            validators,
            lifecycle,
            config,
        }
    }

    /// Register a validator with an initial stake deposit.
    pub async fn register_validator(
        &self,
        address: WalletAddress,
        staked: TokenAmount,
    ) -> Result<ValidatorProfile> {
        let profile = ValidatorProfile::new(address, staked, Utc::now());
        self.validators.insert_profile(&profile).await?;
        info!(validator = %profile.address, staked = %profile.staked, "validator registered");
        Ok(profile)
    }

    /// Open a validation task for a verifying order.
    ///
    /// Fails with [`QuorumError::AlreadyOpen`] when a pending task exists
    /// for the order.
    pub async fn open_task(&self, order: &Order) -> Result<ValidationTask> {
        if self
            .validators
            .pending_task_for_order(&order.id)
            .await?
            .is_some()
        {
            return Err(Error::Quorum(QuorumError::AlreadyOpen {
                order_id: order.id.to_string(),
            }));
        }

        let solver_wallet = order.solver_wallet.clone().ok_or_else(|| {
            Error::Input(crate::error::InputError::MissingField {
                field: "solver_wallet",
            })
        })?;
        let proof = order.proof_reference.clone().ok_or_else(|| {
            Error::Input(crate::error::InputError::MissingField {
                field: "proof_reference",
            })
        })?;

        let now = Utc::now();
        let task = ValidationTask::new(
            order.id.clone(),
            EvidenceBundle {
                requester_qr_reference: order.payment_instructions.clone(),
                requester_wallet: order.requester_wallet.clone(),
                solver_proof_reference: proof,
                solver_wallet,
                token_amount: order.token_amount,
                fiat_amount: order.quote.fiat_amount,
                fiat_currency: order.quote.fiat_currency.clone(),
                payment_method: order.payment_method.clone(),
            },
            self.config.threshold,
            now,
            now + chrono::Duration::seconds(self.config.deadline_secs as i64),
        );
        self.validators.insert_task(&task).await?;
        info!(task_id = %task.id, order_id = %order.id, threshold = task.threshold, "validation task opened");
        Ok(task)
    }

    /// Record a vote, locking stake against the validator's profile, and
    /// resolve the task if the vote reaches the threshold.
    pub async fn cast_vote(
        &self,
        task_id: &TaskId,
        validator: &WalletAddress,
        decision: VoteDecision,
        notes: Option<String>,
    ) -> Result<ValidationTask> {
        let mut task = self.load_task(task_id).await?;

        let mut profile = self
            .validators
            .get_profile(validator)
            .await?
            .ok_or_else(|| {
                Error::Quorum(QuorumError::NotEligible {
                    validator: validator.to_string(),
                    reason: "not registered".into(),
                })
            })?;
        if !profile.is_eligible() {
            return Err(Error::Quorum(QuorumError::NotEligible {
                validator: validator.to_string(),
                reason: if profile.slashed { "slashed" } else { "inactive" }.into(),
            }));
        }
        if task.is_principal(validator) {
            return Err(Error::Quorum(QuorumError::NotEligible {
                validator: validator.to_string(),
                reason: "order principals may not validate their own trade".into(),
            }));
        }

        let now = Utc::now();
        let stake = TokenAmount::from_decimal(self.config.stake_per_vote)
            .unwrap_or(TokenAmount::ZERO);
        let vote = ValidationVote {
            validator: validator.clone(),
            decision,
            notes,
            voted_at: now,
            stake_locked: stake,
        };
        // The vote carries the duplicate/closed checks; stake is locked
        // only after they pass, so a rejected vote mutates nothing.
        task.record_vote(vote, now).map_err(Error::Quorum)?;
        profile
            .lock_stake(
                task.id.clone(),
                stake,
                now + chrono::Duration::seconds(self.config.stake_lock_secs as i64),
            )
            .map_err(Error::Quorum)?;
        self.validators.update_profile(&mut profile).await?;

        if let Some(ruling) = task.tally() {
            self.resolve_by_quorum(&mut task, ruling, now).await?;
        }
        self.validators.update_task(&mut task).await?;
        Ok(task)
    }

    /// Deadline sweep over pending tasks. Past-deadline tasks either
    /// auto-approve (zero-threshold deployments) or escalate, with stakes
    /// left locked until arbitration rules. Idempotent.
    pub async fn sweep_deadlines(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut swept = 0;
        for mut task in self.validators.pending_tasks().await? {
            if now < task.deadline {
                continue;
            }
            if self.config.threshold == 0 {
                task.resolve(TaskStatus::AutoApproved, "deadline_sweep", now);
                self.lifecycle
                    .resolve_settlement(&task.order_id, SettlementOutcome::Approved, None)
                    .await?;
            } else {
                task.resolve(TaskStatus::Escalated, "deadline_sweep", now);
                warn!(task_id = %task.id, order_id = %task.order_id, "task escalated to arbitration");
            }
            match self.validators.update_task(&mut task).await {
                Ok(()) => swept += 1,
                // Another instance swept this task first.
                Err(Error::Conflict { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(swept)
    }

    /// Force-release stake locks whose expiry horizon passed without a
    /// ruling. Reclaims locks orphaned by a lost task write or an
    /// arbitration that never arrived. Idempotent.
    pub async fn release_expired_locks(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut released = 0;
        for mut profile in self.validators.all_profiles().await? {
            let expired: Vec<TaskId> = profile
                .locked_tasks
                .iter()
                .filter(|lock| lock.expires_at <= now)
                .map(|lock| lock.task_id.clone())
                .collect();
            if expired.is_empty() {
                continue;
            }
            for task_id in &expired {
                profile.release_stake(task_id);
            }
            match self.validators.update_profile(&mut profile).await {
                Ok(()) => {
                    warn!(
                        validator = %profile.address,
                        count = expired.len(),
                        "force-released expired stake locks"
                    );
                    released += expired.len();
                }
                // Another instance got to this profile first.
                Err(Error::Conflict { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(released)
    }

    /// Apply an arbitration ruling to an escalated task.
    ///
    /// Voters who agreed with the ruling have their stake released and
    /// accuracy credited. A voter who approved a proof ruled fraudulent
    /// is slashed; a voter who
    /// flagged an ultimately fine proof only loses accuracy.
    pub async fn apply_arbitration(
        &self,
        task_id: &TaskId,
        ruling: VoteDecision,
        arbitrator: &str,
    ) -> Result<ValidationTask> {
        let mut task = self.load_task(task_id).await?;
        if task.status != TaskStatus::Escalated {
            return Err(Error::Quorum(QuorumError::TaskClosed {
                task_id: task_id.to_string(),
                reason: format!("expected escalated, found {:?}", task.status),
            }));
        }

        let now = Utc::now();
        for vote in task.votes.clone() {
            let Some(mut profile) = self.validators.get_profile(&vote.validator).await? else {
                continue;
            };
            let correct = vote.decision == ruling;
            if !correct && ruling == VoteDecision::Flag {
                profile.slash(&task.id);
                warn!(validator = %vote.validator, task_id = %task.id, "validator slashed for approving fraud");
            } else {
                profile.release_stake(&task.id);
            }
            profile.record_review(correct);
            self.validators.update_profile(&mut profile).await?;
        }

        let (status, outcome) = match ruling {
            VoteDecision::Approve => (TaskStatus::Approved, SettlementOutcome::Approved),
            VoteDecision::Flag => (TaskStatus::Flagged, SettlementOutcome::Flagged),
        };
        task.resolve(status, arbitrator, now);
        self.validators.update_task(&mut task).await?;
        self.lifecycle
            .resolve_settlement(&task.order_id, outcome, None)
            .await?;
        Ok(task)
    }

    /// Threshold reached: release every voter's stake, credit accuracy,
    /// and feed the outcome into the lifecycle.
    async fn resolve_by_quorum(
        &self,
        task: &mut ValidationTask,
        ruling: VoteDecision,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for vote in task.votes.clone() {
            let Some(mut profile) = self.validators.get_profile(&vote.validator).await? else {
                continue;
            };
            profile.release_stake(&task.id);
            profile.record_review(vote.decision == ruling);
            self.validators.update_profile(&mut profile).await?;
        }

        let (status, outcome) = match ruling {
            VoteDecision::Approve => (TaskStatus::Approved, SettlementOutcome::Approved),
            VoteDecision::Flag => (TaskStatus::Flagged, SettlementOutcome::Flagged),
        };
        task.resolve(status, "quorum", now);
        info!(task_id = %task.id, order_id = %task.order_id, ?status, "task resolved by quorum");
        self.lifecycle
            .resolve_settlement(&task.order_id, outcome, None)
            .await?;
        Ok(())
    }

    async fn load_task(&self, task_id: &TaskId) -> Result<ValidationTask> {
        self.validators.get_task(task_id).await?.ok_or_else(|| {
            Error::Quorum(QuorumError::TaskNotFound {
                task_id: task_id.to_string(),
            })
        })
    }
}
