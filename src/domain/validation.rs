//! Proof-of-payment validation tasks and votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QuorumError;

use super::id::{OrderId, TaskId, WalletAddress};
use super::money::TokenAmount;

/// Validation task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Flagged,
    /// Deadline passed without a threshold; handed to arbitration.
    Escalated,
    /// Deadline passed with a zero-validator threshold configured.
    AutoApproved,
}

impl TaskStatus {
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A validator's decision on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Approve,
    Flag,
}

/// One recorded vote. Immutable once appended to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVote {
    pub validator: WalletAddress,
    pub decision: VoteDecision,
    pub notes: Option<String>,
    pub voted_at: DateTime<Utc>,
    /// Stake locked against this vote, in smallest units.
    pub stake_locked: TokenAmount,
}

/// Evidence bundle reviewed by validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Content identifier of the requester's payment QR image.
    pub requester_qr_reference: Option<String>,
    pub requester_wallet: WalletAddress,
    /// Content identifier of the solver's proof-of-payment upload.
    pub solver_proof_reference: String,
    pub solver_wallet: WalletAddress,
    pub token_amount: TokenAmount,
    pub fiat_amount: rust_decimal::Decimal,
    pub fiat_currency: String,
    pub payment_method: String,
}

/// One proof-of-payment review unit, 1:1 with an order settlement event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationTask {
    pub id: TaskId,
    pub order_id: OrderId,
    pub status: TaskStatus,
    pub evidence: EvidenceBundle,
    pub votes: Vec<ValidationVote>,
    /// Same-decision votes required to resolve.
    pub threshold: u32,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// "quorum", "deadline_sweep" or an arbitrator identity.
    pub resolved_by: Option<String>,
    /// Optimistic-concurrency token, bumped by the repository on every write.
    pub version: u64,
}

impl ValidationTask {
    #[must_use]
    pub fn new(
        order_id: OrderId,
        evidence: EvidenceBundle,
        threshold: u32,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            order_id,
            status: TaskStatus::Pending,
            evidence,
            votes: Vec::new(),
            threshold,
            created_at,
            deadline,
            resolved_at: None,
            resolved_by: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn has_voted(&self, validator: &WalletAddress) -> bool {
        self.votes.iter().any(|v| &v.validator == validator)
    }

    #[must_use]
    pub fn vote_count(&self, decision: VoteDecision) -> u32 {
        self.votes.iter().filter(|v| v.decision == decision).count() as u32
    }

    /// Whether `validator` is one of the order's two principals.
    /// Self-validation is forbidden.
    #[must_use]
    pub fn is_principal(&self, validator: &WalletAddress) -> bool {
        validator == &self.evidence.requester_wallet || validator == &self.evidence.solver_wallet
    }

    /// Append a vote after the duplicate and open-window checks pass.
    /// Votes are never mutated or removed once recorded.
    pub fn record_vote(&mut self, vote: ValidationVote, now: DateTime<Utc>) -> Result<(), QuorumError> {
        if self.status != TaskStatus::Pending {
            return Err(QuorumError::TaskClosed {
                task_id: self.id.to_string(),
                reason: format!("status is {:?}", self.status),
            });
        }
        if now >= self.deadline {
            return Err(QuorumError::TaskClosed {
                task_id: self.id.to_string(),
                reason: "deadline passed".into(),
            });
        }
        if self.has_voted(&vote.validator) {
            return Err(QuorumError::DuplicateVote {
                task_id: self.id.to_string(),
                validator: vote.validator.to_string(),
            });
        }
        self.votes.push(vote);
        Ok(())
    }

    /// Decision reached by the current vote tally, if any.
    #[must_use]
    pub fn tally(&self) -> Option<VoteDecision> {
        if self.vote_count(VoteDecision::Approve) >= self.threshold {
            Some(VoteDecision::Approve)
        } else if self.vote_count(VoteDecision::Flag) >= self.threshold {
            Some(VoteDecision::Flag)
        } else {
            None
        }
    }

    /// Mark resolved. `resolved_at` is set iff status leaves `Pending`.
    pub fn resolve(&mut self, status: TaskStatus, resolver: impl Into<String>, now: DateTime<Utc>) {
        debug_assert!(status.is_resolved());
        self.status = status;
        self.resolved_at = Some(now);
        self.resolved_by = Some(resolver.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn make_task(threshold: u32) -> ValidationTask {
        let now = Utc::now();
        ValidationTask::new(
            OrderId::from("ord-1"),
            EvidenceBundle {
                requester_qr_reference: Some("bafy-qr".into()),
                requester_wallet: WalletAddress::new("0xreq"),
                solver_proof_reference: "bafy-proof".into(),
                solver_wallet: WalletAddress::new("0xsol"),
                token_amount: TokenAmount::from_tokens(100),
                fiat_amount: dec!(1750),
                fiat_currency: "MXN".into(),
                payment_method: "spei".into(),
            },
            threshold,
            now,
            now + Duration::hours(2),
        )
    }

    fn vote(addr: &str, decision: VoteDecision) -> ValidationVote {
        ValidationVote {
            validator: WalletAddress::new(addr),
            decision,
            notes: None,
            voted_at: Utc::now(),
            stake_locked: TokenAmount::from_tokens(10),
        }
    }

    #[test]
    fn duplicate_vote_is_rejected() {
        let mut task = make_task(3);
        let now = Utc::now();
        task.record_vote(vote("0xv1", VoteDecision::Approve), now).unwrap();

        let err = task
            .record_vote(vote("0xv1", VoteDecision::Flag), now)
            .unwrap_err();
        assert!(matches!(err, QuorumError::DuplicateVote { .. }));
        assert_eq!(task.votes.len(), 1);
    }

    #[test]
    fn vote_after_deadline_is_rejected() {
        let mut task = make_task(3);
        let late = task.deadline + Duration::seconds(1);
        let err = task
            .record_vote(vote("0xv1", VoteDecision::Approve), late)
            .unwrap_err();
        assert!(matches!(err, QuorumError::TaskClosed { .. }));
    }

    #[test]
    fn tally_requires_threshold_of_same_decision() {
        let mut task = make_task(3);
        let now = Utc::now();
        task.record_vote(vote("0xv1", VoteDecision::Approve), now).unwrap();
        task.record_vote(vote("0xv2", VoteDecision::Approve), now).unwrap();
        task.record_vote(vote("0xv3", VoteDecision::Flag), now).unwrap();
        assert_eq!(task.tally(), None);

        task.record_vote(vote("0xv4", VoteDecision::Approve), now).unwrap();
        assert_eq!(task.tally(), Some(VoteDecision::Approve));
    }

    #[test]
    fn principals_are_detected_case_insensitively() {
        let task = make_task(3);
        assert!(task.is_principal(&WalletAddress::new("0xREQ")));
        assert!(task.is_principal(&WalletAddress::new("0xsol")));
        assert!(!task.is_principal(&WalletAddress::new("0xother")));
    }

    #[test]
    fn resolve_sets_timestamp_and_resolver() {
        let mut task = make_task(1);
        let now = Utc::now();
        assert!(task.resolved_at.is_none());

        task.resolve(TaskStatus::Approved, "quorum", now);
        assert_eq!(task.status, TaskStatus::Approved);
        assert_eq!(task.resolved_at, Some(now));
        assert_eq!(task.resolved_by.as_deref(), Some("quorum"));
    }
}
