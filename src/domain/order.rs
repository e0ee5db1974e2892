//! Order entity and its lifecycle state machine.
//!
//! The legal status graph is encoded once, in [`OrderStatus::can_transition_to`],
//! and every mutation on [`Order`] goes through [`Order::transition`], which
//! validates legality before touching any field. An illegal call returns
//! [`LifecycleError::InvalidTransition`] and leaves the order untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

use super::id::{OrderId, SolverId, WalletAddress};
use super::money::TokenAmount;
use super::rate::RateQuote;

/// Trade direction from the requester's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Requester buys stablecoin with fiat.
    Buy,
    /// Requester sells stablecoin for fiat.
    Sell,
}

/// Order lifecycle states.
///
/// ```text
/// created -> matched -> payment_pending -> payment_sent -> verifying
///   -> { completed -> settled | disputed -> mediation -> { settled | cancelled } }
/// created -> { cancelled | expired }   (pre-match only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Matched,
    PaymentPending,
    PaymentSent,
    Verifying,
    Completed,
    Disputed,
    Mediation,
    Settled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::{
            Cancelled, Completed, Created, Disputed, Expired, Matched, Mediation, PaymentPending,
            PaymentSent, Settled, Verifying,
        };
        matches!(
            (self, next),
            (Created, Matched | Cancelled | Expired)
                | (Matched, PaymentPending)
                | (PaymentPending, PaymentSent)
                | (PaymentSent, Verifying)
                | (Verifying, Completed | Disputed)
                | (Completed, Settled)
                | (Disputed, Mediation)
                | (Mediation, Settled | Cancelled)
        )
    }

    /// Terminal states admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled | Self::Expired)
    }

    /// True once a solver has been attached.
    #[must_use]
    pub fn is_matched(self) -> bool {
        !matches!(self, Self::Created | Self::Cancelled | Self::Expired)
    }
}

/// Outcome fed back from the validation quorum into the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementOutcome {
    /// Proof of payment approved; order completes and settles.
    Approved,
    /// Proof flagged; order enters dispute.
    Flagged,
}

/// One requested stablecoin-for-fiat trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub direction: Direction,
    pub status: OrderStatus,
    pub requester_id: String,
    pub requester_wallet: WalletAddress,
    pub solver_id: Option<SolverId>,
    pub solver_wallet: Option<WalletAddress>,
    pub token_amount: TokenAmount,
    /// Frozen at creation; downstream consumers use its rate and fee verbatim.
    pub quote: RateQuote,
    pub payment_method: String,
    /// QR payload / bank details the solver pays against.
    pub payment_instructions: Option<String>,
    /// Content identifier of the solver's proof-of-payment upload.
    pub proof_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub dispute_window_ends_at: Option<DateTime<Utc>>,
    pub stake_lock_expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    /// Optimistic-concurrency token, bumped by the repository on every write.
    pub version: u64,
}

impl Order {
    /// Create a new order in `Created` with a frozen quote.
    #[must_use]
    pub fn new(
        direction: Direction,
        requester_id: impl Into<String>,
        requester_wallet: WalletAddress,
        token_amount: TokenAmount,
        quote: RateQuote,
        payment_method: impl Into<String>,
        payment_instructions: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            direction,
            status: OrderStatus::Created,
            requester_id: requester_id.into(),
            requester_wallet,
            solver_id: None,
            solver_wallet: None,
            token_amount,
            quote,
            payment_method: payment_method.into(),
            payment_instructions,
            proof_reference: None,
            created_at: now,
            matched_at: None,
            payment_sent_at: None,
            dispute_window_ends_at: None,
            stake_lock_expires_at: None,
            completed_at: None,
            settled_at: None,
            dispute_reason: None,
            version: 0,
        }
    }

    /// Validate and apply a status change. Does not touch timestamps or
    /// side fields; the named transition methods below do that after this
    /// check passes, so a rejected call never partially mutates.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                order_id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Attach a solver: `created -> matched`.
    pub fn match_with(
        &mut self,
        solver_id: SolverId,
        solver_wallet: WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Matched)?;
        self.solver_id = Some(solver_id);
        self.solver_wallet = Some(solver_wallet);
        self.matched_at = Some(now);
        Ok(())
    }

    /// `matched -> payment_pending`.
    pub fn begin_payment(&mut self) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::PaymentPending)
    }

    /// `payment_pending -> payment_sent`.
    pub fn record_payment_sent(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::PaymentSent)?;
        self.payment_sent_at = Some(now);
        Ok(())
    }

    /// Attach a proof reference and move `payment_sent -> verifying`.
    /// Open the verification phase and start the dispute window.
    pub fn mark_verifying(
        &mut self,
        dispute_window_ends_at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Verifying)?;
        self.dispute_window_ends_at = Some(dispute_window_ends_at);
        Ok(())
    }

    /// Attach the solver's proof of payment, entering verification first
    /// if the solver has not marked it explicitly.
    pub fn submit_proof(
        &mut self,
        proof_reference: impl Into<String>,
        dispute_window_ends_at: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.status != OrderStatus::Verifying {
            self.mark_verifying(dispute_window_ends_at)?;
        }
        self.proof_reference = Some(proof_reference.into());
        Ok(())
    }

    /// Quorum approval: `verifying -> completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Final settlement of a completed order: `completed -> settled`.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Settled)?;
        self.settled_at = Some(now);
        Ok(())
    }

    /// Quorum flag: `verifying -> disputed`.
    pub fn flag_disputed(&mut self, reason: Option<String>) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Disputed)?;
        self.dispute_reason =
            Some(reason.unwrap_or_else(|| "proof flagged by validation quorum".into()));
        Ok(())
    }

    /// `disputed -> mediation`.
    pub fn escalate_to_mediation(&mut self) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Mediation)
    }

    /// Close out mediation: `mediation -> settled` when the requester
    /// prevails, `mediation -> cancelled` otherwise.
    pub fn resolve_mediation(
        &mut self,
        settled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if settled {
            self.transition(OrderStatus::Settled)?;
            self.settled_at = Some(now);
        } else {
            self.transition(OrderStatus::Cancelled)?;
        }
        Ok(())
    }

    /// Pre-match cancellation: `created -> cancelled`.
    pub fn cancel(&mut self) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Cancelled)
    }

    /// Sweep expiry: `created -> expired`.
    pub fn expire(&mut self) -> Result<(), LifecycleError> {
        self.transition(OrderStatus::Expired)
    }
}
