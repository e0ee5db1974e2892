//! The authoritative order state machine.
//!
//! Composes the order repository, rate-lock service and fraud risk engine
//! at creation time, and is driven by validation-quorum outcomes at
//! settlement time. Every successful transition is broadcast through the
//! notification hub with a transition tag; every rejected call leaves the
//! stored order untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::{QuorumConfig, QuoteConfig};
use crate::domain::{
    DeviceSignals, Direction, Order, OrderId, OrderStatus, RiskAssessment, SettlementOutcome,
    SolverId, TokenAmount, WalletAddress,
};
use crate::error::{Error, InputError, LifecycleError, Result};
use crate::notify::{NotificationHub, StreamMessage, UpdateKind};
use crate::repository::{HistoryRepository, OrderRepository};
use crate::service::rate::RateLockService;
use crate::service::risk::FraudRiskEngine;

/// An order-creation request as it arrives from the API surface.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub direction: Direction,
    pub requester_id: String,
    pub requester_wallet: WalletAddress,
    pub token_amount: TokenAmount,
    pub payment_method: String,
    pub payment_instructions: Option<String>,
    pub signals: Option<DeviceSignals>,
}

/// Stateless driver of the order state machine.
pub struct OrderLifecycle {
    orders: Arc<OrderRepository>,
    history: Arc<HistoryRepository>,
    risk: Arc<FraudRiskEngine>,
    rates: Arc<RateLockService>,
    hub: Arc<NotificationHub>,
    quote_config: QuoteConfig,
    dispute_window: chrono::Duration,
}

impl OrderLifecycle {
    #[must_use]
    pub fn new(
        orders: Arc<OrderRepository>,
        history: Arc<HistoryRepository>,
        risk: Arc<FraudRiskEngine>,
        rates: Arc<RateLockService>,
        hub: Arc<NotificationHub>,
        quote_config: QuoteConfig,
        quorum_config: &QuorumConfig,
    ) -> Self {
        Self {
            orders,
            history,
            risk,
            rates,
            hub,
            quote_config,
            dispute_window: chrono::Duration::seconds(quorum_config.dispute_window_secs as i64),
        }
    }

    /// Validate, risk-assess, quote and persist a new order.
    ///
    /// Fails with [`LifecycleError::RiskBlocked`] when the verdict blocks;
    /// nothing is persisted in that case.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<(Order, RiskAssessment)> {
        Self::validate_request(&request)?;
        self.check_amount_bounds(request.token_amount)?;

        let now = Utc::now();
        let mut history = self.history.get_or_default(&request.requester_wallet).await?;
        let assessment =
            self.risk
                .assess(request.token_amount, &history, request.signals, now);
        if assessment.blocked {
            info!(
                requester = %request.requester_wallet,
                score = assessment.score,
                "order creation blocked by risk verdict"
            );
            return Err(Error::Lifecycle(LifecycleError::RiskBlocked {
                score: assessment.score,
                required_actions: assessment.required_actions,
            }));
        }

        let quote = self.rates.quote(request.token_amount).await;
        let order = Order::new(
            request.direction,
            request.requester_id,
            request.requester_wallet.clone(),
            request.token_amount,
            quote,
            request.payment_method,
            request.payment_instructions,
            now,
        );
        self.orders.insert(&order).await?;

        // Velocity counters bump after the order exists; a conflict here
        // means another instance already counted something, so retry once
        // against the fresh record and otherwise just log.
        self.risk.record_created(&mut history);
        if let Err(error) = self.history.update(&mut history).await {
            if matches!(error, Error::Conflict { .. }) {
                let mut fresh = self.history.get_or_default(&request.requester_wallet).await?;
                self.risk.record_created(&mut fresh);
                if let Err(retry) = self.history.update(&mut fresh).await {
                    warn!(error = %retry, "failed to persist velocity counters");
                }
            } else {
                warn!(error = %error, "failed to persist velocity counters");
            }
        }

        info!(order_id = %order.id, amount = %order.token_amount, "order created");
        self.hub.announce_order(order.clone());
        Ok((order, assessment))
    }

    /// Attach a solver to an open order.
    pub async fn match_order(
        &self,
        order_id: &OrderId,
        solver_id: SolverId,
        solver_wallet: WalletAddress,
    ) -> Result<Order> {
        self.mutate(order_id, UpdateKind::Matched, |order, now| {
            order.match_with(solver_id.clone(), solver_wallet.clone(), now)
        })
        .await
    }

    /// Payment instructions delivered; the solver owes fiat.
    pub async fn begin_payment(&self, order_id: &OrderId) -> Result<Order> {
        self.mutate(order_id, UpdateKind::PaymentPending, |order, _| {
            order.begin_payment()
        })
        .await
    }

    /// The paying side reports fiat sent.
    pub async fn record_payment_sent(&self, order_id: &OrderId) -> Result<Order> {
        self.mutate(order_id, UpdateKind::PaymentSent, |order, now| {
            order.record_payment_sent(now)
        })
        .await
    }

    /// Proof of payment uploaded; the order moves to verification.
    /// Solver opens verification before uploading the proof.
    pub async fn mark_verifying(&self, order_id: &OrderId) -> Result<Order> {
        let dispute_window = self.dispute_window;
        self.mutate(order_id, UpdateKind::Verifying, |order, now| {
            order.mark_verifying(now + dispute_window)
        })
        .await
    }

    pub async fn submit_proof(&self, order_id: &OrderId, proof_reference: &str) -> Result<Order> {
        let dispute_window = self.dispute_window;
        self.mutate(order_id, UpdateKind::Verifying, |order, now| {
            order.submit_proof(proof_reference, now + dispute_window)
        })
        .await
    }

    /// Apply a quorum outcome. This is the only settlement entry point and
    /// is authoritative over any client-submitted status.
    pub async fn resolve_settlement(
        &self,
        order_id: &OrderId,
        outcome: SettlementOutcome,
        reason: Option<String>,
    ) -> Result<Order> {
        // Approval runs two transitions and each one goes out on the
        // stream, so solvers watching for completion see both edges.
        let order = match outcome {
            SettlementOutcome::Approved => {
                self.mutate(order_id, UpdateKind::Completed, |order, now| {
                    order.complete(now)
                })
                .await?;
                self.mutate(order_id, UpdateKind::Settled, |order, now| order.settle(now))
                    .await?
            }
            SettlementOutcome::Flagged => {
                self.mutate(order_id, UpdateKind::Disputed, |order, _| {
                    order.flag_disputed(reason.clone())
                })
                .await?
            }
        };

        // Fold the outcome into the requester's rolling history.
        let mut history = self.history.get_or_default(&order.requester_wallet).await?;
        match outcome {
            SettlementOutcome::Approved => {
                self.risk.record_completed(&mut history, order.token_amount);
            }
            SettlementOutcome::Flagged => self.risk.record_disputed(&mut history),
        }
        if let Err(error) = self.history.update(&mut history).await {
            warn!(error = %error, order_id = %order_id, "failed to persist outcome counters");
        }
        Ok(order)
    }

    /// Escalate a disputed order into mediation.
    pub async fn escalate_to_mediation(&self, order_id: &OrderId) -> Result<Order> {
        self.mutate(order_id, UpdateKind::Mediation, |order, _| {
            order.escalate_to_mediation()
        })
        .await
    }

    /// Close out mediation with a final ruling.
    pub async fn resolve_mediation(&self, order_id: &OrderId, settled: bool) -> Result<Order> {
        let update = if settled {
            UpdateKind::Settled
        } else {
            UpdateKind::Cancelled
        };
        self.mutate(order_id, update, |order, now| {
            order.resolve_mediation(settled, now)
        })
        .await
    }

    /// Requester cancels a still-unmatched order.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order> {
        self.mutate(order_id, UpdateKind::Cancelled, |order, _| order.cancel())
            .await
    }

    /// Reconciliation sweep: expire open orders whose rate lock lapsed.
    /// Returns the number of orders expired. Idempotent.
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<usize> {
        let open = self.orders.open_orders(512).await?;
        let mut expired = 0;
        for order in open {
            if order.quote.is_valid(now) {
                continue;
            }
            match self.mutate(&order.id, UpdateKind::Expired, |o, _| o.expire()).await {
                Ok(_) => expired += 1,
                // A concurrent sweep or match got there first.
                Err(Error::Conflict { .. } | Error::Lifecycle(_)) => {}
                Err(error) => return Err(error),
            }
        }
        if expired > 0 {
            info!(expired, "expired stale orders");
        }
        Ok(expired)
    }

    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        self.orders.get(order_id).await
    }

    /// Load, mutate under the state machine, persist, broadcast.
    async fn mutate<F>(&self, order_id: &OrderId, update: UpdateKind, mut op: F) -> Result<Order>
    where
        F: FnMut(&mut Order, DateTime<Utc>) -> std::result::Result<(), LifecycleError>,
    {
        let mut order = self.orders.get(order_id).await?.ok_or_else(|| {
            Error::Lifecycle(LifecycleError::NotFound {
                order_id: order_id.to_string(),
            })
        })?;
        // An expired order is indistinguishable from an absent one to
        // callers; only the sweep itself may touch it.
        if order.status == OrderStatus::Expired && update != UpdateKind::Expired {
            return Err(Error::Lifecycle(LifecycleError::NotFound {
                order_id: order_id.to_string(),
            }));
        }
        op(&mut order, Utc::now()).map_err(Error::Lifecycle)?;
        self.orders.update(&mut order).await?;

        info!(order_id = %order.id, status = ?order.status, "order transition");
        self.hub.broadcast(&StreamMessage::OrderUpdate {
            update,
            order: Box::new(order.clone()),
        });
        Ok(order)
    }

    fn validate_request(request: &CreateOrderRequest) -> Result<()> {
        if request.requester_wallet.as_str().is_empty() {
            return Err(Error::Input(InputError::MissingField {
                field: "requester_wallet",
            }));
        }
        if request.requester_id.is_empty() {
            return Err(Error::Input(InputError::MissingField {
                field: "requester_id",
            }));
        }
        if request.payment_method.is_empty() {
            return Err(Error::Input(InputError::MissingField {
                field: "payment_method",
            }));
        }
        if request.token_amount.is_zero() {
            return Err(Error::Input(InputError::InvalidValue {
                field: "token_amount",
                reason: "must be positive".into(),
            }));
        }
        Ok(())
    }

    fn check_amount_bounds(&self, amount: TokenAmount) -> Result<()> {
        let min = TokenAmount::from_decimal(self.quote_config.min_order).unwrap_or(TokenAmount::ZERO);
        let max = TokenAmount::from_decimal(self.quote_config.max_order)
            .unwrap_or(TokenAmount::from_units(u64::MAX));
        if amount < min || amount > max {
            return Err(Error::Input(InputError::AmountOutOfBounds {
                amount: amount.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            }));
        }
        Ok(())
    }
}
