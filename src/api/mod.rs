//! HTTP surface: order endpoints, validation endpoints, and the
//! server-sent-event push stream solvers subscribe to.

mod orders;
mod stream;
mod validators;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::error::{Error, InputError, LifecycleError, QuorumError};
use crate::notify::NotificationHub;
use crate::repository::{HistoryRepository, OrderRepository};
use crate::service::lifecycle::OrderLifecycle;
use crate::service::quorum::ValidationQuorum;
use crate::service::risk::FraudRiskEngine;

/// Shared handler state. Every component arrives pre-built; handlers
/// never construct services or reach for globals.
#[derive(Clone)]
pub struct AppContext {
    pub lifecycle: Arc<OrderLifecycle>,
    pub quorum: Arc<ValidationQuorum>,
    pub risk: Arc<FraudRiskEngine>,
    pub orders: Arc<OrderRepository>,
    pub history: Arc<HistoryRepository>,
    pub hub: Arc<NotificationHub>,
    pub server: ServerConfig,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/match", post(orders::match_order))
        .route("/orders/:id/payment", post(orders::begin_payment))
        .route("/orders/:id/payment-sent", post(orders::payment_sent))
        .route("/orders/:id/verify", post(orders::mark_verifying))
        .route("/orders/:id/proof", post(orders::submit_proof))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/orders/:id/mediation", post(orders::resolve_mediation))
        .route("/risk/:address", get(orders::risk_profile))
        .route("/validators", post(validators::register_validator))
        .route("/validation/:id/votes", post(validators::cast_vote))
        .route("/validation/:id/arbitration", post(validators::apply_arbitration))
        .route("/stream", get(stream::order_stream))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Maps domain errors onto HTTP statuses at the boundary. Handlers
/// return `ApiError` via `?`; the conversion below keeps the mapping in
/// one place.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            Error::Input(err) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": err.to_string() }),
            ),
            Error::Lifecycle(LifecycleError::NotFound { .. }) => (
                StatusCode::NOT_FOUND,
                json!({ "error": self.0.to_string() }),
            ),
            Error::Lifecycle(LifecycleError::RiskBlocked { score, required_actions }) => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": self.0.to_string(),
                    "risk_score": score,
                    "required_actions": required_actions,
                }),
            ),
            Error::Lifecycle(LifecycleError::InvalidTransition { .. })
            | Error::Conflict { .. } => (
                StatusCode::CONFLICT,
                json!({ "error": self.0.to_string() }),
            ),
            Error::Quorum(err) => {
                let status = match err {
                    QuorumError::TaskNotFound { .. } => StatusCode::NOT_FOUND,
                    QuorumError::NotEligible { .. }
                    | QuorumError::InsufficientStake { .. } => StatusCode::FORBIDDEN,
                    QuorumError::AlreadyOpen { .. }
                    | QuorumError::DuplicateVote { .. }
                    | QuorumError::TaskClosed { .. } => StatusCode::CONFLICT,
                };
                (status, json!({ "error": err.to_string() }))
            }
            _ => {
                tracing::error!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        Self(Error::Input(err))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
