//! Order endpoints: creation, the matched-order transitions, and the
//! per-address risk profile lookup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DeviceSignals, Direction, Order, OrderId, RiskAssessment, SolverId, TokenAmount,
    UserHistory, WalletAddress,
};
use crate::error::InputError;
use crate::service::lifecycle::CreateOrderRequest;

use super::{ApiError, ApiResult, AppContext};

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub direction: Direction,
    pub requester_id: String,
    pub requester_wallet: String,
    pub token_amount: Decimal,
    pub payment_method: String,
    #[serde(default)]
    pub payment_instructions: Option<String>,
    #[serde(default)]
    pub signals: Option<DeviceSignals>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub risk: RiskAssessment,
}

pub async fn create_order(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateOrderBody>,
) -> ApiResult<(StatusCode, Json<CreateOrderResponse>)> {
    let token_amount = TokenAmount::from_decimal(body.token_amount).ok_or_else(|| {
        ApiError::from(InputError::InvalidValue {
            field: "token_amount",
            reason: format!("{} is not a representable amount", body.token_amount),
        })
    })?;
    let request = CreateOrderRequest {
        direction: body.direction,
        requester_id: body.requester_id,
        requester_wallet: WalletAddress::from(body.requester_wallet.as_str()),
        token_amount,
        payment_method: body.payment_method,
        payment_instructions: body.payment_instructions,
        signals: body.signals,
    };
    let (order, risk) = ctx.lifecycle.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(CreateOrderResponse { order, risk })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_orders(
    State(ctx): State<AppContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Order>>> {
    let limit = params.limit.unwrap_or(ctx.server.snapshot_limit);
    let orders = ctx.orders.list_recent(limit).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order_id = OrderId::from(id.as_str());
    let order = ctx.lifecycle.get_order(&order_id).await?.ok_or_else(|| {
        ApiError::from(crate::error::Error::Lifecycle(
            crate::error::LifecycleError::NotFound { order_id: id },
        ))
    })?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct MatchBody {
    pub solver_id: String,
    pub solver_wallet: String,
}

pub async fn match_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<MatchBody>,
) -> ApiResult<Json<Order>> {
    if body.solver_id.trim().is_empty() {
        return Err(InputError::MissingField { field: "solver_id" }.into());
    }
    let order = ctx
        .lifecycle
        .match_order(
            &OrderId::from(id.as_str()),
            SolverId::from(body.solver_id.as_str()),
            WalletAddress::from(body.solver_wallet.as_str()),
        )
        .await?;
    Ok(Json(order))
}

pub async fn begin_payment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = ctx.lifecycle.begin_payment(&OrderId::from(id.as_str())).await?;
    Ok(Json(order))
}

pub async fn payment_sent(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = ctx
        .lifecycle
        .record_payment_sent(&OrderId::from(id.as_str()))
        .await?;
    Ok(Json(order))
}

pub async fn mark_verifying(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = ctx
        .lifecycle
        .mark_verifying(&OrderId::from(id.as_str()))
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct ProofBody {
    pub proof_reference: String,
}

#[derive(Debug, Serialize)]
pub struct ProofResponse {
    pub order: Order,
    pub task_id: String,
}

/// Proof submission moves the order to verifying and opens the
/// validation task in one step.
pub async fn submit_proof(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<ProofBody>,
) -> ApiResult<Json<ProofResponse>> {
    if body.proof_reference.trim().is_empty() {
        return Err(InputError::MissingField { field: "proof_reference" }.into());
    }
    let order = ctx
        .lifecycle
        .submit_proof(&OrderId::from(id.as_str()), &body.proof_reference)
        .await?;
    let task = ctx.quorum.open_task(&order).await?;
    Ok(Json(ProofResponse {
        order,
        task_id: task.id.to_string(),
    }))
}

pub async fn cancel_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = ctx.lifecycle.cancel_order(&OrderId::from(id.as_str())).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct MediationBody {
    pub settled: bool,
}

pub async fn resolve_mediation(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<MediationBody>,
) -> ApiResult<Json<Order>> {
    let order = ctx
        .lifecycle
        .resolve_mediation(&OrderId::from(id.as_str()), body.settled)
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Serialize)]
pub struct RiskProfileResponse {
    pub history: UserHistory,
    pub assessment: RiskAssessment,
}

/// Current standing for a wallet: the stored counters plus an
/// assessment with no order amount, so deviation penalties stay out.
pub async fn risk_profile(
    State(ctx): State<AppContext>,
    Path(address): Path<String>,
) -> ApiResult<Json<RiskProfileResponse>> {
    let wallet = WalletAddress::from(address.as_str());
    let history = ctx.history.get_or_default(&wallet).await?;
    let assessment = ctx.risk.assess(TokenAmount::ZERO, &history, None, Utc::now());
    Ok(Json(RiskProfileResponse { history, assessment }))
}
