//! Validator registration, vote submission, and the arbitration hook for
//! escalated tasks.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{TaskId, TokenAmount, ValidationTask, ValidatorProfile, VoteDecision, WalletAddress};
use crate::error::InputError;

use super::{ApiError, ApiResult, AppContext};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub address: String,
    pub staked: Decimal,
}

pub async fn register_validator(
    State(ctx): State<AppContext>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<ValidatorProfile>)> {
    let staked = TokenAmount::from_decimal(body.staked).ok_or_else(|| {
        ApiError::from(InputError::InvalidValue {
            field: "staked",
            reason: format!("{} is not a representable amount", body.staked),
        })
    })?;
    let profile = ctx
        .quorum
        .register_validator(WalletAddress::from(body.address.as_str()), staked)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub validator: String,
    pub decision: VoteDecision,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn cast_vote(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> ApiResult<Json<ValidationTask>> {
    let task = ctx
        .quorum
        .cast_vote(
            &TaskId::from(id.as_str()),
            &WalletAddress::from(body.validator.as_str()),
            body.decision,
            body.notes,
        )
        .await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ArbitrationBody {
    pub ruling: VoteDecision,
    pub arbitrator: String,
}

pub async fn apply_arbitration(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<ArbitrationBody>,
) -> ApiResult<Json<ValidationTask>> {
    if body.arbitrator.trim().is_empty() {
        return Err(InputError::MissingField { field: "arbitrator" }.into());
    }
    let task = ctx
        .quorum
        .apply_arbitration(&TaskId::from(id.as_str()), body.ruling, &body.arbitrator)
        .await?;
    Ok(Json(task))
}
