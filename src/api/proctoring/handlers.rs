use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentUser};
use crate::api::helpers::{begin, now_primitive, settle};
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::schemas::proctoring::{
    ProctorDecisionRequest, ProctorDecisionResponse, ProctorEventRequest, ProctorEventResponse,
};
use crate::schemas::ApiResponse;
use crate::services::proctoring;

const PROCTORS: &[UserRole] = &[UserRole::Proctor, UserRole::Admin];

pub(super) async fn record_event(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProctorEventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProctorEventResponse>>), ApiError> {
    require_role(&user, PROCTORS)?;
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome =
        proctoring::record_event(&mut tx, &user, &attempt_id, payload, now_primitive()).await;
    let event = settle(tx, outcome).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(event))))
}

pub(super) async fn decide(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ProctorDecisionRequest>,
) -> Result<Json<ApiResponse<ProctorDecisionResponse>>, ApiError> {
    require_role(&user, PROCTORS)?;
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = proctoring::decide(
        &mut tx,
        &user,
        &attempt_id,
        payload.action,
        payload.reason.trim(),
        now_primitive(),
    )
    .await;
    let decision = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(decision)))
}
