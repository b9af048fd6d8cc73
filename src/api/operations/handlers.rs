use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentAdmin, CurrentUser};
use crate::api::helpers::{begin, now_primitive, settle};
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::schemas::attempt::{AttemptTimeResponse, ResultResponse};
use crate::schemas::operations::{
    AddTimeRequest, AddTimeResponse, AdminAttemptRequest, AllowNewAttemptRequest,
    AttemptEventResponse, AttemptStatusResponse, OverrideResponse, TerminateRequest,
    TerminateResponse,
};
use crate::schemas::ApiResponse;
use crate::services::attempt_control;

const STAFF: &[UserRole] = &[UserRole::Admin, UserRole::Proctor, UserRole::Grader];

pub(super) async fn add_time(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AddTimeRequest>,
) -> Result<Json<ApiResponse<AddTimeResponse>>, ApiError> {
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::add_time(
        &mut tx,
        &admin,
        &payload.attempt_id,
        payload.extra_minutes,
        payload.reason.trim(),
        now_primitive(),
    )
    .await;
    let extended = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(extended, "Time added")))
}

pub(super) async fn terminate(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<TerminateRequest>,
) -> Result<Json<ApiResponse<TerminateResponse>>, ApiError> {
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::terminate(
        &mut tx,
        &admin,
        &payload.attempt_id,
        &payload.reason,
        false,
        now_primitive(),
    )
    .await;
    let terminated = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(terminated, "Attempt terminated")))
}

pub(super) async fn pause(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminAttemptRequest>,
) -> Result<Json<ApiResponse<AttemptTimeResponse>>, ApiError> {
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::pause(
        &mut tx,
        &admin,
        &payload.attempt_id,
        payload.reason.as_deref(),
        now_primitive(),
    )
    .await;
    let paused = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(paused, "Attempt paused")))
}

pub(super) async fn resume(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminAttemptRequest>,
) -> Result<Json<ApiResponse<AttemptTimeResponse>>, ApiError> {
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::resume(
        &mut tx,
        &admin,
        &payload.attempt_id,
        payload.reason.as_deref(),
        now_primitive(),
    )
    .await;
    let resumed = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(resumed, "Attempt resumed")))
}

pub(super) async fn allow_new_attempt(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AllowNewAttemptRequest>,
) -> Result<Json<ApiResponse<OverrideResponse>>, ApiError> {
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::grant_new_attempt(
        &mut tx,
        &admin,
        payload.candidate_id.trim(),
        payload.exam_id.trim(),
        payload.reason.trim(),
        now_primitive(),
    )
    .await;
    let granted = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(granted, "New attempt allowed")))
}

pub(super) async fn get_attempt_status(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AttemptStatusResponse>>, ApiError> {
    require_role(&user, STAFF)?;

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let status = attempt_control::attempt_status(&mut conn, &attempt_id, now_primitive()).await?;

    Ok(Json(ApiResponse::ok(status)))
}

pub(super) async fn list_attempt_events(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AttemptEventResponse>>>, ApiError> {
    require_role(&user, STAFF)?;

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let events = attempt_control::list_events(&mut conn, &attempt_id).await?;

    Ok(Json(ApiResponse::ok(events)))
}

pub(super) async fn publish_result(
    Path(attempt_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultResponse>>, ApiError> {
    let mut tx = begin(&state).await?;
    let outcome =
        attempt_control::publish_result(&mut tx, &admin, &attempt_id, now_primitive()).await;
    let published = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(published, "Result published")))
}
