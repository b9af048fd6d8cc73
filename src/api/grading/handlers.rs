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
use crate::schemas::attempt::ResultResponse;
use crate::schemas::grading::{GradeAnswerRequest, GradedAnswerResponse, GradingSessionResponse};
use crate::schemas::ApiResponse;
use crate::services::grading_reconcile;

const GRADERS: &[UserRole] = &[UserRole::Grader, UserRole::Admin];

pub(super) async fn open_session(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<GradingSessionResponse>>), ApiError> {
    require_role(&user, GRADERS)?;

    let mut tx = begin(&state).await?;
    let outcome =
        grading_reconcile::open_session(&mut tx, &user, &attempt_id, now_primitive()).await;
    let session = settle(tx, outcome).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(session))))
}

pub(super) async fn grade_answer(
    Path((session_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<Json<ApiResponse<GradedAnswerResponse>>, ApiError> {
    require_role(&user, GRADERS)?;
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = grading_reconcile::record_grade(
        &mut tx,
        &user,
        &session_id,
        &question_id,
        payload.score_earned,
        payload.comment.as_deref(),
        now_primitive(),
    )
    .await;
    let graded = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(graded)))
}

pub(super) async fn finalize_session(
    Path(session_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultResponse>>, ApiError> {
    require_role(&user, GRADERS)?;

    let mut tx = begin(&state).await?;
    let outcome = grading_reconcile::finalize_from_grading_session(
        &mut tx,
        &user,
        &session_id,
        now_primitive(),
    )
    .await;
    let result = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(result, "Grading finalized")))
}

pub(super) async fn regrade_session(
    Path(session_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultResponse>>, ApiError> {
    require_role(&user, GRADERS)?;

    let mut tx = begin(&state).await?;
    let outcome =
        grading_reconcile::update_from_regrading(&mut tx, &user, &session_id, now_primitive())
            .await;
    let result = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(result, "Result regraded")))
}
