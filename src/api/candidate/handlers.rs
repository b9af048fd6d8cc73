use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_role, CurrentUser};
use crate::api::helpers::{begin, now_primitive, settle};
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::schemas::attempt::{
    AttemptSessionResponse, AttemptTimeResponse, PauseResumeRequest, ResultSummaryResponse,
    SaveAnswersRequest, SaveAnswersResponse, SectionTimerResponse, StartAttemptRequest,
};
use crate::schemas::ApiResponse;
use crate::services::eligibility::Eligibility;
use crate::services::{answer_ledger, attempt_control, eligibility, materializer};

const CANDIDATE: &[UserRole] = &[UserRole::Candidate];

pub(super) async fn get_eligibility(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Eligibility>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut conn =
        state.db().acquire().await.map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let verdict = eligibility::evaluate(&mut conn, &user.id, &exam_id, now_primitive()).await?;

    Ok(Json(ApiResponse::ok(verdict)))
}

pub(super) async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<StartAttemptRequest>>,
) -> Result<Json<ApiResponse<AttemptSessionResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = materializer::start_or_resume(
        &mut tx,
        &user,
        &exam_id,
        payload.access_code.as_deref(),
        now_primitive(),
    )
    .await;
    let (session, resumed) = settle(tx, outcome).await?;

    let message = if resumed { "Attempt resumed" } else { "Attempt started" };
    Ok(Json(ApiResponse::with_message(session, message)))
}

pub(super) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AttemptSessionResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::session_view(&mut tx, &user, &attempt_id, now_primitive()).await;
    let session = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(session)))
}

pub(super) async fn enter_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AttemptSessionResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::enter(&mut tx, &user, &attempt_id, now_primitive()).await;
    let session = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(session)))
}

pub(super) async fn enter_section(
    Path((attempt_id, section_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SectionTimerResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut tx = begin(&state).await?;
    let outcome =
        attempt_control::enter_section(&mut tx, &user, &attempt_id, &section_id, now_primitive())
            .await;
    let timer = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(timer)))
}

pub(super) async fn save_answers(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswersRequest>,
) -> Result<Json<ApiResponse<SaveAnswersResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let exam_settings = state.settings().exam();
    let rate_key = format!("answers:{attempt_id}");
    let allowed = match state
        .redis()
        .rate_limit(&rate_key, exam_settings.answer_save_limit, exam_settings.answer_save_window_seconds)
        .await
    {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "Failed to check answer save rate limit");
            true
        }
    };
    if !allowed {
        return Err(ApiError::TooManyRequests("Answer save rate limit exceeded"));
    }

    let items = payload.into_items();
    let mut tx = begin(&state).await?;
    let outcome = answer_ledger::save_answers(
        &mut tx,
        &user,
        &attempt_id,
        &items,
        exam_settings.max_bulk_answers,
        now_primitive(),
    )
    .await;
    let saved = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(saved)))
}

pub(super) async fn pause_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<PauseResumeRequest>>,
) -> Result<Json<ApiResponse<AttemptTimeResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::pause(
        &mut tx,
        &user,
        &attempt_id,
        payload.reason.as_deref(),
        now_primitive(),
    )
    .await;
    let paused = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(paused, "Attempt paused")))
}

pub(super) async fn resume_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<PauseResumeRequest>>,
) -> Result<Json<ApiResponse<AttemptTimeResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    payload.validate()?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::resume(
        &mut tx,
        &user,
        &attempt_id,
        payload.reason.as_deref(),
        now_primitive(),
    )
    .await;
    let resumed = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(resumed, "Attempt resumed")))
}

pub(super) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultSummaryResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut tx = begin(&state).await?;
    let outcome = attempt_control::submit(&mut tx, &user, &attempt_id, now_primitive()).await;
    let summary = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::with_message(summary, "Attempt submitted")))
}

pub(super) async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ResultSummaryResponse>>, ApiError> {
    require_role(&user, CANDIDATE)?;

    let mut tx = begin(&state).await?;
    let outcome =
        attempt_control::result_summary(&mut tx, &user, &attempt_id, now_primitive()).await;
    let summary = settle(tx, outcome).await?;

    Ok(Json(ApiResponse::ok(summary)))
}
