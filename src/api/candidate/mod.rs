mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams/:exam_id/eligibility", get(handlers::get_eligibility))
        .route("/exams/:exam_id/start", post(handlers::start_attempt))
        .route("/attempts/:attempt_id", get(handlers::get_attempt))
        .route("/attempts/:attempt_id/enter", post(handlers::enter_attempt))
        .route("/attempts/:attempt_id/sections/:section_id/enter", post(handlers::enter_section))
        .route("/attempts/:attempt_id/answers", post(handlers::save_answers))
        .route("/attempts/:attempt_id/pause", post(handlers::pause_attempt))
        .route("/attempts/:attempt_id/resume", post(handlers::resume_attempt))
        .route("/attempts/:attempt_id/submit", post(handlers::submit_attempt))
        .route("/attempts/:attempt_id/result", get(handlers::get_result))
}
