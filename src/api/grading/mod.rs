mod handlers;

use axum::{routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/attempts/:attempt_id/sessions", post(handlers::open_session))
        .route("/sessions/:session_id/answers/:question_id", put(handlers::grade_answer))
        .route("/sessions/:session_id/finalize", post(handlers::finalize_session))
        .route("/sessions/:session_id/regrade", post(handlers::regrade_session))
}
