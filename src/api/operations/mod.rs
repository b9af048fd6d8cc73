mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/add-time", post(handlers::add_time))
        .route("/terminate", post(handlers::terminate))
        .route("/pause", post(handlers::pause))
        .route("/resume", post(handlers::resume))
        .route("/allow-new-attempt", post(handlers::allow_new_attempt))
        .route("/attempts/:attempt_id", get(handlers::get_attempt_status))
        .route("/attempts/:attempt_id/events", get(handlers::list_attempt_events))
        .route("/results/:attempt_id/publish", post(handlers::publish_result))
}

#[cfg(test)]
mod tests;
