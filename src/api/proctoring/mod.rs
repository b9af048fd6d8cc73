mod handlers;

use axum::{routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/attempts/:attempt_id/events", post(handlers::record_event))
        .route("/attempts/:attempt_id/decision", post(handlers::decide))
}

#[cfg(test)]
mod tests;
