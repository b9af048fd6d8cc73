use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::{ProctorEvent, ProctorSession};
use crate::db::types::{ProctorSessionStatus, ProctorSeverity};

const SESSION_COLUMNS: &str = "id, attempt_id, status, opened_at, closed_at, close_reason";
const EVENT_COLUMNS: &str =
    "id, session_id, attempt_id, event_type, severity, risk_score, metadata, occurred_at";

pub(crate) struct NewProctorEvent<'a> {
    pub(crate) id: &'a str,
    pub(crate) session_id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) event_type: &'a str,
    pub(crate) severity: ProctorSeverity,
    pub(crate) risk_score: f64,
    pub(crate) metadata: serde_json::Value,
    pub(crate) occurred_at: PrimitiveDateTime,
}

pub(crate) async fn open_session(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO proctor_sessions (id, attempt_id, status, opened_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (attempt_id) WHERE status = 'active' DO NOTHING",
    )
    .bind(id)
    .bind(attempt_id)
    .bind(ProctorSessionStatus::Active)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<ProctorSession>, sqlx::Error> {
    sqlx::query_as::<_, ProctorSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM proctor_sessions WHERE attempt_id = $1 AND status = $2"
    ))
    .bind(attempt_id)
    .bind(ProctorSessionStatus::Active)
    .fetch_optional(executor)
    .await
}

/// Closes the active session for the attempt, if any. Returns whether one was closed.
pub(crate) async fn close_active(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE proctor_sessions
         SET status = $1, closed_at = $2, close_reason = $3
         WHERE attempt_id = $4 AND status = $5",
    )
    .bind(ProctorSessionStatus::Closed)
    .bind(now)
    .bind(reason)
    .bind(attempt_id)
    .bind(ProctorSessionStatus::Active)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn append_event(
    executor: impl sqlx::PgExecutor<'_>,
    event: NewProctorEvent<'_>,
) -> Result<ProctorEvent, sqlx::Error> {
    sqlx::query_as::<_, ProctorEvent>(&format!(
        "INSERT INTO proctor_events (
            id, session_id, attempt_id, event_type, severity, risk_score, metadata, occurred_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {EVENT_COLUMNS}"
    ))
    .bind(event.id)
    .bind(event.session_id)
    .bind(event.attempt_id)
    .bind(event.event_type)
    .bind(event.severity)
    .bind(event.risk_score)
    .bind(Json(event.metadata))
    .bind(event.occurred_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_events(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<ProctorEvent>, sqlx::Error> {
    sqlx::query_as::<_, ProctorEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM proctor_events WHERE attempt_id = $1
         ORDER BY occurred_at, id"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}
