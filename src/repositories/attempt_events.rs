use sqlx::types::Json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::AttemptEvent;
use crate::db::types::AttemptEventType;

pub(crate) struct NewEvent<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) event_type: AttemptEventType,
    pub(crate) actor_id: Option<&'a str>,
    pub(crate) reason: Option<&'a str>,
    pub(crate) metadata: serde_json::Value,
    pub(crate) occurred_at: PrimitiveDateTime,
}

pub(crate) async fn append(
    executor: impl sqlx::PgExecutor<'_>,
    event: NewEvent<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_events (
            id, attempt_id, event_type, actor_id, reason, metadata, occurred_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event.attempt_id)
    .bind(event.event_type)
    .bind(event.actor_id)
    .bind(event.reason)
    .bind(Json(event.metadata))
    .bind(event.occurred_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptEvent>, sqlx::Error> {
    sqlx::query_as::<_, AttemptEvent>(
        "SELECT id, attempt_id, event_type, actor_id, reason, metadata, occurred_at
         FROM attempt_events WHERE attempt_id = $1
         ORDER BY occurred_at, id",
    )
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

