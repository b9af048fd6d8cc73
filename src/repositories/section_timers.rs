use time::PrimitiveDateTime;

use crate::db::models::AttemptSectionTimer;

const COLUMNS: &str = "attempt_id, section_id, entered_at, expires_at";

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptSectionTimer>, sqlx::Error> {
    sqlx::query_as::<_, AttemptSectionTimer>(&format!(
        "SELECT {COLUMNS} FROM attempt_section_timers WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
) -> Result<Option<AttemptSectionTimer>, sqlx::Error> {
    sqlx::query_as::<_, AttemptSectionTimer>(&format!(
        "SELECT {COLUMNS} FROM attempt_section_timers WHERE attempt_id = $1 AND section_id = $2"
    ))
    .bind(attempt_id)
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

/// Starts the section clock once; later entries keep the first timer.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
    entered_at: PrimitiveDateTime,
    expires_at: PrimitiveDateTime,
) -> Result<AttemptSectionTimer, sqlx::Error> {
    sqlx::query_as::<_, AttemptSectionTimer>(&format!(
        "WITH inserted AS (
            INSERT INTO attempt_section_timers (attempt_id, section_id, entered_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (attempt_id, section_id) DO NOTHING
            RETURNING {COLUMNS}
        )
        SELECT {COLUMNS} FROM inserted
        UNION ALL
        SELECT {COLUMNS} FROM attempt_section_timers WHERE attempt_id = $1 AND section_id = $2
        LIMIT 1"
    ))
    .bind(attempt_id)
    .bind(section_id)
    .bind(entered_at)
    .bind(expires_at)
    .fetch_one(executor)
    .await
}
