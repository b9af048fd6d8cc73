use time::PrimitiveDateTime;

use crate::db::models::AdminAttemptOverride;

const COLUMNS: &str = "\
    id, exam_id, candidate_id, granted_by, reason, is_used, used_at, used_by_attempt_id, \
    created_at";

pub(crate) struct CreateOverride<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) candidate_id: &'a str,
    pub(crate) granted_by: &'a str,
    pub(crate) reason: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Returns false when an unused override already exists for the pair.
pub(crate) async fn create_if_none_unused(
    executor: impl sqlx::PgExecutor<'_>,
    grant: CreateOverride<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO admin_attempt_overrides (
            id, exam_id, candidate_id, granted_by, reason, is_used, created_at
        ) VALUES ($1,$2,$3,$4,$5,FALSE,$6)
        ON CONFLICT (exam_id, candidate_id) WHERE NOT is_used DO NOTHING",
    )
    .bind(grant.id)
    .bind(grant.exam_id)
    .bind(grant.candidate_id)
    .bind(grant.granted_by)
    .bind(grant.reason)
    .bind(grant.created_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_unused(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<Option<AdminAttemptOverride>, sqlx::Error> {
    sqlx::query_as::<_, AdminAttemptOverride>(&format!(
        "SELECT {COLUMNS} FROM admin_attempt_overrides
         WHERE exam_id = $1 AND candidate_id = $2 AND NOT is_used"
    ))
    .bind(exam_id)
    .bind(candidate_id)
    .fetch_optional(executor)
    .await
}

/// Marks the override consumed. Returns false if someone consumed it first.
pub(crate) async fn consume(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE admin_attempt_overrides
         SET is_used = TRUE, used_at = $1, used_by_attempt_id = $2
         WHERE id = $3 AND NOT is_used",
    )
    .bind(now)
    .bind(attempt_id)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
