use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::{AttemptStatus, RecordState};

pub(crate) const COLUMNS: &str = "\
    id, exam_id, candidate_id, attempt_number, status, started_at, expires_at, \
    extra_time_seconds, resume_count, paused_at, last_activity_at, submitted_at, \
    force_submitted_by, force_submitted_at, shuffle_seed, record_state, version, \
    created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) candidate_id: &'a str,
    pub(crate) attempt_number: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) shuffle_seed: i64,
}

pub(crate) struct FinishAttempt<'a> {
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) force_submitted_by: Option<&'a str>,
    pub(crate) force_submitted_at: Option<PrimitiveDateTime>,
}

/// Serializes concurrent starts for one candidate on one exam until the transaction ends.
pub(crate) async fn acquire_exam_candidate_lock(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("attempt-start:{exam_id}:{candidate_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_live(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE id = $1 AND record_state = $2"
    ))
    .bind(id)
    .bind(RecordState::Live)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_live_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE id = $1 AND record_state = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(RecordState::Live)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_active_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE exam_id = $1 AND candidate_id = $2 AND record_state = $3
           AND status = ANY($4)
         FOR UPDATE"
    ))
    .bind(exam_id)
    .bind(candidate_id)
    .bind(RecordState::Live)
    .bind(AttemptStatus::ACTIVE.to_vec())
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE exam_id = $1 AND candidate_id = $2 AND record_state = $3
           AND status = ANY($4)"
    ))
    .bind(exam_id)
    .bind(candidate_id)
    .bind(RecordState::Live)
    .bind(AttemptStatus::ACTIVE.to_vec())
    .fetch_optional(executor)
    .await
}

/// Highest attempt number ever issued, live or not.
pub(crate) async fn max_attempt_number(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(MAX(attempt_number), 0) FROM attempts
         WHERE exam_id = $1 AND candidate_id = $2",
    )
    .bind(exam_id)
    .bind(candidate_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn count_live(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts
         WHERE exam_id = $1 AND candidate_id = $2 AND record_state = $3",
    )
    .bind(exam_id)
    .bind(candidate_id)
    .bind(RecordState::Live)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, exam_id, candidate_id, attempt_number, status, started_at, expires_at,
            last_activity_at, shuffle_seed, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$6,$8,$6,$6)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.exam_id)
    .bind(attempt.candidate_id)
    .bind(attempt.attempt_number)
    .bind(AttemptStatus::Started)
    .bind(attempt.started_at)
    .bind(attempt.expires_at)
    .bind(attempt.shuffle_seed)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves the attempt between two statuses. Returns false when the stored status no
/// longer matches `from`.
pub(crate) async fn transition(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    from: AttemptStatus,
    to: AttemptStatus,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1, last_activity_at = $2, updated_at = $2, version = version + 1
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn pause(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1, paused_at = $2, updated_at = $2, version = version + 1
         WHERE id = $3 AND status = $4",
    )
    .bind(AttemptStatus::Paused)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn resume(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1, paused_at = NULL, resume_count = resume_count + 1,
             last_activity_at = $2, updated_at = $2, version = version + 1
         WHERE id = $3 AND status = $4",
    )
    .bind(AttemptStatus::InProgress)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::Paused)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn add_time(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    new_expires_at: PrimitiveDateTime,
    extra_seconds: i64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET expires_at = $1, extra_time_seconds = extra_time_seconds + $2,
             updated_at = $3, version = version + 1
         WHERE id = $4 AND status = ANY($5)",
    )
    .bind(new_expires_at)
    .bind(extra_seconds)
    .bind(now)
    .bind(id)
    .bind(vec![AttemptStatus::Started, AttemptStatus::InProgress])
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn touch_activity(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempts SET last_activity_at = $1, updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Moves an active attempt into a finished status. Returns false if it already left the
/// active set.
pub(crate) async fn finish(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    finish: FinishAttempt<'_>,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1, submitted_at = $2, force_submitted_by = $3, force_submitted_at = $4,
             paused_at = NULL, updated_at = $5, version = version + 1
         WHERE id = $6 AND status = ANY($7)",
    )
    .bind(finish.status)
    .bind(finish.submitted_at)
    .bind(finish.force_submitted_by)
    .bind(finish.force_submitted_at)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::ACTIVE.to_vec())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
