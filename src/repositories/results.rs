use time::PrimitiveDateTime;

use crate::db::models::AttemptResult;
use crate::db::types::RecordState;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, exam_id, candidate_id, total_score, max_possible_score, percentage, \
    is_passed, pending_manual_count, is_published, published_at, graded_at, regrade_count, \
    created_at, updated_at";

pub(crate) struct ScoreTotals {
    pub(crate) total_score: f64,
    pub(crate) max_possible_score: f64,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
    pub(crate) pending_manual_count: i32,
}

pub(crate) struct CreateResult<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) candidate_id: &'a str,
    pub(crate) totals: &'a ScoreTotals,
    pub(crate) now: PrimitiveDateTime,
}

/// Returns false when the attempt already has a result.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    result: CreateResult<'_>,
) -> Result<bool, sqlx::Error> {
    let outcome = sqlx::query(
        "INSERT INTO results (
            id, attempt_id, exam_id, candidate_id, total_score, max_possible_score, percentage,
            is_passed, pending_manual_count, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)
        ON CONFLICT (attempt_id) DO NOTHING",
    )
    .bind(result.id)
    .bind(result.attempt_id)
    .bind(result.exam_id)
    .bind(result.candidate_id)
    .bind(result.totals.total_score)
    .bind(result.totals.max_possible_score)
    .bind(result.totals.percentage)
    .bind(result.totals.is_passed)
    .bind(result.totals.pending_manual_count)
    .bind(result.now)
    .execute(executor)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

pub(crate) async fn find_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<AttemptResult>, sqlx::Error> {
    sqlx::query_as::<_, AttemptResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_attempt_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Option<AttemptResult>, sqlx::Error> {
    sqlx::query_as::<_, AttemptResult>(&format!(
        "SELECT {COLUMNS} FROM results WHERE attempt_id = $1 FOR UPDATE"
    ))
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

/// Rewrites the totals of an existing result, keeping its id.
pub(crate) async fn update_totals(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    totals: &ScoreTotals,
    bump_regrade: bool,
    now: PrimitiveDateTime,
) -> Result<Option<AttemptResult>, sqlx::Error> {
    sqlx::query_as::<_, AttemptResult>(&format!(
        "UPDATE results
         SET total_score = $1, max_possible_score = $2, percentage = $3, is_passed = $4,
             pending_manual_count = $5,
             regrade_count = regrade_count + CASE WHEN $6 THEN 1 ELSE 0 END,
             updated_at = $7
         WHERE attempt_id = $8
         RETURNING {COLUMNS}"
    ))
    .bind(totals.total_score)
    .bind(totals.max_possible_score)
    .bind(totals.percentage)
    .bind(totals.is_passed)
    .bind(totals.pending_manual_count)
    .bind(bump_regrade)
    .bind(now)
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn mark_graded(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE results SET graded_at = COALESCE(graded_at, $1), updated_at = $1
         WHERE attempt_id = $2",
    )
    .bind(now)
    .bind(attempt_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn publish(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<AttemptResult>, sqlx::Error> {
    sqlx::query_as::<_, AttemptResult>(&format!(
        "UPDATE results
         SET is_published = TRUE, published_at = COALESCE(published_at, $1), updated_at = $1
         WHERE attempt_id = $2
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(attempt_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn has_published_pass(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    candidate_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM results r
            JOIN attempts a ON a.id = r.attempt_id
            WHERE r.exam_id = $1 AND r.candidate_id = $2
              AND r.is_published AND r.is_passed AND a.record_state = $3
        )",
    )
    .bind(exam_id)
    .bind(candidate_id)
    .bind(RecordState::Live)
    .fetch_one(executor)
    .await
}
