use time::PrimitiveDateTime;

use crate::db::models::{GradedAnswer, GradingSession};
use crate::db::types::GradingSessionStatus;

const SESSION_COLUMNS: &str =
    "id, attempt_id, grader_id, status, created_at, completed_at, updated_at";

pub(crate) async fn find_session_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<GradingSession>, sqlx::Error> {
    sqlx::query_as::<_, GradingSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM grading_sessions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Opens a session unless one is already open for the attempt; returns the open one.
pub(crate) async fn open_session(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempt_id: &str,
    grader_id: &str,
    now: PrimitiveDateTime,
) -> Result<GradingSession, sqlx::Error> {
    sqlx::query_as::<_, GradingSession>(&format!(
        "WITH inserted AS (
            INSERT INTO grading_sessions (id, attempt_id, grader_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (attempt_id) WHERE status = 'open' DO NOTHING
            RETURNING {SESSION_COLUMNS}
        )
        SELECT {SESSION_COLUMNS} FROM inserted
        UNION ALL
        SELECT {SESSION_COLUMNS} FROM grading_sessions WHERE attempt_id = $2 AND status = $4
        LIMIT 1"
    ))
    .bind(id)
    .bind(attempt_id)
    .bind(grader_id)
    .bind(GradingSessionStatus::Open)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn complete_session(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE grading_sessions
         SET status = $1, completed_at = COALESCE(completed_at, $2), updated_at = $2
         WHERE id = $3",
    )
    .bind(GradingSessionStatus::Completed)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn upsert_graded_answer(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
    question_id: &str,
    score_earned: f64,
    comment: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<GradedAnswer, sqlx::Error> {
    sqlx::query_as::<_, GradedAnswer>(
        "INSERT INTO graded_answers (session_id, question_id, score_earned, comment, graded_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (session_id, question_id) DO UPDATE
         SET score_earned = EXCLUDED.score_earned,
             comment = EXCLUDED.comment,
             graded_at = EXCLUDED.graded_at
         RETURNING session_id, question_id, score_earned, comment, graded_at",
    )
    .bind(session_id)
    .bind(question_id)
    .bind(score_earned)
    .bind(comment)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_graded_answers(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
) -> Result<Vec<GradedAnswer>, sqlx::Error> {
    sqlx::query_as::<_, GradedAnswer>(
        "SELECT session_id, question_id, score_earned, comment, graded_at
         FROM graded_answers WHERE session_id = $1
         ORDER BY question_id",
    )
    .bind(session_id)
    .fetch_all(executor)
    .await
}
