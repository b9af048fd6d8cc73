use time::PrimitiveDateTime;

use crate::db::models::AttemptQuestionScore;
use crate::db::types::ScoreOutcome;

pub(crate) const COLUMNS: &str = "\
    attempt_id, question_id, outcome, score_earned, is_correct, max_points, graded_by, graded_at";

pub(crate) struct CreateScore<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) outcome: ScoreOutcome,
    pub(crate) score_earned: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) max_points: f64,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
}

/// First scoring wins; a replay of the automatic pass leaves existing rows alone.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    score: CreateScore<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_question_scores (
            attempt_id, question_id, outcome, score_earned, is_correct, max_points, graded_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        ON CONFLICT (attempt_id, question_id) DO NOTHING",
    )
    .bind(score.attempt_id)
    .bind(score.question_id)
    .bind(score.outcome)
    .bind(score.score_earned)
    .bind(score.is_correct)
    .bind(score.max_points)
    .bind(score.graded_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptQuestionScore>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestionScore>(&format!(
        "SELECT {COLUMNS}
         FROM attempt_question_scores
         WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn apply_manual_grade(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    score_earned: f64,
    graded_by: &str,
    graded_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempt_question_scores
         SET outcome = $1, score_earned = $2, is_correct = NULL, graded_by = $3, graded_at = $4
         WHERE attempt_id = $5 AND question_id = $6",
    )
    .bind(ScoreOutcome::ManuallyGraded)
    .bind(score_earned)
    .bind(graded_by)
    .bind(graded_at)
    .bind(attempt_id)
    .bind(question_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
