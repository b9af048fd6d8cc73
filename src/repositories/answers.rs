use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::AttemptAnswer;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, selected_option_ids, text_answer, answered_at, created_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) selected_option_ids: &'a [String],
    pub(crate) text_answer: Option<&'a str>,
    pub(crate) answered_at: PrimitiveDateTime,
}

/// Last write wins; `created_at` and the row id survive overwrites.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    answer: UpsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_answers (
            id, attempt_id, question_id, selected_option_ids, text_answer, answered_at, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6)
        ON CONFLICT (attempt_id, question_id) DO UPDATE
        SET selected_option_ids = EXCLUDED.selected_option_ids,
            text_answer = EXCLUDED.text_answer,
            answered_at = EXCLUDED.answered_at",
    )
    .bind(answer.id)
    .bind(answer.attempt_id)
    .bind(answer.question_id)
    .bind(Json(answer.selected_option_ids))
    .bind(answer.text_answer)
    .bind(answer.answered_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptAnswer>, sqlx::Error> {
    sqlx::query_as::<_, AttemptAnswer>(&format!(
        "SELECT {COLUMNS} FROM attempt_answers WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}
