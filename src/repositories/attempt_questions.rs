use sqlx::types::Json;

use crate::db::models::{AnswerKey, AttemptQuestion, OptionSnapshot};
use crate::db::types::QuestionType;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, section_id, topic_id, position, question_type, points, \
    is_required, body, options, option_order, answer_key";

pub(crate) struct CreateAttemptQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) section_id: &'a str,
    pub(crate) topic_id: Option<&'a str>,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    pub(crate) is_required: bool,
    pub(crate) body: &'a str,
    pub(crate) options: &'a [OptionSnapshot],
    pub(crate) option_order: &'a [String],
    pub(crate) answer_key: &'a AnswerKey,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    question: CreateAttemptQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_questions (
            id, attempt_id, question_id, section_id, topic_id, position, question_type,
            points, is_required, body, options, option_order, answer_key
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
    )
    .bind(question.id)
    .bind(question.attempt_id)
    .bind(question.question_id)
    .bind(question.section_id)
    .bind(question.topic_id)
    .bind(question.position)
    .bind(question.question_type)
    .bind(question.points)
    .bind(question.is_required)
    .bind(question.body)
    .bind(Json(question.options))
    .bind(Json(question.option_order))
    .bind(Json(question.answer_key))
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<AttemptQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {COLUMNS} FROM attempt_questions WHERE attempt_id = $1 ORDER BY position"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
) -> Result<Option<AttemptQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {COLUMNS} FROM attempt_questions WHERE attempt_id = $1 AND question_id = $2"
    ))
    .bind(attempt_id)
    .bind(question_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn section_has_questions(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    section_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(
            SELECT 1 FROM attempt_questions WHERE attempt_id = $1 AND section_id = $2
        )",
    )
    .bind(attempt_id)
    .bind(section_id)
    .fetch_one(executor)
    .await
}
