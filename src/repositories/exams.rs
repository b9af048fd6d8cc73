use crate::db::models::{Exam, ExamAccessPolicy, ExamQuestionSource, ExamSection, ExamTopic};
use crate::db::types::RecordState;

pub(crate) const COLUMNS: &str = "\
    id, title, kind, status, is_active, record_state, start_time, end_time, duration_minutes, \
    max_attempts, shuffle_questions, shuffle_options, pass_score, show_results_immediately, \
    allow_review, allow_retake_after_pass, proctoring_enabled, created_at, updated_at";

pub(crate) async fn find_live(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND record_state = $2"
    ))
    .bind(id)
    .bind(RecordState::Live)
    .fetch_optional(executor)
    .await
}

/// Attempts keep pointing at their exam even after it is archived.
pub(crate) async fn fetch_any(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn find_access_policy(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Option<ExamAccessPolicy>, sqlx::Error> {
    sqlx::query_as::<_, ExamAccessPolicy>(
        "SELECT exam_id, requires_access_code, access_code_hash
         FROM exam_access_policies WHERE exam_id = $1",
    )
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_sections(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamSection>, sqlx::Error> {
    sqlx::query_as::<_, ExamSection>(
        "SELECT id, exam_id, title, order_index, duration_minutes
         FROM exam_sections WHERE exam_id = $1
         ORDER BY order_index, id",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_section(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    section_id: &str,
) -> Result<Option<ExamSection>, sqlx::Error> {
    sqlx::query_as::<_, ExamSection>(
        "SELECT id, exam_id, title, order_index, duration_minutes
         FROM exam_sections WHERE exam_id = $1 AND id = $2",
    )
    .bind(exam_id)
    .bind(section_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_topics(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamTopic>, sqlx::Error> {
    sqlx::query_as::<_, ExamTopic>(
        "SELECT id, exam_id, section_id, title, order_index
         FROM exam_topics WHERE exam_id = $1
         ORDER BY order_index, id",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_question_sources(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamQuestionSource>, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestionSource>(
        "SELECT eq.question_id, eq.section_id, eq.topic_id, eq.order_index, eq.points_override,
                eq.is_required, q.question_type, q.body, q.points, q.options, q.answer_key
         FROM exam_questions eq
         JOIN questions q ON q.id = eq.question_id
         WHERE eq.exam_id = $1 AND q.record_state = $2
         ORDER BY eq.order_index, eq.question_id",
    )
    .bind(exam_id)
    .bind(RecordState::Live)
    .fetch_all(executor)
    .await
}
