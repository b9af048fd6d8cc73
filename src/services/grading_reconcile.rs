//! Folds manual grades back into question scores and the attempt result.

use sqlx::PgConnection;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Attempt, GradingSession};
use crate::db::types::{AttemptEventType, AttemptStatus, GradingSessionStatus};
use crate::repositories;
use crate::schemas::attempt::ResultResponse;
use crate::schemas::grading::{GradedAnswerResponse, GradingSessionResponse};
use crate::services::{attempt_control, scoring, Actor, AttemptError};

pub(crate) fn validate_grade(score_earned: f64, points: f64) -> Result<(), AttemptError> {
    if !score_earned.is_finite() || score_earned < 0.0 || score_earned > points {
        return Err(AttemptError::InvalidGrade(format!(
            "score must be between 0 and {points}"
        )));
    }
    Ok(())
}

fn ensure_gradeable(attempt: &Attempt) -> Result<(), AttemptError> {
    if matches!(attempt.status, AttemptStatus::Graded) || attempt.status.is_finished() {
        Ok(())
    } else {
        Err(AttemptError::invalid_state("attempt has not been submitted yet"))
    }
}

async fn load_attempt(conn: &mut PgConnection, attempt_id: &str) -> Result<Attempt, AttemptError> {
    repositories::attempts::find_live_for_update(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))
}

async fn load_session(
    conn: &mut PgConnection,
    session_id: &str,
) -> Result<GradingSession, AttemptError> {
    repositories::grading::find_session_for_update(&mut *conn, session_id)
        .await?
        .ok_or(AttemptError::NotFound("grading session"))
}

/// Opens a grading session for a finished attempt, or returns the one already open.
pub(crate) async fn open_session(
    conn: &mut PgConnection,
    grader: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<GradingSessionResponse, AttemptError> {
    let attempt = load_attempt(conn, attempt_id).await?;
    ensure_gradeable(&attempt)?;

    let session = repositories::grading::open_session(
        &mut *conn,
        &Uuid::new_v4().to_string(),
        &attempt.id,
        &grader.id,
        now,
    )
    .await?;
    let answers = repositories::grading::list_graded_answers(&mut *conn, &session.id).await?;

    attempt_control::record_audit(
        conn,
        grader,
        "grading.open_session",
        "grading_session",
        &session.id,
        serde_json::json!({ "attempt_id": attempt.id }),
        now,
    )
    .await?;

    Ok(GradingSessionResponse::new(session, answers))
}

pub(crate) async fn record_grade(
    conn: &mut PgConnection,
    grader: &Actor,
    session_id: &str,
    question_id: &str,
    score_earned: f64,
    comment: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<GradedAnswerResponse, AttemptError> {
    let session = load_session(conn, session_id).await?;
    let question = repositories::attempt_questions::find(&mut *conn, &session.attempt_id, question_id)
        .await?
        .ok_or(AttemptError::QuestionNotInAttempt)?;
    validate_grade(score_earned, question.points)?;

    let graded = repositories::grading::upsert_graded_answer(
        &mut *conn,
        &session.id,
        question_id,
        score_earned,
        comment,
        now,
    )
    .await?;

    attempt_control::record_audit(
        conn,
        grader,
        "grading.record",
        "grading_session",
        &session.id,
        serde_json::json!({ "question_id": question_id, "score_earned": score_earned }),
        now,
    )
    .await?;

    Ok(graded.into())
}

/// Completes an open session and applies its grades to the existing result.
pub(crate) async fn finalize_from_grading_session(
    conn: &mut PgConnection,
    grader: &Actor,
    session_id: &str,
    now: PrimitiveDateTime,
) -> Result<ResultResponse, AttemptError> {
    let session = load_session(conn, session_id).await?;
    if session.status != GradingSessionStatus::Open {
        return Err(AttemptError::invalid_state("grading session is already completed"));
    }

    reconcile(conn, grader, &session, false, now).await
}

/// Re-applies a completed session's grades to a result that already exists. Counts as a
/// regrade.
pub(crate) async fn update_from_regrading(
    conn: &mut PgConnection,
    grader: &Actor,
    session_id: &str,
    now: PrimitiveDateTime,
) -> Result<ResultResponse, AttemptError> {
    let session = load_session(conn, session_id).await?;
    if session.status != GradingSessionStatus::Completed {
        return Err(AttemptError::invalid_state(
            "grading session must be finalized before it can be regraded",
        ));
    }

    reconcile(conn, grader, &session, true, now).await
}

async fn reconcile(
    conn: &mut PgConnection,
    grader: &Actor,
    session: &GradingSession,
    regrade: bool,
    now: PrimitiveDateTime,
) -> Result<ResultResponse, AttemptError> {
    let attempt = load_attempt(conn, &session.attempt_id).await?;
    ensure_gradeable(&attempt)?;
    let exam = repositories::exams::fetch_any(&mut *conn, &attempt.exam_id).await?;

    repositories::results::find_by_attempt_for_update(&mut *conn, &attempt.id)
        .await?
        .ok_or(AttemptError::NotFound("result"))?;

    if session.status == GradingSessionStatus::Open {
        repositories::grading::complete_session(&mut *conn, &session.id, now).await?;
    }

    let graded_answers = repositories::grading::list_graded_answers(&mut *conn, &session.id).await?;
    for graded in &graded_answers {
        repositories::scores::apply_manual_grade(
            &mut *conn,
            &attempt.id,
            &graded.question_id,
            graded.score_earned,
            &grader.id,
            now,
        )
        .await?;
    }

    let scores = repositories::scores::list_by_attempt(&mut *conn, &attempt.id).await?;
    let totals = scoring::summarize(&scores, exam.pass_score);
    let mut result = repositories::results::update_totals(&mut *conn, &attempt.id, &totals, regrade, now)
        .await?
        .ok_or(AttemptError::NotFound("result"))?;

    if totals.pending_manual_count == 0
        && scoring::mark_graded(conn, &attempt.id, Some(&grader.id), now).await?
    {
        result = repositories::results::find_by_attempt(&mut *conn, &attempt.id)
            .await?
            .ok_or(AttemptError::NotFound("result"))?;
    }

    if regrade {
        repositories::attempt_events::append(
            &mut *conn,
            repositories::attempt_events::NewEvent {
                attempt_id: &attempt.id,
                event_type: AttemptEventType::Regraded,
                actor_id: Some(&grader.id),
                reason: None,
                metadata: serde_json::json!({
                    "session_id": session.id,
                    "total_score": totals.total_score,
                    "regrade_count": result.regrade_count,
                }),
                occurred_at: now,
            },
        )
        .await?;
    }

    attempt_control::record_audit(
        conn,
        grader,
        if regrade { "grading.regrade" } else { "grading.finalize" },
        "attempt",
        &attempt.id,
        serde_json::json!({
            "session_id": session.id,
            "graded_answers": graded_answers.len(),
            "total_score": totals.total_score,
            "pending_manual": totals.pending_manual_count,
        }),
        now,
    )
    .await?;

    tracing::info!(
        attempt_id = %attempt.id,
        session_id = %session.id,
        grader_id = %grader.id,
        total_score = totals.total_score,
        pending_manual = totals.pending_manual_count,
        regrade,
        "Grades reconciled"
    );

    Ok(result.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_must_fit_question_points() {
        assert!(validate_grade(0.0, 5.0).is_ok());
        assert!(validate_grade(5.0, 5.0).is_ok());
        assert!(validate_grade(2.5, 5.0).is_ok());
        assert!(matches!(validate_grade(5.5, 5.0), Err(AttemptError::InvalidGrade(_))));
        assert!(matches!(validate_grade(-1.0, 5.0), Err(AttemptError::InvalidGrade(_))));
        assert!(matches!(validate_grade(f64::NAN, 5.0), Err(AttemptError::InvalidGrade(_))));
    }
}
