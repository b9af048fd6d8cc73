use sqlx::PgConnection;
use std::collections::{BTreeSet, HashMap};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AnswerKey, Attempt, AttemptAnswer, AttemptQuestionScore, AttemptResult, Exam};
use crate::db::types::{AttemptEventType, AttemptStatus, ScoreOutcome};
use crate::repositories;
use crate::repositories::results::ScoreTotals;
use crate::services::attempt_state::{self, Transition};
use crate::services::AttemptError;

const NUMERIC_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GradedOutcome {
    Auto { earned: f64, is_correct: bool },
    PendingManual,
}

/// The part of a stored answer that grading looks at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnswerView<'a> {
    pub(crate) selected_option_ids: &'a [String],
    pub(crate) text_answer: Option<&'a str>,
}

impl<'a> From<&'a AttemptAnswer> for AnswerView<'a> {
    fn from(answer: &'a AttemptAnswer) -> Self {
        Self {
            selected_option_ids: &answer.selected_option_ids.0,
            text_answer: answer.text_answer.as_deref(),
        }
    }
}

pub(crate) fn grade_question(
    key: &AnswerKey,
    points: f64,
    answer: Option<AnswerView<'_>>,
) -> GradedOutcome {
    let correct = match key {
        AnswerKey::Manual => return GradedOutcome::PendingManual,
        AnswerKey::Choice { correct_option_ids } if correct_option_ids.is_empty() => {
            return GradedOutcome::PendingManual
        }
        AnswerKey::Choice { correct_option_ids } => answer.is_some_and(|answer| {
            let selected: BTreeSet<&str> =
                answer.selected_option_ids.iter().map(String::as_str).collect();
            let expected: BTreeSet<&str> = correct_option_ids.iter().map(String::as_str).collect();
            selected == expected
        }),
        AnswerKey::Text { accepted, case_sensitive } => {
            if accepted.is_empty() {
                return GradedOutcome::PendingManual;
            }
            answer.and_then(|answer| answer.text_answer).is_some_and(|text| {
                let given = normalize_text(text, *case_sensitive);
                !given.is_empty()
                    && accepted.iter().any(|candidate| normalize_text(candidate, *case_sensitive) == given)
            })
        }
        AnswerKey::Numeric { value, tolerance } => answer
            .and_then(|answer| answer.text_answer)
            .and_then(parse_number)
            .is_some_and(|given| (given - value).abs() <= tolerance.abs() + NUMERIC_EPSILON),
    };

    GradedOutcome::Auto { earned: if correct { points } else { 0.0 }, is_correct: correct }
}

pub(crate) fn normalize_text(value: &str, case_sensitive: bool) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim().replace(',', ".");
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

pub(crate) fn summarize(scores: &[AttemptQuestionScore], pass_score: f64) -> ScoreTotals {
    let max_possible_score: f64 = scores.iter().map(|score| score.max_points).sum();
    let earned: f64 = scores
        .iter()
        .filter(|score| score.outcome != ScoreOutcome::PendingManual)
        .map(|score| score.score_earned.unwrap_or(0.0))
        .sum();
    let total_score = earned.clamp(0.0, max_possible_score.max(0.0));
    let percentage = if max_possible_score > 0.0 {
        ((total_score / max_possible_score) * 10_000.0).round() / 100.0
    } else {
        0.0
    };
    let pending_manual_count =
        scores.iter().filter(|score| score.outcome == ScoreOutcome::PendingManual).count() as i32;

    ScoreTotals {
        total_score,
        max_possible_score,
        percentage,
        is_passed: total_score >= pass_score,
        pending_manual_count,
    }
}

/// Scores a just-finished attempt inside the caller's transaction. Question scores and the
/// result row are only ever inserted once; a replay returns the stored result.
pub(crate) async fn score_attempt(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
    now: PrimitiveDateTime,
) -> Result<AttemptResult, AttemptError> {
    let questions = repositories::attempt_questions::list_by_attempt(&mut *conn, &attempt.id).await?;
    let answers = repositories::answers::list_by_attempt(&mut *conn, &attempt.id).await?;
    let answers_by_question: HashMap<&str, &AttemptAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    for question in &questions {
        let answer = answers_by_question.get(question.question_id.as_str()).map(|a| AnswerView::from(*a));
        let (outcome, score_earned, is_correct, graded_at) =
            match grade_question(&question.answer_key.0, question.points, answer) {
                GradedOutcome::Auto { earned, is_correct } => {
                    (ScoreOutcome::AutoGraded, Some(earned), Some(is_correct), Some(now))
                }
                GradedOutcome::PendingManual => (ScoreOutcome::PendingManual, None, None, None),
            };

        repositories::scores::create_if_absent(
            &mut *conn,
            repositories::scores::CreateScore {
                attempt_id: &attempt.id,
                question_id: &question.question_id,
                outcome,
                score_earned,
                is_correct,
                max_points: question.points,
                graded_at,
            },
        )
        .await?;
    }

    let scores = repositories::scores::list_by_attempt(&mut *conn, &attempt.id).await?;
    let totals = summarize(&scores, exam.pass_score);

    let inserted = repositories::results::create_if_absent(
        &mut *conn,
        repositories::results::CreateResult {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt.id,
            exam_id: &attempt.exam_id,
            candidate_id: &attempt.candidate_id,
            totals: &totals,
            now,
        },
    )
    .await?;

    if inserted {
        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %attempt.exam_id,
            total_score = totals.total_score,
            max_possible_score = totals.max_possible_score,
            pending_manual = totals.pending_manual_count,
            "Attempt scored"
        );
    }

    if totals.pending_manual_count == 0 {
        mark_graded(conn, &attempt.id, None, now).await?;
        if exam.show_results_immediately {
            repositories::results::publish(&mut *conn, &attempt.id, now).await?;
        }
    }

    repositories::results::find_by_attempt(&mut *conn, &attempt.id)
        .await?
        .ok_or(AttemptError::NotFound("result"))
}

/// Moves a finished attempt to graded once. Already graded attempts are left alone.
pub(crate) async fn mark_graded(
    conn: &mut PgConnection,
    attempt_id: &str,
    grader_id: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<bool, AttemptError> {
    let attempt = repositories::attempts::find_live(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))?;
    if attempt.status == AttemptStatus::Graded {
        return Ok(false);
    }

    let next = attempt_state::next_status(attempt.status, Transition::Grade)?;
    if !repositories::attempts::transition(&mut *conn, attempt_id, attempt.status, next, now).await? {
        return Err(AttemptError::invalid_state("attempt changed while grading"));
    }

    repositories::attempt_events::append(
        &mut *conn,
        repositories::attempt_events::NewEvent {
            attempt_id,
            event_type: AttemptEventType::Graded,
            actor_id: grader_id,
            reason: None,
            metadata: serde_json::json!({}),
            occurred_at: now,
        },
    )
    .await?;
    repositories::results::mark_graded(&mut *conn, attempt_id, now).await?;
    crate::core::metrics::record_attempt_finalized("graded");

    Ok(true)
}
