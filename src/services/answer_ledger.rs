use std::collections::{BTreeSet, HashMap};

use sqlx::PgConnection;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Attempt, AttemptQuestion};
use crate::db::types::{AttemptEventType, AttemptStatus, QuestionType};
use crate::repositories;
use crate::schemas::attempt::{SaveAnswerItem, SaveAnswersResponse};
use crate::services::attempt_state::{self, Transition};
use crate::services::{attempt_control, attempt_timing, scoring, Actor, AttemptError};

/// An answer after shape validation, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NormalizedAnswer {
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
}

pub(crate) fn normalize_answer(
    question: &AttemptQuestion,
    selected_option_ids: Option<&[String]>,
    text_answer: Option<&str>,
) -> Result<NormalizedAnswer, AttemptError> {
    if question.question_type.is_choice() {
        let selected: BTreeSet<&str> = selected_option_ids
            .unwrap_or_default()
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();

        let known: BTreeSet<&str> =
            question.options.0.iter().map(|option| option.id.as_str()).collect();
        if let Some(unknown) = selected.iter().find(|id| !known.contains(**id)) {
            return Err(AttemptError::InvalidAnswer(format!(
                "option {unknown} does not belong to question {}",
                question.question_id
            )));
        }

        let single = matches!(question.question_type, QuestionType::SingleChoice | QuestionType::TrueFalse);
        if single && selected.len() > 1 {
            return Err(AttemptError::InvalidAnswer(format!(
                "question {} accepts a single option",
                question.question_id
            )));
        }

        return Ok(NormalizedAnswer {
            selected_option_ids: selected.into_iter().map(str::to_string).collect(),
            text_answer: None,
        });
    }

    let text = text_answer.map(str::trim).filter(|text| !text.is_empty());
    if question.question_type == QuestionType::Numeric {
        if let Some(value) = text {
            if scoring::parse_number(value).is_none() {
                return Err(AttemptError::InvalidAnswer(format!(
                    "question {} expects a number",
                    question.question_id
                )));
            }
        }
    }

    Ok(NormalizedAnswer { selected_option_ids: Vec::new(), text_answer: text.map(str::to_string) })
}

/// Stores one or more answers in the caller's transaction. Any rejected item rejects the
/// whole batch.
pub(crate) async fn save_answers(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    items: &[SaveAnswerItem],
    max_items: usize,
    now: PrimitiveDateTime,
) -> Result<SaveAnswersResponse, AttemptError> {
    if items.is_empty() {
        return Err(AttemptError::InvalidAnswer("no answers supplied".to_string()));
    }
    if items.len() > max_items {
        return Err(AttemptError::InvalidAnswer(format!(
            "at most {max_items} answers can be saved at once"
        )));
    }

    let attempt = attempt_control::load_owned_for_update(conn, candidate, attempt_id).await?;
    let exam = repositories::exams::fetch_any(&mut *conn, &attempt.exam_id).await?;

    if attempt_state::expiry_due(attempt.status, now, attempt.expires_at) {
        attempt_control::finish_expired(conn, &attempt, &exam, now).await?;
        return Err(AttemptError::AttemptExpired);
    }
    if !matches!(attempt.status, AttemptStatus::Started | AttemptStatus::InProgress) {
        return Err(AttemptError::AttemptNotActive);
    }

    let mut section_open: HashMap<String, bool> = HashMap::new();

    for item in items {
        let Some(question) =
            repositories::attempt_questions::find(&mut *conn, &attempt.id, &item.question_id).await?
        else {
            tracing::warn!(
                attempt_id = %attempt.id,
                question_id = %item.question_id,
                candidate_id = %candidate.id,
                "Answer for a question outside the attempt"
            );
            return Err(AttemptError::QuestionNotInAttempt);
        };

        let normalized = normalize_answer(
            &question,
            item.selected_option_ids.as_deref(),
            item.text_answer.as_deref(),
        )?;

        let open = match section_open.get(&question.section_id) {
            Some(open) => *open,
            None => {
                let open = section_accepts_writes(conn, &attempt, &question.section_id, now).await?;
                section_open.insert(question.section_id.clone(), open);
                open
            }
        };
        if !open {
            return Err(AttemptError::SectionExpired);
        }

        repositories::answers::upsert(
            &mut *conn,
            repositories::answers::UpsertAnswer {
                id: &Uuid::new_v4().to_string(),
                attempt_id: &attempt.id,
                question_id: &question.question_id,
                selected_option_ids: &normalized.selected_option_ids,
                text_answer: normalized.text_answer.as_deref(),
                answered_at: now,
            },
        )
        .await?;
    }

    let status = if attempt.status == AttemptStatus::Started {
        let next = attempt_state::next_status(attempt.status, Transition::Enter)?;
        repositories::attempts::transition(&mut *conn, &attempt.id, attempt.status, next, now).await?;
        repositories::attempt_events::append(
            &mut *conn,
            repositories::attempt_events::NewEvent {
                attempt_id: &attempt.id,
                event_type: AttemptEventType::Entered,
                actor_id: Some(&candidate.id),
                reason: None,
                metadata: serde_json::json!({ "trigger": "answer_saved" }),
                occurred_at: now,
            },
        )
        .await?;
        next
    } else {
        repositories::attempts::touch_activity(&mut *conn, &attempt.id, now).await?;
        attempt.status
    };

    crate::core::metrics::record_answers_saved(items.len());
    tracing::debug!(
        attempt_id = %attempt.id,
        candidate_id = %candidate.id,
        saved = items.len(),
        "Answers saved"
    );

    Ok(SaveAnswersResponse {
        attempt_id: attempt.id,
        saved: items.len(),
        status,
        remaining_seconds: attempt_timing::remaining_seconds(attempt.expires_at, now),
    })
}

/// Starts the section clock on first write into a timed section and reports whether the
/// section still takes answers.
async fn section_accepts_writes(
    conn: &mut PgConnection,
    attempt: &Attempt,
    section_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, AttemptError> {
    let Some(section) =
        repositories::exams::find_section(&mut *conn, &attempt.exam_id, section_id).await?
    else {
        return Ok(true);
    };
    let Some(minutes) = section.duration_minutes else {
        return Ok(true);
    };

    let timer = repositories::section_timers::create_if_absent(
        &mut *conn,
        &attempt.id,
        section_id,
        now,
        attempt_timing::section_expires_at(now, minutes),
    )
    .await?;

    let deadline = attempt_timing::effective_section_deadline(timer.expires_at, attempt.expires_at);
    Ok(now < deadline)
}
