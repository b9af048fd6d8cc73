//! Builds an attempt from an exam definition and renders the candidate view of it.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use sqlx::PgConnection;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{
    AnswerKey, Attempt, AttemptAnswer, AttemptQuestion, AttemptSectionTimer, Exam,
    ExamQuestionSource, ExamSection, ExamTopic, OptionSnapshot,
};
use crate::db::types::{AttemptEventType, QuestionType};
use crate::repositories;
use crate::schemas::attempt::{
    format_primitive, AttemptSessionResponse, SavedAnswerResponse, SessionOptionResponse,
    SessionQuestionResponse, SessionSectionResponse,
};
use crate::services::{access_codes, attempt_control, attempt_state, attempt_timing, eligibility};
use crate::services::{Actor, AttemptError};

/// One question of a new attempt, in final order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedQuestion {
    pub(crate) question_id: String,
    pub(crate) section_id: String,
    pub(crate) topic_id: Option<String>,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    pub(crate) is_required: bool,
    pub(crate) body: String,
    pub(crate) options: Vec<OptionSnapshot>,
    pub(crate) option_order: Vec<String>,
    pub(crate) answer_key: AnswerKey,
}

pub(crate) struct ShufflePolicy {
    pub(crate) questions: bool,
    pub(crate) options: bool,
    pub(crate) seed: i64,
}

/// Orders questions by section, then section-level questions before each topic's
/// questions. Shuffling never moves a question out of its (section, topic) group.
pub(crate) fn plan_questions(
    sections: &[ExamSection],
    topics: &[ExamTopic],
    sources: Vec<ExamQuestionSource>,
    policy: &ShufflePolicy,
) -> Vec<PlannedQuestion> {
    let section_rank: HashMap<&str, usize> =
        sections.iter().enumerate().map(|(rank, section)| (section.id.as_str(), rank)).collect();
    let topic_rank: HashMap<&str, usize> =
        topics.iter().enumerate().map(|(rank, topic)| (topic.id.as_str(), rank)).collect();

    let group_key = |source: &ExamQuestionSource| {
        let section = section_rank.get(source.section_id.as_str()).copied().unwrap_or(usize::MAX);
        let topic = match source.topic_id.as_deref() {
            None => 0,
            Some(topic_id) => topic_rank.get(topic_id).map(|rank| rank + 1).unwrap_or(usize::MAX),
        };
        (section, topic)
    };

    let mut sources = sources;
    sources.sort_by(|left, right| {
        group_key(left)
            .cmp(&group_key(right))
            .then(left.section_id.cmp(&right.section_id))
            .then(left.topic_id.cmp(&right.topic_id))
            .then(left.order_index.cmp(&right.order_index))
            .then(left.question_id.cmp(&right.question_id))
    });

    let mut groups: Vec<Vec<ExamQuestionSource>> = Vec::new();
    for source in sources {
        match groups.last_mut() {
            Some(group)
                if group[0].section_id == source.section_id
                    && group[0].topic_id == source.topic_id =>
            {
                group.push(source)
            }
            _ => groups.push(vec![source]),
        }
    }

    let mut rng = StdRng::seed_from_u64(policy.seed as u64);
    let mut planned = Vec::new();

    for mut group in groups {
        if policy.questions {
            group.shuffle(&mut rng);
        }

        for source in group {
            let mut option_order: Vec<String> =
                source.options.0.iter().map(|option| option.id.clone()).collect();
            if policy.options && source.question_type.is_choice() {
                option_order.shuffle(&mut rng);
            }

            let answer_key = answer_key_for(&source);
            let options = source
                .options
                .0
                .iter()
                .map(|option| OptionSnapshot { id: option.id.clone(), text: option.text.clone() })
                .collect();

            planned.push(PlannedQuestion {
                position: planned.len() as i32 + 1,
                points: source.effective_points(),
                question_id: source.question_id,
                section_id: source.section_id,
                topic_id: source.topic_id,
                question_type: source.question_type,
                is_required: source.is_required,
                body: source.body,
                options,
                option_order,
                answer_key,
            });
        }
    }

    planned
}

/// Freezes the grading key for a question. Keys that do not fit the question type fall
/// back to manual grading.
pub(crate) fn answer_key_for(source: &ExamQuestionSource) -> AnswerKey {
    let stored = source.answer_key.as_ref().map(|key| &key.0);
    match source.question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            AnswerKey::Choice {
                correct_option_ids: source
                    .options
                    .0
                    .iter()
                    .filter(|option| option.is_correct)
                    .map(|option| option.id.clone())
                    .collect(),
            }
        }
        QuestionType::ShortAnswer => match stored {
            Some(key @ AnswerKey::Text { accepted, .. }) if !accepted.is_empty() => key.clone(),
            _ => AnswerKey::Manual,
        },
        QuestionType::Numeric => match stored {
            Some(key @ AnswerKey::Numeric { .. }) => key.clone(),
            _ => AnswerKey::Manual,
        },
        QuestionType::Essay => AnswerKey::Manual,
    }
}

/// Resumes the live attempt of the candidate on the exam or starts a new one.
pub(crate) async fn start_or_resume(
    conn: &mut PgConnection,
    candidate: &Actor,
    exam_id: &str,
    access_code: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<(AttemptSessionResponse, bool), AttemptError> {
    repositories::attempts::acquire_exam_candidate_lock(&mut *conn, exam_id, &candidate.id).await?;

    let exam = repositories::exams::find_live(&mut *conn, exam_id)
        .await?
        .ok_or(AttemptError::NotFound("exam"))?;

    if let Some(existing) =
        repositories::attempts::find_active_for_update(&mut *conn, exam_id, &candidate.id).await?
    {
        if attempt_state::expiry_due(existing.status, now, existing.expires_at) {
            attempt_control::finish_expired(conn, &existing, &exam, now).await?;
        } else {
            let view = load_session(conn, &existing, &exam, now).await?;
            crate::core::metrics::record_attempt_started(true);
            return Ok((view, true));
        }
    }

    let standing = eligibility::load_standing(conn, exam_id, &candidate.id, now).await?;
    let verdict = eligibility::evaluate_rules(&exam, &standing, now);
    if !verdict.can_start_now {
        return Err(AttemptError::Ineligible(verdict.reasons));
    }

    check_access_code(conn, exam_id, access_code).await?;

    let sections = repositories::exams::list_sections(&mut *conn, exam_id).await?;
    let topics = repositories::exams::list_topics(&mut *conn, exam_id).await?;
    let sources = repositories::exams::list_question_sources(&mut *conn, exam_id).await?;

    let seed = rand::random::<i64>();
    let planned = plan_questions(
        &sections,
        &topics,
        sources,
        &ShufflePolicy { questions: exam.shuffle_questions, options: exam.shuffle_options, seed },
    );

    let attempt_id = Uuid::new_v4().to_string();
    let attempt_number =
        repositories::attempts::max_attempt_number(&mut *conn, exam_id, &candidate.id).await? + 1;
    let expires_at = attempt_timing::expires_at_for_exam(&exam, now);

    let inserted = repositories::attempts::create(
        &mut *conn,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            exam_id,
            candidate_id: &candidate.id,
            attempt_number,
            started_at: now,
            expires_at,
            shuffle_seed: seed,
        },
    )
    .await?;
    if !inserted {
        return Err(AttemptError::Ineligible(vec![
            eligibility::REASON_ATTEMPT_IN_PROGRESS.to_string(),
        ]));
    }

    for question in &planned {
        repositories::attempt_questions::create(
            &mut *conn,
            repositories::attempt_questions::CreateAttemptQuestion {
                id: &Uuid::new_v4().to_string(),
                attempt_id: &attempt_id,
                question_id: &question.question_id,
                section_id: &question.section_id,
                topic_id: question.topic_id.as_deref(),
                position: question.position,
                question_type: question.question_type,
                points: question.points,
                is_required: question.is_required,
                body: &question.body,
                options: &question.options,
                option_order: &question.option_order,
                answer_key: &question.answer_key,
            },
        )
        .await?;
    }

    if verdict.requires_override {
        let grant = repositories::overrides::find_unused(&mut *conn, exam_id, &candidate.id)
            .await?
            .ok_or_else(|| AttemptError::Ineligible(vec![eligibility::REASON_NO_ATTEMPTS_LEFT.to_string()]))?;
        if !repositories::overrides::consume(&mut *conn, &grant.id, &attempt_id, now).await? {
            return Err(AttemptError::Ineligible(vec![
                eligibility::REASON_NO_ATTEMPTS_LEFT.to_string(),
            ]));
        }
        tracing::info!(
            attempt_id = %attempt_id,
            override_id = %grant.id,
            "Attempt override consumed"
        );
    }

    if exam.proctoring_enabled {
        repositories::proctoring::open_session(
            &mut *conn,
            &Uuid::new_v4().to_string(),
            &attempt_id,
            now,
        )
        .await?;
    }

    repositories::attempt_events::append(
        &mut *conn,
        repositories::attempt_events::NewEvent {
            attempt_id: &attempt_id,
            event_type: AttemptEventType::Started,
            actor_id: Some(&candidate.id),
            reason: None,
            metadata: serde_json::json!({
                "attempt_number": attempt_number,
                "question_count": planned.len(),
                "used_override": verdict.requires_override,
            }),
            occurred_at: now,
        },
    )
    .await?;

    crate::core::metrics::record_attempt_started(false);
    tracing::info!(
        attempt_id = %attempt_id,
        exam_id = %exam_id,
        candidate_id = %candidate.id,
        attempt_number,
        action = "start",
        "Attempt started"
    );

    let attempt = repositories::attempts::find_live(&mut *conn, &attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))?;
    let view = load_session(conn, &attempt, &exam, now).await?;
    Ok((view, false))
}

async fn check_access_code(
    conn: &mut PgConnection,
    exam_id: &str,
    supplied: Option<&str>,
) -> Result<(), AttemptError> {
    let Some(policy) = repositories::exams::find_access_policy(&mut *conn, exam_id).await? else {
        return Ok(());
    };
    if !policy.requires_access_code {
        return Ok(());
    }

    let matches = match (supplied.filter(|code| !code.trim().is_empty()), policy.access_code_hash) {
        (Some(code), Some(hash)) => access_codes::access_code_matches(code, &hash),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(AttemptError::InvalidAccessCode)
    }
}

/// Candidate-safe view of an attempt: options in the stored order, no grading keys.
pub(crate) async fn load_session(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
    now: PrimitiveDateTime,
) -> Result<AttemptSessionResponse, AttemptError> {
    let sections = repositories::exams::list_sections(&mut *conn, &exam.id).await?;
    let questions = repositories::attempt_questions::list_by_attempt(&mut *conn, &attempt.id).await?;
    let timers = repositories::section_timers::list_by_attempt(&mut *conn, &attempt.id).await?;
    let answers = repositories::answers::list_by_attempt(&mut *conn, &attempt.id).await?;

    Ok(render_session(attempt, exam, &sections, questions, &timers, answers, now))
}

pub(crate) fn render_session(
    attempt: &Attempt,
    exam: &Exam,
    sections: &[ExamSection],
    questions: Vec<AttemptQuestion>,
    timers: &[AttemptSectionTimer],
    answers: Vec<AttemptAnswer>,
    now: PrimitiveDateTime,
) -> AttemptSessionResponse {
    let status = attempt_state::effective_status(attempt.status, now, attempt.expires_at);
    let remaining_seconds = if status.is_active() {
        attempt_timing::remaining_seconds(attempt.expires_at, now)
    } else {
        0
    };

    let timers_by_section: HashMap<&str, &AttemptSectionTimer> =
        timers.iter().map(|timer| (timer.section_id.as_str(), timer)).collect();
    let mut answers_by_question: HashMap<String, AttemptAnswer> =
        answers.into_iter().map(|answer| (answer.question_id.clone(), answer)).collect();

    let section_views = sections
        .iter()
        .filter(|section| questions.iter().any(|question| question.section_id == section.id))
        .map(|section| {
            let timer = timers_by_section.get(section.id.as_str());
            let deadline = timer.map(|timer| {
                attempt_timing::effective_section_deadline(timer.expires_at, attempt.expires_at)
            });
            SessionSectionResponse {
                id: section.id.clone(),
                title: section.title.clone(),
                order_index: section.order_index,
                duration_minutes: section.duration_minutes,
                entered_at: timer.map(|timer| format_primitive(timer.entered_at)),
                deadline: deadline.map(format_primitive),
                remaining_seconds: deadline
                    .map(|deadline| attempt_timing::remaining_seconds(deadline, now)),
            }
        })
        .collect();

    let question_views = questions
        .into_iter()
        .map(|question| {
            let by_id: HashMap<&str, &OptionSnapshot> =
                question.options.0.iter().map(|option| (option.id.as_str(), option)).collect();
            let options = question
                .option_order
                .0
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .map(|option| SessionOptionResponse { id: option.id.clone(), text: option.text.clone() })
                .collect();
            let answer = answers_by_question.remove(&question.question_id).map(|answer| {
                SavedAnswerResponse {
                    selected_option_ids: answer.selected_option_ids.0,
                    text_answer: answer.text_answer,
                    answered_at: format_primitive(answer.answered_at),
                }
            });

            SessionQuestionResponse {
                question_id: question.question_id,
                section_id: question.section_id,
                topic_id: question.topic_id,
                position: question.position,
                question_type: question.question_type,
                points: question.points,
                is_required: question.is_required,
                body: question.body,
                options,
                answer,
            }
        })
        .collect();

    AttemptSessionResponse {
        attempt_id: attempt.id.clone(),
        exam_id: attempt.exam_id.clone(),
        exam_title: exam.title.clone(),
        attempt_number: attempt.attempt_number,
        status,
        started_at: format_primitive(attempt.started_at),
        expires_at: format_primitive(attempt.expires_at),
        remaining_seconds,
        extra_time_seconds: attempt.extra_time_seconds,
        resume_count: attempt.resume_count,
        paused_at: attempt.paused_at.map(format_primitive),
        sections: section_views,
        questions: question_views,
    }
}
