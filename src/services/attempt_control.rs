//! Transactional attempt operations shared by candidates, admins and proctors.
//!
//! Every operation re-reads the attempt with `FOR UPDATE` in the caller's transaction and
//! validates the stored status before writing. Deadlines are enforced lazily: an operation
//! that finds an active attempt past `expires_at` records the expiry, scores the attempt
//! and reports `AttemptExpired`. The caller commits in that case (see
//! [`AttemptError::keeps_writes`]).

use sqlx::PgConnection;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::metrics;
use crate::db::models::{Attempt, AttemptResult, Exam};
use crate::db::types::{AttemptEventType, AttemptStatus};
use crate::repositories;
use crate::schemas::attempt::{
    format_primitive, AttemptSessionResponse, AttemptTimeResponse, ResultResponse,
    ResultSummaryResponse, ReviewItemResponse, SectionTimerResponse,
};
use crate::schemas::operations::{
    AddTimeResponse, AttemptEventResponse, AttemptStatusResponse, OverrideResponse,
    TerminateResponse,
};
use crate::services::attempt_state::{self, Transition};
use crate::services::{attempt_timing, materializer, scoring, Actor, AttemptError};

/// How an active attempt leaves the active set.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FinishMode<'a> {
    Submit { actor: &'a Actor },
    Expire,
    ForceSubmit { actor: &'a Actor, reason: &'a str },
    ProctorTerminate { actor: &'a Actor, reason: &'a str },
}

impl<'a> FinishMode<'a> {
    fn transition(self) -> Transition {
        match self {
            Self::Submit { .. } => Transition::Submit,
            Self::Expire => Transition::Expire,
            Self::ForceSubmit { .. } | Self::ProctorTerminate { .. } => Transition::ForceSubmit,
        }
    }

    fn event_type(self) -> AttemptEventType {
        match self {
            Self::Submit { .. } => AttemptEventType::Submitted,
            Self::Expire => AttemptEventType::Expired,
            Self::ForceSubmit { .. } => AttemptEventType::ForceEnded,
            Self::ProctorTerminate { .. } => AttemptEventType::ProctorTerminated,
        }
    }

    fn actor(self) -> Option<&'a Actor> {
        match self {
            Self::Submit { actor }
            | Self::ForceSubmit { actor, .. }
            | Self::ProctorTerminate { actor, .. } => Some(actor),
            Self::Expire => None,
        }
    }

    fn reason(self) -> Option<&'a str> {
        match self {
            Self::ForceSubmit { reason, .. } | Self::ProctorTerminate { reason, .. } => Some(reason),
            Self::Submit { .. } | Self::Expire => None,
        }
    }

    fn proctor_close_reason(self) -> &'static str {
        match self {
            Self::Submit { .. } => "submitted",
            Self::Expire => "expired",
            Self::ForceSubmit { .. } => "force_ended",
            Self::ProctorTerminate { .. } => "proctor_terminated",
        }
    }
}

/// Locks the attempt row. Candidates only ever see their own attempts; staff see all.
pub(crate) async fn load_owned_for_update(
    conn: &mut PgConnection,
    actor: &Actor,
    attempt_id: &str,
) -> Result<Attempt, AttemptError> {
    let attempt = repositories::attempts::find_live_for_update(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))?;

    if !actor.is_staff() && attempt.candidate_id != actor.id {
        return Err(AttemptError::NotFound("attempt"));
    }

    Ok(attempt)
}

async fn load_with_exam(
    conn: &mut PgConnection,
    actor: &Actor,
    attempt_id: &str,
) -> Result<(Attempt, Exam), AttemptError> {
    let attempt = load_owned_for_update(conn, actor, attempt_id).await?;
    let exam = repositories::exams::fetch_any(&mut *conn, &attempt.exam_id).await?;
    Ok((attempt, exam))
}

/// Moves an active attempt into its finished status and scores it in the same transaction.
pub(crate) async fn finish_attempt(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
    mode: FinishMode<'_>,
    now: PrimitiveDateTime,
) -> Result<AttemptResult, AttemptError> {
    let next = attempt_state::next_status(attempt.status, mode.transition())
        .map_err(|_| AttemptError::AttemptNotActive)?;
    let forced_by = match mode {
        FinishMode::ForceSubmit { actor, .. } | FinishMode::ProctorTerminate { actor, .. } => {
            Some(actor.id.as_str())
        }
        FinishMode::Submit { .. } | FinishMode::Expire => None,
    };

    let finished = repositories::attempts::finish(
        &mut *conn,
        &attempt.id,
        repositories::attempts::FinishAttempt {
            status: next,
            submitted_at: now,
            force_submitted_by: forced_by,
            force_submitted_at: forced_by.map(|_| now),
        },
        now,
    )
    .await?;
    if !finished {
        return Err(AttemptError::AttemptNotActive);
    }

    repositories::proctoring::close_active(&mut *conn, &attempt.id, mode.proctor_close_reason(), now)
        .await?;

    repositories::attempt_events::append(
        &mut *conn,
        repositories::attempt_events::NewEvent {
            attempt_id: &attempt.id,
            event_type: mode.event_type(),
            actor_id: mode.actor().map(|actor| actor.id.as_str()),
            reason: mode.reason(),
            metadata: serde_json::json!({
                "from_status": attempt.status.as_str(),
                "expires_at": format_primitive(attempt.expires_at),
            }),
            occurred_at: now,
        },
    )
    .await?;

    metrics::record_attempt_finalized(next.as_str());
    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %attempt.exam_id,
        candidate_id = %attempt.candidate_id,
        status = next.as_str(),
        "Attempt finished"
    );

    scoring::score_attempt(conn, attempt, exam, now).await
}

pub(crate) async fn finish_expired(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
    now: PrimitiveDateTime,
) -> Result<AttemptResult, AttemptError> {
    finish_attempt(conn, attempt, exam, FinishMode::Expire, now).await
}

async fn expire_if_due(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
    now: PrimitiveDateTime,
) -> Result<(), AttemptError> {
    if attempt_state::expiry_due(attempt.status, now, attempt.expires_at) {
        finish_expired(conn, attempt, exam, now).await?;
        return Err(AttemptError::AttemptExpired);
    }
    Ok(())
}

async fn append_event(
    conn: &mut PgConnection,
    attempt_id: &str,
    event_type: AttemptEventType,
    actor: &Actor,
    reason: Option<&str>,
    metadata: serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), AttemptError> {
    repositories::attempt_events::append(
        &mut *conn,
        repositories::attempt_events::NewEvent {
            attempt_id,
            event_type,
            actor_id: Some(&actor.id),
            reason,
            metadata,
            occurred_at: now,
        },
    )
    .await?;
    Ok(())
}

pub(crate) async fn record_audit(
    conn: &mut PgConnection,
    actor: &Actor,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    metadata: serde_json::Value,
    now: PrimitiveDateTime,
) -> Result<(), AttemptError> {
    repositories::audit::append(
        &mut *conn,
        repositories::audit::NewAuditEntry {
            actor_id: &actor.id,
            action,
            entity_type,
            entity_id,
            metadata,
            created_at: now,
        },
    )
    .await?;
    Ok(())
}

/// Candidate view of an attempt. Finalizes a lapsed attempt before rendering it.
pub(crate) async fn session_view(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<AttemptSessionResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, candidate, attempt_id).await?;
    let attempt = if attempt_state::expiry_due(attempt.status, now, attempt.expires_at) {
        finish_expired(conn, &attempt, &exam, now).await?;
        reload(conn, &attempt.id).await?
    } else {
        attempt
    };
    materializer::load_session(conn, &attempt, &exam, now).await
}

async fn reload(conn: &mut PgConnection, attempt_id: &str) -> Result<Attempt, AttemptError> {
    repositories::attempts::find_live(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))
}

/// Explicit start signal. Entering an attempt that is already in progress is a no-op.
pub(crate) async fn enter(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<AttemptSessionResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, candidate, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;

    let attempt = match attempt.status {
        AttemptStatus::InProgress => attempt,
        AttemptStatus::Started => {
            let next = attempt_state::next_status(attempt.status, Transition::Enter)?;
            repositories::attempts::transition(&mut *conn, &attempt.id, attempt.status, next, now)
                .await?;
            append_event(
                conn,
                &attempt.id,
                AttemptEventType::Entered,
                candidate,
                None,
                serde_json::json!({}),
                now,
            )
            .await?;
            tracing::info!(attempt_id = %attempt.id, candidate_id = %candidate.id, action = "enter", "Attempt entered");
            reload(conn, &attempt.id).await?
        }
        AttemptStatus::Paused => {
            return Err(AttemptError::invalid_state("attempt is paused, resume it first"))
        }
        _ => return Err(AttemptError::AttemptNotActive),
    };

    materializer::load_session(conn, &attempt, &exam, now).await
}

/// Starts the clock of a timed section on first entry. Untimed sections report the
/// attempt deadline.
pub(crate) async fn enter_section(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    section_id: &str,
    now: PrimitiveDateTime,
) -> Result<SectionTimerResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, candidate, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;

    match attempt.status {
        AttemptStatus::Started | AttemptStatus::InProgress => {}
        AttemptStatus::Paused => {
            return Err(AttemptError::invalid_state("attempt is paused, resume it first"))
        }
        _ => return Err(AttemptError::AttemptNotActive),
    }

    let section = repositories::exams::find_section(&mut *conn, &attempt.exam_id, section_id)
        .await?
        .ok_or(AttemptError::NotFound("section"))?;
    if !repositories::attempt_questions::section_has_questions(&mut *conn, &attempt.id, section_id)
        .await?
    {
        return Err(AttemptError::NotFound("section"));
    }

    if attempt.status == AttemptStatus::Started {
        let next = attempt_state::next_status(attempt.status, Transition::Enter)?;
        repositories::attempts::transition(&mut *conn, &attempt.id, attempt.status, next, now).await?;
        append_event(
            conn,
            &attempt.id,
            AttemptEventType::Entered,
            candidate,
            None,
            serde_json::json!({ "section_id": section_id }),
            now,
        )
        .await?;
    } else {
        repositories::attempts::touch_activity(&mut *conn, &attempt.id, now).await?;
    }

    let Some(minutes) = section.duration_minutes else {
        return Ok(SectionTimerResponse {
            attempt_id: attempt.id,
            section_id: section.id,
            entered_at: None,
            deadline: format_primitive(attempt.expires_at),
            remaining_seconds: attempt_timing::remaining_seconds(attempt.expires_at, now),
        });
    };

    let timer = repositories::section_timers::create_if_absent(
        &mut *conn,
        &attempt.id,
        &section.id,
        now,
        attempt_timing::section_expires_at(now, minutes),
    )
    .await?;
    let deadline = attempt_timing::effective_section_deadline(timer.expires_at, attempt.expires_at);
    if now >= deadline {
        return Err(AttemptError::SectionExpired);
    }

    tracing::debug!(
        attempt_id = %attempt.id,
        section_id = %section.id,
        deadline = %format_primitive(deadline),
        "Section entered"
    );

    Ok(SectionTimerResponse {
        attempt_id: attempt.id,
        section_id: section.id,
        entered_at: Some(format_primitive(timer.entered_at)),
        deadline: format_primitive(deadline),
        remaining_seconds: attempt_timing::remaining_seconds(deadline, now),
    })
}

/// Pauses an in-progress attempt, by its candidate or by an admin. The deadline keeps
/// running while paused.
pub(crate) async fn pause(
    conn: &mut PgConnection,
    actor: &Actor,
    attempt_id: &str,
    reason: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<AttemptTimeResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, actor, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;

    attempt_state::next_status(attempt.status, Transition::Pause)?;
    if !repositories::attempts::pause(&mut *conn, &attempt.id, now).await? {
        return Err(AttemptError::invalid_state("attempt changed while pausing"));
    }
    append_event(
        conn,
        &attempt.id,
        AttemptEventType::Paused,
        actor,
        reason,
        serde_json::json!({ "by_admin": actor.is_admin() }),
        now,
    )
    .await?;

    if actor.is_admin() {
        record_audit(
            conn,
            actor,
            "attempt.pause",
            "attempt",
            &attempt.id,
            serde_json::json!({ "reason": reason }),
            now,
        )
        .await?;
        metrics::record_admin_operation("pause");
    }

    tracing::info!(
        attempt_id = %attempt.id,
        candidate_id = %attempt.candidate_id,
        actor_id = %actor.id,
        action = "pause",
        "Attempt paused"
    );

    Ok(AttemptTimeResponse {
        attempt_id: attempt.id,
        status: AttemptStatus::Paused,
        expires_at: format_primitive(attempt.expires_at),
        remaining_seconds: attempt_timing::remaining_seconds(attempt.expires_at, now),
    })
}

/// Resumes a paused attempt, by its candidate or by an admin.
pub(crate) async fn resume(
    conn: &mut PgConnection,
    actor: &Actor,
    attempt_id: &str,
    reason: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<AttemptTimeResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, actor, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;

    attempt_state::next_status(attempt.status, Transition::Resume)?;
    if !repositories::attempts::resume(&mut *conn, &attempt.id, now).await? {
        return Err(AttemptError::invalid_state("attempt changed while resuming"));
    }

    let event_type =
        if actor.is_admin() { AttemptEventType::AdminResumed } else { AttemptEventType::Resumed };
    append_event(
        conn,
        &attempt.id,
        event_type,
        actor,
        reason,
        serde_json::json!({ "resume_count": attempt.resume_count + 1 }),
        now,
    )
    .await?;

    if actor.is_admin() {
        record_audit(
            conn,
            actor,
            "attempt.resume",
            "attempt",
            &attempt.id,
            serde_json::json!({ "reason": reason }),
            now,
        )
        .await?;
        metrics::record_admin_operation("resume");
    }

    tracing::info!(
        attempt_id = %attempt.id,
        candidate_id = %attempt.candidate_id,
        actor_id = %actor.id,
        action = "resume",
        "Attempt resumed"
    );

    Ok(AttemptTimeResponse {
        attempt_id: attempt.id,
        status: AttemptStatus::InProgress,
        expires_at: format_primitive(attempt.expires_at),
        remaining_seconds: attempt_timing::remaining_seconds(attempt.expires_at, now),
    })
}

/// Candidate submission. Accepted past the deadline as long as no expiry was recorded.
pub(crate) async fn submit(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<ResultSummaryResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, candidate, attempt_id).await?;
    if !attempt.status.is_active() {
        return Err(AttemptError::AttemptNotActive);
    }

    finish_attempt(conn, &attempt, &exam, FinishMode::Submit { actor: candidate }, now).await?;
    let attempt = reload(conn, &attempt.id).await?;
    summarize_for_candidate(conn, &attempt, &exam).await
}

pub(crate) async fn add_time(
    conn: &mut PgConnection,
    admin: &Actor,
    attempt_id: &str,
    extra_minutes: i32,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<AddTimeResponse, AttemptError> {
    let extra_seconds = attempt_timing::extension_seconds(extra_minutes)?;
    let (attempt, exam) = load_with_exam(conn, admin, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;

    if !matches!(attempt.status, AttemptStatus::Started | AttemptStatus::InProgress) {
        return Err(AttemptError::invalid_state(format!(
            "cannot add time to an attempt that is {}",
            attempt.status.as_str()
        )));
    }

    let new_expires_at = attempt.expires_at + time::Duration::seconds(extra_seconds);
    if !repositories::attempts::add_time(&mut *conn, &attempt.id, new_expires_at, extra_seconds, now)
        .await?
    {
        return Err(AttemptError::invalid_state("attempt changed while adding time"));
    }

    append_event(
        conn,
        &attempt.id,
        AttemptEventType::TimeAdded,
        admin,
        Some(reason),
        serde_json::json!({
            "extra_minutes": extra_minutes,
            "previous_expires_at": format_primitive(attempt.expires_at),
            "expires_at": format_primitive(new_expires_at),
        }),
        now,
    )
    .await?;
    record_audit(
        conn,
        admin,
        "attempt.add_time",
        "attempt",
        &attempt.id,
        serde_json::json!({ "extra_minutes": extra_minutes, "reason": reason }),
        now,
    )
    .await?;
    metrics::record_admin_operation("add_time");

    tracing::info!(
        attempt_id = %attempt.id,
        candidate_id = %attempt.candidate_id,
        admin_id = %admin.id,
        extra_minutes,
        action = "add_time",
        "Attempt time extended"
    );

    Ok(AddTimeResponse {
        attempt_id: attempt.id,
        expires_at: format_primitive(new_expires_at),
        extra_time_seconds: attempt.extra_time_seconds + extra_seconds,
        remaining_seconds: attempt_timing::remaining_seconds(new_expires_at, now),
    })
}

/// Force-submits an attempt on behalf of an admin or a proctor.
pub(crate) async fn terminate(
    conn: &mut PgConnection,
    actor: &Actor,
    attempt_id: &str,
    reason: &str,
    by_proctor: bool,
    now: PrimitiveDateTime,
) -> Result<TerminateResponse, AttemptError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AttemptError::invalid_state("a reason is required to terminate an attempt"));
    }

    let (attempt, exam) = load_with_exam(conn, actor, attempt_id).await?;
    expire_if_due(conn, &attempt, &exam, now).await?;
    if !attempt.status.is_active() {
        return Err(AttemptError::invalid_state(format!(
            "cannot terminate an attempt that is {}",
            attempt.status.as_str()
        )));
    }

    let mode = if by_proctor {
        FinishMode::ProctorTerminate { actor, reason }
    } else {
        FinishMode::ForceSubmit { actor, reason }
    };
    let result = finish_attempt(conn, &attempt, &exam, mode, now).await?;

    let action = if by_proctor { "attempt.proctor_terminate" } else { "attempt.terminate" };
    record_audit(
        conn,
        actor,
        action,
        "attempt",
        &attempt.id,
        serde_json::json!({ "reason": reason, "from_status": attempt.status.as_str() }),
        now,
    )
    .await?;
    metrics::record_admin_operation(if by_proctor { "proctor_terminate" } else { "terminate" });

    let attempt = reload(conn, &attempt.id).await?;
    Ok(TerminateResponse { attempt_id: attempt.id, status: attempt.status, result: result.into() })
}

/// Grants one extra attempt beyond `max_attempts`.
pub(crate) async fn grant_new_attempt(
    conn: &mut PgConnection,
    admin: &Actor,
    candidate_id: &str,
    exam_id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<OverrideResponse, AttemptError> {
    repositories::exams::find_live(&mut *conn, exam_id)
        .await?
        .ok_or(AttemptError::NotFound("exam"))?;

    repositories::attempts::acquire_exam_candidate_lock(&mut *conn, exam_id, candidate_id).await?;
    if let Some(active) = repositories::attempts::find_active(&mut *conn, exam_id, candidate_id).await? {
        if attempt_state::effective_status(active.status, now, active.expires_at).is_active() {
            return Err(AttemptError::invalid_state("candidate has an attempt in progress"));
        }
    }

    let override_id = Uuid::new_v4().to_string();
    let created = repositories::overrides::create_if_none_unused(
        &mut *conn,
        repositories::overrides::CreateOverride {
            id: &override_id,
            exam_id,
            candidate_id,
            granted_by: &admin.id,
            reason,
            created_at: now,
        },
    )
    .await?;
    if !created {
        return Err(AttemptError::DuplicateOverride);
    }

    record_audit(
        conn,
        admin,
        "attempt.allow_new_attempt",
        "exam",
        exam_id,
        serde_json::json!({ "candidate_id": candidate_id, "override_id": override_id, "reason": reason }),
        now,
    )
    .await?;
    metrics::record_admin_operation("allow_new_attempt");

    tracing::info!(
        exam_id = %exam_id,
        candidate_id = %candidate_id,
        admin_id = %admin.id,
        override_id = %override_id,
        action = "allow_new_attempt",
        "Attempt override granted"
    );

    Ok(OverrideResponse {
        override_id,
        exam_id: exam_id.to_string(),
        candidate_id: candidate_id.to_string(),
    })
}

pub(crate) async fn publish_result(
    conn: &mut PgConnection,
    admin: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<ResultResponse, AttemptError> {
    let current = repositories::results::find_by_attempt_for_update(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("result"))?;
    if current.pending_manual_count > 0 {
        return Err(AttemptError::invalid_state("result still has questions awaiting grading"));
    }

    let published = repositories::results::publish(&mut *conn, attempt_id, now)
        .await?
        .ok_or(AttemptError::NotFound("result"))?;

    if !current.is_published {
        record_audit(conn, admin, "result.publish", "attempt", attempt_id, serde_json::json!({}), now)
            .await?;
        metrics::record_admin_operation("publish_result");
    }

    Ok(published.into())
}

/// Staff view of an attempt. Never writes, reports the effective status instead.
pub(crate) async fn attempt_status(
    conn: &mut PgConnection,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<AttemptStatusResponse, AttemptError> {
    let attempt = reload(conn, attempt_id).await?;
    let effective = attempt_state::effective_status(attempt.status, now, attempt.expires_at);
    let remaining = if effective.is_active() {
        attempt_timing::remaining_seconds(attempt.expires_at, now)
    } else {
        0
    };
    Ok(AttemptStatusResponse::from_attempt(attempt, effective, remaining))
}

pub(crate) async fn list_events(
    conn: &mut PgConnection,
    attempt_id: &str,
) -> Result<Vec<AttemptEventResponse>, AttemptError> {
    let attempt = reload(conn, attempt_id).await?;
    let events = repositories::attempt_events::list_by_attempt(&mut *conn, &attempt.id).await?;
    Ok(events.into_iter().map(AttemptEventResponse::from).collect())
}

pub(crate) async fn result_summary(
    conn: &mut PgConnection,
    candidate: &Actor,
    attempt_id: &str,
    now: PrimitiveDateTime,
) -> Result<ResultSummaryResponse, AttemptError> {
    let (attempt, exam) = load_with_exam(conn, candidate, attempt_id).await?;
    let attempt = if attempt_state::expiry_due(attempt.status, now, attempt.expires_at) {
        finish_expired(conn, &attempt, &exam, now).await?;
        reload(conn, &attempt.id).await?
    } else {
        attempt
    };
    summarize_for_candidate(conn, &attempt, &exam).await
}

/// Scores only once the result is published; the answer review only when the exam allows it.
async fn summarize_for_candidate(
    conn: &mut PgConnection,
    attempt: &Attempt,
    exam: &Exam,
) -> Result<ResultSummaryResponse, AttemptError> {
    let result = repositories::results::find_by_attempt(&mut *conn, &attempt.id).await?;
    let visible = result.as_ref().is_some_and(|result| result.is_published);

    let review = if visible && exam.allow_review {
        Some(load_review(conn, &attempt.id).await?)
    } else {
        None
    };
    let shown = result.filter(|result| result.is_published);

    Ok(ResultSummaryResponse {
        attempt_id: attempt.id.clone(),
        exam_id: attempt.exam_id.clone(),
        status: attempt.status,
        submitted_at: attempt.submitted_at.map(format_primitive),
        results_visible: visible,
        total_score: shown.as_ref().map(|result| result.total_score),
        max_possible_score: shown.as_ref().map(|result| result.max_possible_score),
        percentage: shown.as_ref().map(|result| result.percentage),
        is_passed: shown.as_ref().map(|result| result.is_passed),
        pending_manual_count: shown.as_ref().map(|result| result.pending_manual_count),
        review,
    })
}

async fn load_review(
    conn: &mut PgConnection,
    attempt_id: &str,
) -> Result<Vec<ReviewItemResponse>, AttemptError> {
    let questions = repositories::attempt_questions::list_by_attempt(&mut *conn, attempt_id).await?;
    let answers = repositories::answers::list_by_attempt(&mut *conn, attempt_id).await?;
    let scores = repositories::scores::list_by_attempt(&mut *conn, attempt_id).await?;

    Ok(questions
        .into_iter()
        .map(|question| {
            let answer = answers.iter().find(|answer| answer.question_id == question.question_id);
            let score = scores.iter().find(|score| score.question_id == question.question_id);
            ReviewItemResponse {
                position: question.position,
                question_type: question.question_type,
                points: question.points,
                selected_option_ids: answer
                    .map(|answer| answer.selected_option_ids.0.clone())
                    .unwrap_or_default(),
                text_answer: answer.and_then(|answer| answer.text_answer.clone()),
                outcome: score.map(|score| score.outcome),
                score_earned: score.and_then(|score| score.score_earned),
                question_id: question.question_id,
            }
        })
        .collect())
}
