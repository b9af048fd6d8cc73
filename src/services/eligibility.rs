use serde::Serialize;
use sqlx::PgConnection;
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::{ExamStatus, RecordState};
use crate::repositories;
use crate::services::{attempt_state, AttemptError};

pub(crate) const REASON_NOT_PUBLISHED: &str = "Exam is not published";
pub(crate) const REASON_NOT_ACTIVE: &str = "Exam is not active";
pub(crate) const REASON_NOT_STARTED: &str = "Exam has not started yet";
pub(crate) const REASON_ENDED: &str = "Exam has ended";
pub(crate) const REASON_ATTEMPT_IN_PROGRESS: &str = "An attempt is already in progress";
pub(crate) const REASON_NO_ATTEMPTS_LEFT: &str = "Maximum attempts reached";
pub(crate) const REASON_ALREADY_PASSED: &str = "Exam has already been passed";

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Eligibility {
    pub(crate) can_start_now: bool,
    pub(crate) reasons: Vec<String>,
    pub(crate) attempts_used: i64,
    pub(crate) attempts_remaining: i64,
    pub(crate) override_available: bool,
    /// The next start only passes because of the unused override.
    #[serde(skip)]
    pub(crate) requires_override: bool,
}

/// Facts about one candidate on one exam, gathered from the store.
#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateStanding {
    pub(crate) has_active_attempt: bool,
    pub(crate) attempts_used: i64,
    pub(crate) override_available: bool,
    pub(crate) has_published_pass: bool,
}

pub(crate) fn evaluate_rules(
    exam: &Exam,
    standing: &CandidateStanding,
    now: PrimitiveDateTime,
) -> Eligibility {
    let mut reasons = Vec::new();

    if exam.status != ExamStatus::Published {
        reasons.push(REASON_NOT_PUBLISHED.to_string());
    }
    if !exam.is_active || exam.record_state != RecordState::Live {
        reasons.push(REASON_NOT_ACTIVE.to_string());
    }
    if exam.start_time.is_some_and(|start| now < start) {
        reasons.push(REASON_NOT_STARTED.to_string());
    }
    if exam.end_time.is_some_and(|end| now > end) {
        reasons.push(REASON_ENDED.to_string());
    }
    if standing.has_active_attempt {
        reasons.push(REASON_ATTEMPT_IN_PROGRESS.to_string());
    }

    let max_attempts = exam.max_attempts.max(0) as i64;
    let out_of_attempts = standing.attempts_used >= max_attempts;
    if out_of_attempts && !standing.override_available {
        reasons.push(REASON_NO_ATTEMPTS_LEFT.to_string());
    }
    if standing.has_published_pass && !exam.allow_retake_after_pass {
        reasons.push(REASON_ALREADY_PASSED.to_string());
    }

    let attempts_remaining = (max_attempts - standing.attempts_used).max(0)
        + i64::from(standing.override_available);

    Eligibility {
        can_start_now: reasons.is_empty(),
        reasons,
        attempts_used: standing.attempts_used,
        attempts_remaining,
        override_available: standing.override_available,
        requires_override: out_of_attempts && standing.override_available,
    }
}

pub(crate) async fn load_standing(
    conn: &mut PgConnection,
    exam_id: &str,
    candidate_id: &str,
    now: PrimitiveDateTime,
) -> Result<CandidateStanding, sqlx::Error> {
    let active = repositories::attempts::find_active(&mut *conn, exam_id, candidate_id).await?;
    let has_active_attempt = active.is_some_and(|attempt| {
        attempt_state::effective_status(attempt.status, now, attempt.expires_at).is_active()
    });
    let attempts_used =
        repositories::attempts::count_live(&mut *conn, exam_id, candidate_id).await?;
    let override_available =
        repositories::overrides::find_unused(&mut *conn, exam_id, candidate_id).await?.is_some();
    let has_published_pass =
        repositories::results::has_published_pass(&mut *conn, exam_id, candidate_id).await?;

    Ok(CandidateStanding { has_active_attempt, attempts_used, override_available, has_published_pass })
}

/// Read-only eligibility check. Only a missing exam is an error.
pub(crate) async fn evaluate(
    conn: &mut PgConnection,
    candidate_id: &str,
    exam_id: &str,
    now: PrimitiveDateTime,
) -> Result<Eligibility, AttemptError> {
    let exam = repositories::exams::find_live(&mut *conn, exam_id)
        .await?
        .ok_or(AttemptError::NotFound("exam"))?;
    let standing = load_standing(conn, exam_id, candidate_id, now).await?;
    Ok(evaluate_rules(&exam, &standing, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::ExamKind;
    use time::macros::datetime;

    fn exam() -> Exam {
        let created = datetime!(2025-01-01 00:00:00);
        Exam {
            id: "exam-1".to_string(),
            title: "Physics".to_string(),
            kind: ExamKind::Fixed,
            status: ExamStatus::Published,
            is_active: true,
            record_state: RecordState::Live,
            start_time: Some(datetime!(2025-06-01 09:00:00)),
            end_time: Some(datetime!(2025-06-01 12:00:00)),
            duration_minutes: 30,
            max_attempts: 1,
            shuffle_questions: false,
            shuffle_options: false,
            pass_score: 50.0,
            show_results_immediately: false,
            allow_review: false,
            allow_retake_after_pass: false,
            proctoring_enabled: false,
            created_at: created,
            updated_at: created,
        }
    }

    const NOW: PrimitiveDateTime = datetime!(2025-06-01 10:00:00);

    #[test]
    fn fresh_candidate_can_start() {
        let result = evaluate_rules(&exam(), &CandidateStanding::default(), NOW);
        assert!(result.can_start_now);
        assert!(result.reasons.is_empty());
        assert_eq!(result.attempts_remaining, 1);
        assert!(!result.requires_override);
    }

    #[test]
    fn draft_inactive_and_archived_exams_are_blocked() {
        let mut draft = exam();
        draft.status = ExamStatus::Draft;
        draft.is_active = false;
        let result = evaluate_rules(&draft, &CandidateStanding::default(), NOW);
        assert!(!result.can_start_now);
        assert!(result.reasons.contains(&REASON_NOT_PUBLISHED.to_string()));
        assert!(result.reasons.contains(&REASON_NOT_ACTIVE.to_string()));

        let mut archived = exam();
        archived.record_state = RecordState::Archived;
        let result = evaluate_rules(&archived, &CandidateStanding::default(), NOW);
        assert_eq!(result.reasons, vec![REASON_NOT_ACTIVE.to_string()]);
    }

    #[test]
    fn window_bounds_are_enforced() {
        let before = evaluate_rules(&exam(), &CandidateStanding::default(), datetime!(2025-06-01 08:59:59));
        assert_eq!(before.reasons, vec![REASON_NOT_STARTED.to_string()]);

        let after = evaluate_rules(&exam(), &CandidateStanding::default(), datetime!(2025-06-01 12:00:01));
        assert_eq!(after.reasons, vec![REASON_ENDED.to_string()]);

        let at_end = evaluate_rules(&exam(), &CandidateStanding::default(), datetime!(2025-06-01 12:00:00));
        assert!(at_end.can_start_now);

        let mut open = exam();
        open.start_time = None;
        open.end_time = None;
        assert!(evaluate_rules(&open, &CandidateStanding::default(), datetime!(2030-01-01 00:00:00)).can_start_now);
    }

    #[test]
    fn active_attempt_blocks_start() {
        let standing = CandidateStanding { has_active_attempt: true, attempts_used: 1, ..Default::default() };
        let mut exam = exam();
        exam.max_attempts = 3;
        let result = evaluate_rules(&exam, &standing, NOW);
        assert_eq!(result.reasons, vec![REASON_ATTEMPT_IN_PROGRESS.to_string()]);
        assert_eq!(result.attempts_remaining, 2);
    }

    #[test]
    fn unused_override_allows_one_more_attempt() {
        let exhausted = CandidateStanding { attempts_used: 1, ..Default::default() };
        let blocked = evaluate_rules(&exam(), &exhausted, NOW);
        assert!(!blocked.can_start_now);
        assert_eq!(blocked.reasons, vec![REASON_NO_ATTEMPTS_LEFT.to_string()]);
        assert_eq!(blocked.attempts_remaining, 0);

        let granted = CandidateStanding { attempts_used: 1, override_available: true, ..Default::default() };
        let result = evaluate_rules(&exam(), &granted, NOW);
        assert!(result.can_start_now);
        assert!(result.requires_override);
        assert_eq!(result.attempts_remaining, 1);
    }

    #[test]
    fn override_is_not_needed_while_attempts_remain() {
        let mut exam = exam();
        exam.max_attempts = 2;
        let standing = CandidateStanding { attempts_used: 1, override_available: true, ..Default::default() };
        let result = evaluate_rules(&exam, &standing, NOW);
        assert!(result.can_start_now);
        assert!(!result.requires_override);
        assert_eq!(result.attempts_remaining, 2);
    }

    #[test]
    fn published_pass_blocks_retake_unless_allowed() {
        let mut exam = exam();
        exam.max_attempts = 3;
        let standing = CandidateStanding { attempts_used: 1, has_published_pass: true, ..Default::default() };
        assert_eq!(
            evaluate_rules(&exam, &standing, NOW).reasons,
            vec![REASON_ALREADY_PASSED.to_string()]
        );

        exam.allow_retake_after_pass = true;
        assert!(evaluate_rules(&exam, &standing, NOW).can_start_now);
    }
}
