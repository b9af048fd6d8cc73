use time::{Duration, PrimitiveDateTime};

use crate::db::models::Exam;
use crate::db::types::ExamKind;
use crate::services::AttemptError;

pub(crate) const MAX_EXTRA_MINUTES: i32 = 480;

/// Deadline of a fresh attempt. Fixed exams never run past the end of their window;
/// flex exams always grant the full duration.
pub(crate) fn compute_expires_at(
    kind: ExamKind,
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    window_end: Option<PrimitiveDateTime>,
) -> PrimitiveDateTime {
    let duration_deadline = started_at + Duration::minutes(duration_minutes as i64);
    match (kind, window_end) {
        (ExamKind::Fixed, Some(end)) if end < duration_deadline => end,
        _ => duration_deadline,
    }
}

pub(crate) fn expires_at_for_exam(exam: &Exam, started_at: PrimitiveDateTime) -> PrimitiveDateTime {
    compute_expires_at(exam.kind, started_at, exam.duration_minutes, exam.end_time)
}

/// Raw expiry stored for a section timer.
pub(crate) fn section_expires_at(
    entered_at: PrimitiveDateTime,
    section_minutes: i32,
) -> PrimitiveDateTime {
    entered_at + Duration::minutes(section_minutes as i64)
}

/// The tighter of the section clock and the attempt clock.
pub(crate) fn effective_section_deadline(
    section_expires_at: PrimitiveDateTime,
    attempt_expires_at: PrimitiveDateTime,
) -> PrimitiveDateTime {
    section_expires_at.min(attempt_expires_at)
}

pub(crate) fn remaining_seconds(deadline: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    crate::core::time::seconds_until(deadline, now)
}

/// Validates an admin time extension and returns it in seconds.
pub(crate) fn extension_seconds(extra_minutes: i32) -> Result<i64, AttemptError> {
    if extra_minutes <= 0 || extra_minutes > MAX_EXTRA_MINUTES {
        return Err(AttemptError::invalid_state(format!(
            "extra minutes must be between 1 and {MAX_EXTRA_MINUTES}"
        )));
    }
    Ok(extra_minutes as i64 * 60)
}
