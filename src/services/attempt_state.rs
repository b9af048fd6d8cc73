//! Attempt lifecycle rules.
//!
//! `started -> in_progress <-> paused`, any active status may end as `submitted`,
//! `expired` or `force_submitted`, and a finished attempt is graded once. Nothing leaves
//! a finished status except towards `graded`.

use time::PrimitiveDateTime;

use crate::db::types::AttemptStatus;
use crate::services::AttemptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Enter,
    Pause,
    Resume,
    Submit,
    Expire,
    ForceSubmit,
    Grade,
}

impl Transition {
    fn label(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Submit => "submit",
            Self::Expire => "expire",
            Self::ForceSubmit => "force submit",
            Self::Grade => "grade",
        }
    }
}

pub(crate) fn next_status(
    current: AttemptStatus,
    transition: Transition,
) -> Result<AttemptStatus, AttemptError> {
    use AttemptStatus::*;

    let next = match (current, transition) {
        (Started, Transition::Enter) => InProgress,
        (InProgress, Transition::Pause) => Paused,
        (Paused, Transition::Resume) => InProgress,
        (Started | InProgress | Paused, Transition::Submit) => Submitted,
        (Started | InProgress | Paused, Transition::Expire) => Expired,
        (Started | InProgress | Paused, Transition::ForceSubmit) => ForceSubmitted,
        (Submitted | Expired | ForceSubmitted, Transition::Grade) => Graded,
        (current, transition) => {
            return Err(AttemptError::InvalidState(format!(
                "cannot {} an attempt that is {}",
                transition.label(),
                current.as_str()
            )))
        }
    };

    Ok(next)
}

/// Status an observer should act on: an active attempt past its deadline is expired even
/// before the expiry has been written.
pub(crate) fn effective_status(
    stored: AttemptStatus,
    now: PrimitiveDateTime,
    expires_at: PrimitiveDateTime,
) -> AttemptStatus {
    if stored.is_active() && now >= expires_at {
        AttemptStatus::Expired
    } else {
        stored
    }
}

pub(crate) fn expiry_due(
    stored: AttemptStatus,
    now: PrimitiveDateTime,
    expires_at: PrimitiveDateTime,
) -> bool {
    stored.is_active() && now >= expires_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use AttemptStatus::*;

    const ALL: [AttemptStatus; 7] =
        [Started, InProgress, Paused, Submitted, ForceSubmitted, Expired, Graded];
    const TRANSITIONS: [Transition; 7] = [
        Transition::Enter,
        Transition::Pause,
        Transition::Resume,
        Transition::Submit,
        Transition::Expire,
        Transition::ForceSubmit,
        Transition::Grade,
    ];

    #[test]
    fn happy_path_transitions() {
        assert_eq!(next_status(Started, Transition::Enter).unwrap(), InProgress);
        assert_eq!(next_status(InProgress, Transition::Pause).unwrap(), Paused);
        assert_eq!(next_status(Paused, Transition::Resume).unwrap(), InProgress);
        assert_eq!(next_status(Paused, Transition::Submit).unwrap(), Submitted);
        assert_eq!(next_status(Started, Transition::ForceSubmit).unwrap(), ForceSubmitted);
        assert_eq!(next_status(InProgress, Transition::Expire).unwrap(), Expired);
        assert_eq!(next_status(Expired, Transition::Grade).unwrap(), Graded);
    }

    #[test]
    fn no_transition_leaves_a_finished_status_for_an_active_one() {
        for status in ALL.into_iter().filter(|status| !status.is_active()) {
            for transition in TRANSITIONS {
                if let Ok(next) = next_status(status, transition) {
                    assert!(!next.is_active(), "{status:?} --{transition:?}--> {next:?}");
                }
            }
        }
    }

    #[test]
    fn graded_is_final() {
        for transition in TRANSITIONS {
            assert!(matches!(
                next_status(Graded, transition),
                Err(AttemptError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn started_cannot_pause_and_in_progress_cannot_resume() {
        assert!(next_status(Started, Transition::Pause).is_err());
        assert!(next_status(InProgress, Transition::Resume).is_err());
        assert!(next_status(InProgress, Transition::Grade).is_err());
    }

    #[test]
    fn effective_status_expires_active_attempts_at_the_deadline() {
        let deadline = datetime!(2025-03-01 10:00:00);
        assert_eq!(effective_status(InProgress, datetime!(2025-03-01 09:59:59), deadline), InProgress);
        assert_eq!(effective_status(InProgress, deadline, deadline), Expired);
        assert_eq!(effective_status(Paused, datetime!(2025-03-01 11:00:00), deadline), Expired);
        assert_eq!(effective_status(Submitted, datetime!(2025-03-01 11:00:00), deadline), Submitted);
        assert!(!expiry_due(Graded, datetime!(2025-03-01 11:00:00), deadline));
    }
}
