use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examkind", rename_all = "lowercase")]
pub(crate) enum ExamKind {
    Fixed,
    Flex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examstatus", rename_all = "lowercase")]
pub(crate) enum ExamStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "recordstate", rename_all = "lowercase")]
pub(crate) enum RecordState {
    Live,
    Archived,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    Started,
    InProgress,
    Paused,
    Submitted,
    ForceSubmitted,
    Expired,
    Graded,
}

impl AttemptStatus {
    pub(crate) const ACTIVE: [AttemptStatus; 3] =
        [AttemptStatus::Started, AttemptStatus::InProgress, AttemptStatus::Paused];

    pub(crate) fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Submitted, force submitted or expired, waiting for grading.
    pub(crate) fn is_finished(self) -> bool {
        matches!(self, Self::Submitted | Self::ForceSubmitted | Self::Expired)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Submitted => "submitted",
            Self::ForceSubmitted => "force_submitted",
            Self::Expired => "expired",
            Self::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Numeric,
    Essay,
}

impl QuestionType {
    pub(crate) fn is_choice(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultipleChoice | Self::TrueFalse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attempteventtype", rename_all = "snake_case")]
pub(crate) enum AttemptEventType {
    Started,
    Entered,
    Paused,
    Resumed,
    AdminResumed,
    TimeAdded,
    Submitted,
    Expired,
    ForceEnded,
    ProctorTerminated,
    Graded,
    Regraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "scoreoutcome", rename_all = "snake_case")]
pub(crate) enum ScoreOutcome {
    AutoGraded,
    PendingManual,
    ManuallyGraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gradingsessionstatus", rename_all = "lowercase")]
pub(crate) enum GradingSessionStatus {
    Open,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "proctorsessionstatus", rename_all = "lowercase")]
pub(crate) enum ProctorSessionStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "proctorseverity", rename_all = "lowercase")]
pub(crate) enum ProctorSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UserRole {
    Candidate,
    Admin,
    Proctor,
    Grader,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Admin => "admin",
            Self::Proctor => "proctor",
            Self::Grader => "grader",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_status_serializes_snake_case() {
        let value = serde_json::to_value(AttemptStatus::ForceSubmitted).expect("serialize");
        assert_eq!(value, "force_submitted");
        assert_eq!(AttemptStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn active_and_finished_sets_are_disjoint() {
        for status in [
            AttemptStatus::Started,
            AttemptStatus::InProgress,
            AttemptStatus::Paused,
            AttemptStatus::Submitted,
            AttemptStatus::ForceSubmitted,
            AttemptStatus::Expired,
            AttemptStatus::Graded,
        ] {
            assert!(!(status.is_active() && status.is_finished()), "{status:?}");
        }
        assert!(!AttemptStatus::Graded.is_active());
        assert!(!AttemptStatus::Graded.is_finished());
    }
}
