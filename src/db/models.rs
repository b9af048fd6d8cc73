use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptEventType, AttemptStatus, ExamKind, ExamStatus, GradingSessionStatus,
    ProctorSessionStatus, ProctorSeverity, QuestionType, RecordState, ScoreOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) kind: ExamKind,
    pub(crate) status: ExamStatus,
    pub(crate) is_active: bool,
    pub(crate) record_state: RecordState,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) duration_minutes: i32,
    pub(crate) max_attempts: i32,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_options: bool,
    pub(crate) pass_score: f64,
    pub(crate) show_results_immediately: bool,
    pub(crate) allow_review: bool,
    pub(crate) allow_retake_after_pass: bool,
    pub(crate) proctoring_enabled: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAccessPolicy {
    pub(crate) exam_id: String,
    pub(crate) requires_access_code: bool,
    pub(crate) access_code_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamSection {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) title: String,
    pub(crate) order_index: i32,
    pub(crate) duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamTopic {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) section_id: String,
    pub(crate) title: String,
    pub(crate) order_index: i32,
}

/// Option of a choice question as stored in the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
}

/// Option copied into an attempt. Carries no correctness flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct OptionSnapshot {
    pub(crate) id: String,
    pub(crate) text: String,
}

/// Grading key frozen into every attempt question at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum AnswerKey {
    Choice {
        correct_option_ids: Vec<String>,
    },
    Text {
        accepted: Vec<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    Numeric {
        value: f64,
        #[serde(default)]
        tolerance: f64,
    },
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) body: String,
    pub(crate) points: f64,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) answer_key: Option<Json<AnswerKey>>,
    pub(crate) record_state: RecordState,
}

/// An exam question joined with its bank question.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExamQuestionSource {
    pub(crate) question_id: String,
    pub(crate) section_id: String,
    pub(crate) topic_id: Option<String>,
    pub(crate) order_index: i32,
    pub(crate) points_override: Option<f64>,
    pub(crate) is_required: bool,
    pub(crate) question_type: QuestionType,
    pub(crate) body: String,
    pub(crate) points: f64,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) answer_key: Option<Json<AnswerKey>>,
}

impl ExamQuestionSource {
    pub(crate) fn effective_points(&self) -> f64 {
        self.points_override.unwrap_or(self.points)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) extra_time_seconds: i64,
    pub(crate) resume_count: i32,
    pub(crate) paused_at: Option<PrimitiveDateTime>,
    pub(crate) last_activity_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) force_submitted_by: Option<String>,
    pub(crate) force_submitted_at: Option<PrimitiveDateTime>,
    pub(crate) shuffle_seed: i64,
    pub(crate) record_state: RecordState,
    pub(crate) version: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptQuestion {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) section_id: String,
    pub(crate) topic_id: Option<String>,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    pub(crate) is_required: bool,
    pub(crate) body: String,
    pub(crate) options: Json<Vec<OptionSnapshot>>,
    pub(crate) option_order: Json<Vec<String>>,
    pub(crate) answer_key: Json<AnswerKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptSectionTimer {
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) entered_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptAnswer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_ids: Json<Vec<String>>,
    pub(crate) text_answer: Option<String>,
    pub(crate) answered_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptEvent {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) event_type: AttemptEventType,
    pub(crate) actor_id: Option<String>,
    pub(crate) reason: Option<String>,
    pub(crate) metadata: Json<serde_json::Value>,
    pub(crate) occurred_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AdminAttemptOverride {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_id: String,
    pub(crate) granted_by: String,
    pub(crate) reason: String,
    pub(crate) is_used: bool,
    pub(crate) used_at: Option<PrimitiveDateTime>,
    pub(crate) used_by_attempt_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptQuestionScore {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) outcome: ScoreOutcome,
    pub(crate) score_earned: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) max_points: f64,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptResult {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_id: String,
    pub(crate) total_score: f64,
    pub(crate) max_possible_score: f64,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
    pub(crate) pending_manual_count: i32,
    pub(crate) is_published: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) regrade_count: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingSession {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) grader_id: String,
    pub(crate) status: GradingSessionStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradedAnswer {
    pub(crate) session_id: String,
    pub(crate) question_id: String,
    pub(crate) score_earned: f64,
    pub(crate) comment: Option<String>,
    pub(crate) graded_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ProctorSession {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) status: ProctorSessionStatus,
    pub(crate) opened_at: PrimitiveDateTime,
    pub(crate) closed_at: Option<PrimitiveDateTime>,
    pub(crate) close_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ProctorEvent {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) attempt_id: String,
    pub(crate) event_type: String,
    pub(crate) severity: ProctorSeverity,
    pub(crate) risk_score: f64,
    pub(crate) metadata: Json<serde_json::Value>,
    pub(crate) occurred_at: PrimitiveDateTime,
}
