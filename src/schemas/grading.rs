use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{GradedAnswer, GradingSession};
use crate::db::types::GradingSessionStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeAnswerRequest {
    #[serde(alias = "scoreEarned")]
    #[validate(range(min = 0.0, message = "score_earned must be non-negative"))]
    pub(crate) score_earned: f64,
    #[serde(default)]
    #[validate(length(max = 5000, message = "comment is too long"))]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradedAnswerResponse {
    pub(crate) question_id: String,
    pub(crate) score_earned: f64,
    pub(crate) comment: Option<String>,
    pub(crate) graded_at: String,
}

impl From<GradedAnswer> for GradedAnswerResponse {
    fn from(answer: GradedAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            score_earned: answer.score_earned,
            comment: answer.comment,
            graded_at: format_primitive(answer.graded_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingSessionResponse {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) grader_id: String,
    pub(crate) status: GradingSessionStatus,
    pub(crate) created_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) graded_answers: Vec<GradedAnswerResponse>,
}

impl GradingSessionResponse {
    pub(crate) fn new(session: GradingSession, graded_answers: Vec<GradedAnswer>) -> Self {
        Self {
            id: session.id,
            attempt_id: session.attempt_id,
            grader_id: session.grader_id,
            status: session.status,
            created_at: format_primitive(session.created_at),
            completed_at: session.completed_at.map(format_primitive),
            graded_answers: graded_answers.into_iter().map(GradedAnswerResponse::from).collect(),
        }
    }
}
