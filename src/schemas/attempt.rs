use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::AttemptResult;
use crate::db::types::{AttemptStatus, QuestionType, ScoreOutcome};

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[serde(default, alias = "accessCode")]
    #[validate(length(max = 128, message = "access_code is too long"))]
    pub(crate) access_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSessionResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) expires_at: String,
    pub(crate) remaining_seconds: i64,
    pub(crate) extra_time_seconds: i64,
    pub(crate) resume_count: i32,
    pub(crate) paused_at: Option<String>,
    pub(crate) sections: Vec<SessionSectionResponse>,
    pub(crate) questions: Vec<SessionQuestionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionSectionResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) order_index: i32,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) entered_at: Option<String>,
    pub(crate) deadline: Option<String>,
    pub(crate) remaining_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionQuestionResponse {
    pub(crate) question_id: String,
    pub(crate) section_id: String,
    pub(crate) topic_id: Option<String>,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    pub(crate) is_required: bool,
    pub(crate) body: String,
    pub(crate) options: Vec<SessionOptionResponse>,
    pub(crate) answer: Option<SavedAnswerResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionOptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedAnswerResponse {
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
    pub(crate) answered_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SectionTimerResponse {
    pub(crate) attempt_id: String,
    pub(crate) section_id: String,
    pub(crate) entered_at: Option<String>,
    pub(crate) deadline: String,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SaveAnswerItem {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    #[serde(default, alias = "selectedOptionIds")]
    pub(crate) selected_option_ids: Option<Vec<String>>,
    #[serde(default, alias = "textAnswer")]
    pub(crate) text_answer: Option<String>,
}

/// Either one answer or `{ "answers": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SaveAnswersRequest {
    Bulk { answers: Vec<SaveAnswerItem> },
    Single(SaveAnswerItem),
}

impl SaveAnswersRequest {
    pub(crate) fn into_items(self) -> Vec<SaveAnswerItem> {
        match self {
            Self::Bulk { answers } => answers,
            Self::Single(item) => vec![item],
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveAnswersResponse {
    pub(crate) attempt_id: String,
    pub(crate) saved: usize,
    pub(crate) status: AttemptStatus,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct PauseResumeRequest {
    #[serde(default)]
    #[validate(length(max = 1000, message = "reason is too long"))]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptTimeResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) expires_at: String,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultSummaryResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
    pub(crate) results_visible: bool,
    pub(crate) total_score: Option<f64>,
    pub(crate) max_possible_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) is_passed: Option<bool>,
    pub(crate) pending_manual_count: Option<i32>,
    pub(crate) review: Option<Vec<ReviewItemResponse>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewItemResponse {
    pub(crate) question_id: String,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) points: f64,
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
    pub(crate) outcome: Option<ScoreOutcome>,
    pub(crate) score_earned: Option<f64>,
}

/// Full result view for admins and graders.
#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
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
    pub(crate) published_at: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) regrade_count: i32,
}

impl From<AttemptResult> for ResultResponse {
    fn from(result: AttemptResult) -> Self {
        Self {
            id: result.id,
            attempt_id: result.attempt_id,
            exam_id: result.exam_id,
            candidate_id: result.candidate_id,
            total_score: result.total_score,
            max_possible_score: result.max_possible_score,
            percentage: result.percentage,
            is_passed: result.is_passed,
            pending_manual_count: result.pending_manual_count,
            is_published: result.is_published,
            published_at: result.published_at.map(format_primitive),
            graded_at: result.graded_at.map(format_primitive),
            regrade_count: result.regrade_count,
        }
    }
}
