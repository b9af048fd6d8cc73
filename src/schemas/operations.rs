use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Attempt, AttemptEvent};
use crate::db::types::{AttemptEventType, AttemptStatus};
use crate::schemas::attempt::ResultResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AddTimeRequest {
    #[serde(alias = "attemptId")]
    #[validate(length(min = 1, message = "attempt_id must not be empty"))]
    pub(crate) attempt_id: String,
    #[serde(alias = "extraMinutes")]
    #[validate(range(min = 1, max = 480, message = "extra_minutes must be between 1 and 480"))]
    pub(crate) extra_minutes: i32,
    #[validate(length(min = 1, max = 1000, message = "reason must not be empty"))]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TerminateRequest {
    #[serde(alias = "attemptId")]
    #[validate(length(min = 1, message = "attempt_id must not be empty"))]
    pub(crate) attempt_id: String,
    #[validate(length(min = 1, max = 1000, message = "reason must not be empty"))]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminAttemptRequest {
    #[serde(alias = "attemptId")]
    #[validate(length(min = 1, message = "attempt_id must not be empty"))]
    pub(crate) attempt_id: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "reason is too long"))]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AllowNewAttemptRequest {
    #[serde(alias = "candidateId")]
    #[validate(length(min = 1, message = "candidate_id must not be empty"))]
    pub(crate) candidate_id: String,
    #[serde(alias = "examId")]
    #[validate(length(min = 1, message = "exam_id must not be empty"))]
    pub(crate) exam_id: String,
    #[validate(length(min = 1, max = 1000, message = "reason must not be empty"))]
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddTimeResponse {
    pub(crate) attempt_id: String,
    pub(crate) expires_at: String,
    pub(crate) extra_time_seconds: i64,
    pub(crate) remaining_seconds: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TerminateResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) result: ResultResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct OverrideResponse {
    pub(crate) override_id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStatusResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) candidate_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) effective_status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) expires_at: String,
    pub(crate) remaining_seconds: i64,
    pub(crate) extra_time_seconds: i64,
    pub(crate) resume_count: i32,
    pub(crate) paused_at: Option<String>,
    pub(crate) last_activity_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) force_submitted_by: Option<String>,
    pub(crate) force_submitted_at: Option<String>,
}

impl AttemptStatusResponse {
    pub(crate) fn from_attempt(
        attempt: Attempt,
        effective_status: AttemptStatus,
        remaining_seconds: i64,
    ) -> Self {
        Self {
            id: attempt.id,
            exam_id: attempt.exam_id,
            candidate_id: attempt.candidate_id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            effective_status,
            started_at: format_primitive(attempt.started_at),
            expires_at: format_primitive(attempt.expires_at),
            remaining_seconds,
            extra_time_seconds: attempt.extra_time_seconds,
            resume_count: attempt.resume_count,
            paused_at: attempt.paused_at.map(format_primitive),
            last_activity_at: format_primitive(attempt.last_activity_at),
            submitted_at: attempt.submitted_at.map(format_primitive),
            force_submitted_by: attempt.force_submitted_by,
            force_submitted_at: attempt.force_submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptEventResponse {
    pub(crate) id: String,
    pub(crate) event_type: AttemptEventType,
    pub(crate) actor_id: Option<String>,
    pub(crate) reason: Option<String>,
    pub(crate) metadata: serde_json::Value,
    pub(crate) occurred_at: String,
}

impl From<AttemptEvent> for AttemptEventResponse {
    fn from(event: AttemptEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            actor_id: event.actor_id,
            reason: event.reason,
            metadata: event.metadata.0,
            occurred_at: format_primitive(event.occurred_at),
        }
    }
}
