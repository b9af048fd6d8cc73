use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::ProctorEvent;
use crate::db::types::{AttemptStatus, ProctorSeverity};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProctorEventRequest {
    #[serde(alias = "eventType")]
    #[validate(length(min = 1, max = 64, message = "event_type must be 1-64 characters"))]
    pub(crate) event_type: String,
    pub(crate) severity: ProctorSeverity,
    #[serde(default, alias = "riskScore")]
    #[validate(range(min = 0.0, max = 100.0, message = "risk_score must be between 0 and 100"))]
    pub(crate) risk_score: f64,
    #[serde(default)]
    pub(crate) metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProctorEventResponse {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) attempt_id: String,
    pub(crate) event_type: String,
    pub(crate) severity: ProctorSeverity,
    pub(crate) risk_score: f64,
    pub(crate) occurred_at: String,
}

impl From<ProctorEvent> for ProctorEventResponse {
    fn from(event: ProctorEvent) -> Self {
        Self {
            id: event.id,
            session_id: event.session_id,
            attempt_id: event.attempt_id,
            event_type: event.event_type,
            severity: event.severity,
            risk_score: event.risk_score,
            occurred_at: format_primitive(event.occurred_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProctorAction {
    Dismiss,
    Terminate,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProctorDecisionRequest {
    pub(crate) action: ProctorAction,
    #[validate(length(min = 1, max = 1000, message = "reason must not be empty"))]
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProctorDecisionResponse {
    pub(crate) attempt_id: String,
    pub(crate) action: ProctorAction,
    pub(crate) status: AttemptStatus,
}
