use sqlx::PgConnection;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::types::ProctorSeverity;
use crate::repositories;
use crate::schemas::proctoring::{
    ProctorAction, ProctorDecisionResponse, ProctorEventRequest, ProctorEventResponse,
};
use crate::services::{attempt_control, attempt_state, Actor, AttemptError};

/// Appends a proctoring signal to the attempt's active session.
pub(crate) async fn record_event(
    conn: &mut PgConnection,
    proctor: &Actor,
    attempt_id: &str,
    event: ProctorEventRequest,
    now: PrimitiveDateTime,
) -> Result<ProctorEventResponse, AttemptError> {
    let attempt = repositories::attempts::find_live(&mut *conn, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound("attempt"))?;
    if !attempt_state::effective_status(attempt.status, now, attempt.expires_at).is_active() {
        return Err(AttemptError::AttemptNotActive);
    }

    let session = repositories::proctoring::find_active(&mut *conn, &attempt.id)
        .await?
        .ok_or_else(|| AttemptError::invalid_state("attempt has no active proctoring session"))?;

    let metadata = match event.metadata {
        serde_json::Value::Null => serde_json::json!({}),
        other => other,
    };
    let stored = repositories::proctoring::append_event(
        &mut *conn,
        repositories::proctoring::NewProctorEvent {
            id: &Uuid::new_v4().to_string(),
            session_id: &session.id,
            attempt_id: &attempt.id,
            event_type: event.event_type.trim(),
            severity: event.severity,
            risk_score: event.risk_score,
            metadata,
            occurred_at: now,
        },
    )
    .await?;

    if event.severity == ProctorSeverity::High {
        tracing::warn!(
            attempt_id = %attempt.id,
            proctor_id = %proctor.id,
            event_type = %stored.event_type,
            risk_score = stored.risk_score,
            "High severity proctoring event"
        );
    } else {
        tracing::debug!(
            attempt_id = %attempt.id,
            event_type = %stored.event_type,
            risk_score = stored.risk_score,
            "Proctoring event recorded"
        );
    }

    Ok(stored.into())
}

/// Dismissals are only audited; terminations force-submit the attempt.
pub(crate) async fn decide(
    conn: &mut PgConnection,
    proctor: &Actor,
    attempt_id: &str,
    action: ProctorAction,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<ProctorDecisionResponse, AttemptError> {
    match action {
        ProctorAction::Terminate => {
            let terminated =
                attempt_control::terminate(conn, proctor, attempt_id, reason, true, now).await?;
            Ok(ProctorDecisionResponse {
                attempt_id: terminated.attempt_id,
                action,
                status: terminated.status,
            })
        }
        ProctorAction::Dismiss => {
            let attempt = repositories::attempts::find_live(&mut *conn, attempt_id)
                .await?
                .ok_or(AttemptError::NotFound("attempt"))?;
            attempt_control::record_audit(
                conn,
                proctor,
                "proctoring.dismiss",
                "attempt",
                &attempt.id,
                serde_json::json!({ "reason": reason }),
                now,
            )
            .await?;
            tracing::info!(attempt_id = %attempt.id, proctor_id = %proctor.id, "Proctoring flag dismissed");

            Ok(ProctorDecisionResponse {
                attempt_id: attempt.id,
                action,
                status: attempt_state::effective_status(attempt.status, now, attempt.expires_at),
            })
        }
    }
}
