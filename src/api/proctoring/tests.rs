use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::test_support::{self, ExamSeed, QuestionSeed, TestContext};

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn start_proctored_attempt(ctx: &TestContext, candidate: &str) -> String {
    let pool = ctx.state.db();
    let exam_id = test_support::insert_exam(
        pool,
        &ExamSeed { proctoring_enabled: true, ..ExamSeed::default() },
    )
    .await;
    let section_id = test_support::insert_section(pool, &exam_id, 1, None).await;
    test_support::insert_question(pool, &exam_id, QuestionSeed::essay(&section_id, 1, 10.0)).await;

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/exams/{exam_id}/start"),
        candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    body["data"]["attempt_id"].as_str().expect("attempt id").to_string()
}

#[tokio::test]
async fn proctor_can_flag_and_terminate_attempt() {
    let ctx = test_support::setup_test_context().await;
    let candidate = test_support::bearer_token("cand-1", UserRole::Candidate, ctx.state.settings());
    let proctor = test_support::bearer_token("proctor-1", UserRole::Proctor, ctx.state.settings());
    let attempt_id = start_proctored_attempt(&ctx, &candidate).await;

    let events_uri = format!("/api/v1/proctoring/attempts/{attempt_id}/events");
    let signal = json!({
        "event_type": "face_missing",
        "severity": "high",
        "risk_score": 87.5,
        "metadata": { "camera": "front" }
    });

    let (status, _) =
        call(&ctx.app, Method::POST, &events_uri, &candidate, Some(signal.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&ctx.app, Method::POST, &events_uri, &proctor, Some(signal)).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["data"]["severity"], "high");
    assert_eq!(body["data"]["event_type"], "face_missing");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &events_uri,
        &proctor,
        Some(json!({ "event_type": "tab_switch", "severity": "low", "risk_score": 140.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let decision_uri = format!("/api/v1/proctoring/attempts/{attempt_id}/decision");
    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &decision_uri,
        &proctor,
        Some(json!({ "action": "dismiss", "reason": "lighting glitch" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["status"], "started");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &decision_uri,
        &proctor,
        Some(json!({ "action": "terminate", "reason": "second person in frame" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["action"], "terminate");
    assert_eq!(body["data"]["status"], "force_submitted");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &events_uri,
        &proctor,
        Some(json!({ "event_type": "tab_switch", "severity": "low" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Attempt is not active");

    let pool = ctx.state.db();
    let session_status: String =
        sqlx::query_scalar("SELECT status::text FROM proctor_sessions WHERE attempt_id = $1")
            .bind(&attempt_id)
            .fetch_one(pool)
            .await
            .expect("proctor session");
    assert_eq!(session_status, "closed");

    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM audit_logs WHERE entity_id = $1 ORDER BY created_at, action",
    )
    .bind(&attempt_id)
    .fetch_all(pool)
    .await
    .expect("audit actions");
    assert_eq!(actions, vec!["proctoring.dismiss", "attempt.proctor_terminate"]);

    let terminated: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempt_events
         WHERE attempt_id = $1 AND event_type = 'proctor_terminated'",
    )
    .bind(&attempt_id)
    .fetch_one(pool)
    .await
    .expect("terminate events");
    assert_eq!(terminated, 1);
}

#[tokio::test]
async fn events_require_an_active_proctoring_session() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let exam_id = test_support::insert_exam(pool, &ExamSeed::default()).await;
    let section_id = test_support::insert_section(pool, &exam_id, 1, None).await;
    test_support::insert_question(pool, &exam_id, QuestionSeed::essay(&section_id, 1, 2.0)).await;

    let candidate = test_support::bearer_token("cand-2", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/exams/{exam_id}/start"),
        &candidate,
        None,
    )
    .await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/proctoring/attempts/{attempt_id}/events"),
        &admin,
        Some(json!({ "event_type": "noise", "severity": "medium" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Attempt has no active proctoring session");
}
