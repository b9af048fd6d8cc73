use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use time::Duration;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
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

async fn start(ctx: &TestContext, exam_id: &str, token: &str) -> (StatusCode, Value) {
    call(&ctx.app, Method::POST, &format!("/api/v1/candidate/exams/{exam_id}/start"), token, None)
        .await
}

async fn seed_exam_with_essay(ctx: &TestContext, seed: ExamSeed) -> String {
    let pool = ctx.state.db();
    let exam_id = test_support::insert_exam(pool, &seed).await;
    let section_id = test_support::insert_section(pool, &exam_id, 1, None).await;
    test_support::insert_question(
        pool,
        &exam_id,
        QuestionSeed::choice(&section_id, 1, vec![("a", true), ("b", false)]),
    )
    .await;
    test_support::insert_question(pool, &exam_id, QuestionSeed::essay(&section_id, 2, 4.0)).await;
    exam_id
}

#[tokio::test]
async fn admin_can_add_time_to_running_attempt() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = seed_exam_with_essay(&ctx, ExamSeed::default()).await;

    let candidate = test_support::bearer_token("cand-1", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    let remaining_before = body["data"]["remaining_seconds"].as_i64().expect("remaining");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/add-time",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "extra_minutes": 10, "reason": "network outage" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["extra_time_seconds"], 600);
    let remaining_after = body["data"]["remaining_seconds"].as_i64().expect("remaining");
    assert!(remaining_after > remaining_before + 500);

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/add-time",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "extra_minutes": 0, "reason": "typo" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["errors"][0], "extra_minutes must be between 1 and 480");

    let (status, body) = call(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/exam-operations/attempts/{attempt_id}/events"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let kinds: Vec<&str> = body["data"]
        .as_array()
        .expect("events")
        .iter()
        .filter_map(|event| event["event_type"].as_str())
        .collect();
    assert_eq!(kinds, vec!["started", "time_added"]);

    let audits: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE action = 'attempt.add_time' AND entity_id = $1",
    )
    .bind(&attempt_id)
    .fetch_one(ctx.state.db())
    .await
    .expect("audit count");
    assert_eq!(audits, 1);
}

#[tokio::test]
async fn override_grants_exactly_one_extra_attempt() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = seed_exam_with_essay(&ctx, ExamSeed::default()).await;

    let candidate = test_support::bearer_token("cand-2", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/terminate",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "reason": "left the room" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["status"], "force_submitted");
    assert_eq!(body["data"]["result"]["pending_manual_count"], 1);

    let (status, body) = start(&ctx, &exam_id, &candidate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let grant = json!({ "candidate_id": "cand-2", "exam_id": exam_id, "reason": "proctor error" });
    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/allow-new-attempt",
        &admin,
        Some(grant.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["candidate_id"], "cand-2");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/allow-new-attempt",
        &admin,
        Some(grant),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "An unused attempt override already exists");

    let (status, body) = call(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/candidate/exams/{exam_id}/eligibility"),
        &candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["can_start_now"], true);
    assert_eq!(body["data"]["override_available"], true);

    let (status, body) = start(&ctx, &exam_id, &candidate).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["attempt_number"], 2);
    let second_attempt = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();

    let (status, _) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/attempts/{second_attempt}/submit"),
        &candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = start(&ctx, &exam_id, &candidate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let used: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM admin_attempt_overrides WHERE is_used AND used_by_attempt_id = $1",
    )
    .bind(&second_attempt)
    .fetch_one(ctx.state.db())
    .await
    .expect("override count");
    assert_eq!(used, 1);
}

#[tokio::test]
async fn staff_status_view_reports_lapse_without_writing() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = seed_exam_with_essay(&ctx, ExamSeed::default()).await;

    let candidate = test_support::bearer_token("cand-3", UserRole::Candidate, ctx.state.settings());
    let proctor = test_support::bearer_token("proctor-1", UserRole::Proctor, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    test_support::set_expires_at(
        ctx.state.db(),
        &attempt_id,
        primitive_now_utc() - Duration::minutes(1),
    )
    .await;

    let (status, body) = call(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/exam-operations/attempts/{attempt_id}"),
        &proctor,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["status"], "started");
    assert_eq!(body["data"]["effective_status"], "expired");
    assert_eq!(body["data"]["remaining_seconds"], 0);

    let results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE attempt_id = $1")
        .bind(&attempt_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("result count");
    assert_eq!(results, 0);
}

#[tokio::test]
async fn publishing_reveals_scores_to_the_candidate() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let exam_id = test_support::insert_exam(pool, &ExamSeed::default()).await;
    let section_id = test_support::insert_section(pool, &exam_id, 1, None).await;
    let question = test_support::insert_question(
        pool,
        &exam_id,
        QuestionSeed::choice(&section_id, 1, vec![("a", true), ("b", false)]),
    )
    .await;

    let candidate = test_support::bearer_token("cand-4", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/attempts/{attempt_id}/answers"),
        &candidate,
        Some(json!({ "question_id": question, "selected_option_ids": ["a"] })),
    )
    .await;

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/attempts/{attempt_id}/submit"),
        &candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["results_visible"], false);
    assert!(body["data"]["total_score"].is_null());

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/exam-operations/results/{attempt_id}/publish"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["is_published"], true);

    let (status, body) = call(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/candidate/attempts/{attempt_id}/result"),
        &candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["results_visible"], true);
    assert_eq!(body["data"]["total_score"], 1.0);
}

#[tokio::test]
async fn admin_can_pause_and_resume_running_attempt() {
    let ctx = test_support::setup_test_context().await;
    let exam_id = seed_exam_with_essay(&ctx, ExamSeed::default()).await;

    let candidate = test_support::bearer_token("cand-5", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    let request = json!({ "attempt_id": attempt_id, "reason": "fire alarm" });

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/pause",
        &admin,
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let (status, _) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/attempts/{attempt_id}/enter"),
        &candidate,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/pause",
        &candidate,
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/pause",
        &admin,
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["message"], "Attempt paused");
    assert_eq!(body["data"]["status"], "paused");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/resume",
        &admin,
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, body) = call(
        &ctx.app,
        Method::GET,
        &format!("/api/v1/exam-operations/attempts/{attempt_id}/events"),
        &admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let events = body["data"].as_array().expect("events");
    let kinds: Vec<&str> =
        events.iter().filter_map(|event| event["event_type"].as_str()).collect();
    assert_eq!(kinds, vec!["started", "entered", "paused", "admin_resumed"]);
    assert_eq!(events[2]["actor_id"], "admin-1");
    assert_eq!(events[2]["reason"], "fire alarm");

    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM audit_logs WHERE entity_id = $1 ORDER BY created_at, action",
    )
    .bind(&attempt_id)
    .fetch_all(ctx.state.db())
    .await
    .expect("audit actions");
    assert_eq!(actions, vec!["attempt.pause", "attempt.resume"]);
}

#[tokio::test]
async fn finished_attempts_reject_admin_changes_and_answer_writes() {
    let ctx = test_support::setup_test_context().await;
    let pool = ctx.state.db();
    let exam_id = test_support::insert_exam(pool, &ExamSeed::default()).await;
    let section_id = test_support::insert_section(pool, &exam_id, 1, None).await;
    let question = test_support::insert_question(
        pool,
        &exam_id,
        QuestionSeed::choice(&section_id, 1, vec![("a", true), ("b", false)]),
    )
    .await;

    let candidate = test_support::bearer_token("cand-6", UserRole::Candidate, ctx.state.settings());
    let other = test_support::bearer_token("cand-7", UserRole::Candidate, ctx.state.settings());
    let admin = test_support::bearer_token("admin-1", UserRole::Admin, ctx.state.settings());

    let (_, body) = start(&ctx, &exam_id, &candidate).await;
    let attempt_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    let answers_uri = format!("/api/v1/candidate/attempts/{attempt_id}/answers");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &answers_uri,
        &candidate,
        Some(json!({ "question_id": question, "selected_option_ids": ["a"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/terminate",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "reason": "phone on desk" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    let expires_before: String =
        sqlx::query_scalar("SELECT expires_at::text FROM attempts WHERE id = $1")
            .bind(&attempt_id)
            .fetch_one(pool)
            .await
            .expect("expires_at");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/add-time",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "extra_minutes": 15, "reason": "late request" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Cannot add time to an attempt that is force_submitted");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/terminate",
        &admin,
        Some(json!({ "attempt_id": attempt_id, "reason": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Cannot terminate an attempt that is force_submitted");

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        &answers_uri,
        &candidate,
        Some(json!({ "question_id": question, "selected_option_ids": ["b"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Attempt is not active");

    let expires_after: String =
        sqlx::query_scalar("SELECT expires_at::text FROM attempts WHERE id = $1")
            .bind(&attempt_id)
            .fetch_one(pool)
            .await
            .expect("expires_at");
    assert_eq!(expires_after, expires_before);

    let stored: Value = sqlx::query_scalar(
        "SELECT selected_option_ids FROM attempt_answers WHERE attempt_id = $1 AND question_id = $2",
    )
    .bind(&attempt_id)
    .bind(&question)
    .fetch_one(pool)
    .await
    .expect("stored answer");
    assert_eq!(stored, json!(["a"]));

    let (_, body) = start(&ctx, &exam_id, &other).await;
    let submitted_id = body["data"]["attempt_id"].as_str().expect("attempt id").to_string();
    let (status, _) = call(
        &ctx.app,
        Method::POST,
        &format!("/api/v1/candidate/attempts/{submitted_id}/submit"),
        &other,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &ctx.app,
        Method::POST,
        "/api/v1/exam-operations/add-time",
        &admin,
        Some(json!({ "attempt_id": submitted_id, "extra_minutes": 5, "reason": "late request" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["message"], "Cannot add time to an attempt that is submitted");
}
