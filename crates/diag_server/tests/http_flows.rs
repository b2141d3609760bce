//! HTTP-level integration tests for the diagnostics server.
//!
//! The router runs over the in-memory stores, so these prove the full HTTP
//! contract (routing, identity headers, error mapping, JSON shapes) without
//! a database.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use tower::ServiceExt;

use diag_core::memory::MemStores;
use diag_core::{DiagService, DiagServiceImpl};
use diag_server::router::build_router;

fn build_test_app() -> (axum::Router, MemStores) {
    let stores = MemStores::new();
    let service: Arc<dyn DiagService> = Arc::new(DiagServiceImpl::new(
        stores.assessments.clone(),
        stores.snapshots.clone(),
        stores.classrooms.clone(),
        stores.audit.clone(),
    ));
    (build_router(service), stores)
}

fn consultant_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-actor-id", "consultant-1")
        .header("x-actor-role", "consultant")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn anon_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

fn respondent_payload() -> serde_json::Value {
    serde_json::json!({
        "respondent_name": "Maria",
        "respondent_email": "maria@prefeitura.example",
        "consent": true,
        "axes": [{
            "axis_key": "governance_planning",
            "positive": {
                "checklist": ["annual procurement plan exists"],
                "narrative": "planning is consistent",
                "score": 5
            },
            "negative": { "score": 4 },
            "solution": { "score": 3 }
        }]
    })
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = build_test_app();
    let (status, body) = send(&app, anon_request("GET", "/health", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn classroom_creation_requires_consultant_role() {
    let (app, _) = build_test_app();
    let (status, body) = send(
        &app,
        anon_request(
            "POST",
            "/classrooms",
            serde_json::json!({ "subject_id": "2600054" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "forbidden");
}

/// Classroom end-to-end: open a room, join anonymously, save through the
/// room credentials, submit, and read the version history back.
#[tokio::test]
async fn classroom_flow_from_join_to_submitted_snapshot() {
    let (app, stores) = build_test_app();

    let (status, room) = send(
        &app,
        consultant_request(
            "POST",
            "/classrooms",
            serde_json::json!({ "subject_id": "2600054", "with_token": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = room["code"].as_str().expect("room code").to_string();
    let token = room["token"].as_str().expect("room token").to_string();
    assert_eq!(code.len(), 6);

    let (status, joined) = send(
        &app,
        anon_request(
            "POST",
            "/classrooms/join",
            serde_json::json!({
                "code": code.to_lowercase(),
                "token": token,
                "name": "Maria",
                "email": "maria@prefeitura.example"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["subject_id"], "2600054");
    let session_id = joined["session_id"].as_str().expect("session id").to_string();

    let mut save = respondent_payload();
    save["classroom_code"] = serde_json::json!(code);
    save["classroom_token"] = serde_json::json!(token);
    let (status, saved) = send(&app, anon_request("POST", "/assessments", save)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["conflict_detected"], false);
    let assessment_id = saved["id"].as_str().expect("assessment id").to_string();

    let (status, submitted) = send(
        &app,
        anon_request(
            "POST",
            &format!("/assessments/{assessment_id}/submit"),
            serde_json::json!({
                "classroom_code": code,
                "classroom_token": token
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["versions"][0]["label"], "T0");
    assert_eq!(submitted["versions"][0]["version_number"], 1);

    let (status, versions) = send(
        &app,
        anon_request(
            "GET",
            &format!("/assessments/{assessment_id}/versions"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(versions["versions"].as_array().map(Vec::len), Some(1));

    // The room poll sees the joined participant and the linked assessment.
    let (status, overview) = send(
        &app,
        anon_request(
            "GET",
            &format!("/classrooms/{session_id}"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["code"], code);
    assert_eq!(overview["participant_count"], 1);
    assert_eq!(overview["assessment_count"], 1);

    // The whole path left an audit trail.
    let actions = stores.audit.actions().await;
    assert!(actions.contains(&"JOIN_SUCCESS".to_string()));
    assert!(actions.contains(&"SUBMIT".to_string()));
}

/// Review round trip: consultant takes a submitted assessment into review,
/// returns it, and the respondent can edit again.
#[tokio::test]
async fn review_return_reopens_respondent_editing() {
    let (app, _) = build_test_app();

    let (status, saved) =
        send(&app, anon_request("POST", "/assessments", {
            let mut p = respondent_payload();
            p["subject_id"] = serde_json::json!("3106200");
            p
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = saved["id"].as_str().expect("assessment id").to_string();

    let (status, _) = send(
        &app,
        anon_request(
            "POST",
            &format!("/assessments/{id}/submit"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Respondent fields are frozen while submitted.
    let mut frozen = respondent_payload();
    frozen["subject_id"] = serde_json::json!("3106200");
    frozen["assessment_id"] = serde_json::json!(id);
    let (status, body) = send(&app, anon_request("POST", "/assessments", frozen)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "forbidden");

    // Anonymous callers cannot use the consultant surface.
    let (status, _) = send(
        &app,
        anon_request(
            "PATCH",
            &format!("/assessments/{id}/consultant"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, reviewed) = send(
        &app,
        consultant_request(
            "PATCH",
            &format!("/assessments/{id}/consultant"),
            serde_json::json!({
                "scores": [{ "axis_key": "governance_planning", "positive": 8 }],
                "analyses": [{
                    "axis_key": "governance_planning",
                    "positive_note": "strong procurement practice"
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "in_review");

    let (status, returned) = send(
        &app,
        consultant_request(
            "PATCH",
            &format!("/assessments/{id}/consultant"),
            serde_json::json!({ "status": "returned" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");

    // Returned reopens the respondent surface.
    let mut reopened = respondent_payload();
    reopened["subject_id"] = serde_json::json!("3106200");
    reopened["assessment_id"] = serde_json::json!(id);
    reopened["axes"][0]["positive"]["score"] = serde_json::json!(7);
    // The client last saw version 1 (its own submit); two consultant
    // snapshots landed since, so the save is flagged stale but still applies.
    reopened["base_version_number"] = serde_json::json!(1);
    let (status, outcome) = send(&app, anon_request("POST", "/assessments", reopened)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["conflict_detected"], true);

    // Consultant override survives the respondent edit.
    let (status, record) = send(
        &app,
        anon_request("GET", &format!("/assessments/{id}"), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["axes"][0]["positive"]["consultant_score"], 8);
    assert_eq!(record["axes"][0]["positive"]["score"], 7);
}

#[tokio::test]
async fn milestone_and_compare_round_trip() {
    let (app, _) = build_test_app();

    let (_, saved) = send(&app, anon_request("POST", "/assessments", {
        let mut p = respondent_payload();
        p["subject_id"] = serde_json::json!("2600054");
        p
    }))
    .await;
    let id = saved["id"].as_str().expect("assessment id").to_string();
    send(
        &app,
        anon_request(
            "POST",
            &format!("/assessments/{id}/submit"),
            serde_json::json!({}),
        ),
    )
    .await;

    // Anonymous milestone attempt is denied.
    let (status, _) = send(
        &app,
        anon_request(
            "POST",
            &format!("/assessments/{id}/milestone"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, consultant_pass) = send(
        &app,
        consultant_request(
            "PATCH",
            &format!("/assessments/{id}/consultant"),
            serde_json::json!({
                "scores": [{
                    "axis_key": "governance_planning",
                    "positive": 8, "negative": 7, "solution": 6
                }]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(consultant_pass["current_version_number"], 2);

    let (status, milestone) = send(
        &app,
        consultant_request(
            "POST",
            &format!("/assessments/{id}/milestone"),
            serde_json::json!({ "label": "After first cycle" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(milestone["label"], "After first cycle");
    assert_eq!(milestone["version_number"], 3);

    let (_, versions) = send(
        &app,
        anon_request(
            "GET",
            &format!("/assessments/{id}/versions"),
            serde_json::json!({}),
        ),
    )
    .await;
    let list = versions["versions"].as_array().expect("versions");
    assert_eq!(list.len(), 3);
    let from = list[0]["snapshot_id"].as_str().expect("from id");
    let to = list[1]["snapshot_id"].as_str().expect("to id");

    let (status, report) = send(
        &app,
        anon_request(
            "GET",
            &format!("/assessments/{id}/compare?from={from}&to={to}"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // T0 averages the respondent scores (5+4+3)/3 = 4.0; the consultant pass
    // overrides all three blocks to (8+7+6)/3 = 7.0.
    assert_eq!(report["axes"][0]["score_a"], 4.0);
    assert_eq!(report["axes"][0]["score_b"], 7.0);
    assert_eq!(report["axes"][0]["delta"], 3.0);
    assert_eq!(report["aggregate_delta"], 3.0);
}

#[tokio::test]
async fn join_failures_map_to_status_codes() {
    let (app, _) = build_test_app();

    // Unknown room.
    let (status, body) = send(
        &app,
        anon_request(
            "POST",
            "/classrooms/join",
            serde_json::json!({ "code": "ZZZZ99" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "not_found");

    // No code and no session id.
    let (status, body) = send(
        &app,
        anon_request("POST", "/classrooms/join", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "validation_failed");

    // Closed room.
    let (_, room) = send(
        &app,
        consultant_request(
            "POST",
            "/classrooms",
            serde_json::json!({ "subject_id": "2600054" }),
        ),
    )
    .await;
    let session_id = room["session_id"].as_str().expect("session id");
    let code = room["code"].as_str().expect("code");
    let (status, _) = send(
        &app,
        consultant_request(
            "POST",
            &format!("/classrooms/close/{session_id}"),
            serde_json::json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        anon_request(
            "POST",
            "/classrooms/join",
            serde_json::json!({ "code": code }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "status_blocked");
}

#[tokio::test]
async fn submit_with_half_a_credential_pair_is_unauthorized() {
    let (app, _) = build_test_app();

    let (_, room) = send(
        &app,
        consultant_request(
            "POST",
            "/classrooms",
            serde_json::json!({ "subject_id": "2600054", "with_token": true }),
        ),
    )
    .await;
    let code = room["code"].as_str().expect("code").to_string();
    let token = room["token"].as_str().expect("token").to_string();

    let mut save = respondent_payload();
    save["classroom_code"] = serde_json::json!(code);
    save["classroom_token"] = serde_json::json!(token);
    let (_, saved) = send(&app, anon_request("POST", "/assessments", save)).await;
    let id = saved["id"].as_str().expect("assessment id").to_string();

    let (status, body) = send(
        &app,
        anon_request(
            "POST",
            &format!("/assessments/{id}/submit"),
            serde_json::json!({ "classroom_code": code }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "credential_missing");
}
