// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the full control plane.
//!
//! The harness wires router, worker, and dispatcher in one process over a
//! temp database, with a scripted runtime and recording delivery sinks;
//! the router is exercised over real HTTP on an ephemeral port.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use switchboard_core::IntegrationKind;
use switchboard_store::queries::sessions;
use switchboard_test_utils::TestHarness;

const SIGNING_SECRET: &str = "e2e-signing-secret";

fn chat_signature(timestamp: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SIGNING_SECRET.as_bytes()).unwrap();
    mac.update(format!("v0:{timestamp}:{body}").as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn now_epoch() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string()
}

/// Polls until the recorded deliveries for a kind reach `count`.
async fn wait_for_deliveries(
    harness: &TestHarness,
    kind: IntegrationKind,
    count: usize,
) -> Vec<switchboard_test_utils::RecordedDelivery> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let recorded = harness.recorded(kind);
        if recorded.len() >= count {
            return recorded;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {count} {kind} deliveries (got {})",
            recorded.len()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn web_sync_happy_path() {
    let harness = TestHarness::builder()
        .with_web_key("KEY_ALICE", "alice")
        .with_mock_replies(vec!["Hello Alice, how can I help?"])
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/v1/requests/web"))
        .bearer_auth("KEY_ALICE")
        .json(&json!({ "user_id": "alice", "content": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(!body["session_id"].as_str().unwrap().is_empty());
    assert!(!body["request_id"].as_str().unwrap().is_empty());
    assert_eq!(body["content"], "Hello Alice, how can I help?");
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn tool_trigger_delivers_to_configured_webhook() {
    let harness = TestHarness::builder()
        .with_tool_key("TOOL_KEY_SNOW", "svc-snow")
        .with_mock_replies(vec!["Refresh ticket opened."])
        .record_kind(IntegrationKind::Webhook)
        .with_user_integration(
            "svc-snow",
            IntegrationKind::Webhook,
            r#"{"url":"https://hooks.example.com/snow"}"#,
            0,
            3,
            30,
        )
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/v1/requests/tool"))
        .header("X-API-Key", "TOOL_KEY_SNOW")
        .json(&json!({
            "user_id": "svc-snow",
            "content": "laptop refresh",
            "tool_id": "snow",
            "trigger_event": "asset.refresh.due"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 202);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["status"], "accepted");
    let request_id = ack["request_id"].as_str().unwrap().to_string();

    let deliveries = wait_for_deliveries(&harness, IntegrationKind::Webhook, 1).await;
    assert_eq!(deliveries[0].payload.request_id, request_id);
    assert_eq!(deliveries[0].payload.user_id, "svc-snow");
    assert_eq!(deliveries[0].payload.body, "Refresh ticket opened.");
}

#[tokio::test]
async fn chat_signed_event_is_acked_and_delivered_to_thread() {
    let harness = TestHarness::builder()
        .with_signing_secret(SIGNING_SECRET)
        .with_mock_replies(vec!["On it!"])
        .record_kind(IntegrationKind::Chat)
        .with_user_integration("U7", IntegrationKind::Chat, r#"{"channel":"C1"}"#, 0, 3, 30)
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    let body = json!({
        "type": "event_callback",
        "team_id": "W1",
        "event": {
            "type": "message",
            "user": "U7",
            "text": "help me with my laptop",
            "channel": "C1",
            "ts": "1700000000.000100"
        }
    })
    .to_string();
    let timestamp = now_epoch();

    let started = std::time::Instant::now();
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/v1/requests/chat_event"))
        .header("X-Signature", chat_signature(&timestamp, &body))
        .header("X-Timestamp", timestamp)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(3), "chat ack must be fast");

    let deliveries = wait_for_deliveries(&harness, IntegrationKind::Chat, 1).await;
    assert_eq!(deliveries[0].payload.body, "On it!");
    // The originating thread travels with the payload for threaded replies.
    assert_eq!(
        deliveries[0].payload.metadata.get("thread_id").unwrap(),
        "1700000000.000100"
    );
}

#[tokio::test]
async fn chat_event_with_bad_signature_is_rejected() {
    let harness = TestHarness::builder()
        .with_signing_secret(SIGNING_SECRET)
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    let body = json!({"type": "event_callback"}).to_string();
    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/requests/chat_event"))
        .header("X-Signature", "v0=deadbeef")
        .header("X-Timestamp", now_epoch())
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn auth_failure_creates_no_log_row() {
    let harness = TestHarness::builder()
        .with_web_key("KEY_ALICE", "alice")
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/requests/web"))
        .bearer_auth("WRONG")
        .json(&json!({ "user_id": "alice", "content": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "unauthorized" }));

    let log_rows: i64 = harness
        .db
        .connection()
        .call(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM request_logs", [], |row| row.get(0))?;
            Ok(n)
        })
        .await
        .unwrap();
    assert_eq!(log_rows, 0);
}

#[tokio::test]
async fn second_request_on_in_flight_session_conflicts() {
    let harness = TestHarness::builder()
        .with_web_key("KEY_ALICE", "alice")
        .with_mock_replies(vec!["first"])
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();
    let client = reqwest::Client::new();

    // First turn creates the session.
    let response = client
        .post(format!("{base}/api/v1/requests/web"))
        .bearer_auth("KEY_ALICE")
        .json(&json!({ "user_id": "alice", "content": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let session_id = response.json::<serde_json::Value>().await.unwrap()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Hold the turn lock, as an in-flight request would.
    let _token = sessions::acquire_turn(&harness.db, &session_id).await.unwrap();

    let conflicted = client
        .post(format!("{base}/api/v1/requests/web"))
        .bearer_auth("KEY_ALICE")
        .json(&json!({ "user_id": "alice", "content": "second" }))
        .send()
        .await
        .unwrap();
    assert_eq!(conflicted.status(), 409);
    let body: serde_json::Value = conflicted.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn transient_webhook_failure_retries_to_success() {
    let harness = TestHarness::builder()
        .with_web_key("KEY_BOB", "bob")
        .with_mock_replies(vec!["done"])
        .record_kind(IntegrationKind::Webhook)
        .with_user_integration(
            "bob",
            IntegrationKind::Webhook,
            r#"{"url":"https://hooks.example.com/bob"}"#,
            0,
            3,
            0,
        )
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();

    // The endpoint fails twice, then recovers.
    harness
        .recorder(IntegrationKind::Webhook)
        .unwrap()
        .fail_next(2);

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/requests/web"))
        .bearer_auth("KEY_BOB")
        .json(&json!({ "user_id": "bob", "content": "ship it" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let request_id = response.json::<serde_json::Value>().await.unwrap()["request_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Drain the persistent schedule, as the background sweeper would.
    wait_for_deliveries(&harness, IntegrationKind::Webhook, 1).await;
    switchboard_dispatch::retry::sweep_once(&harness.dispatch_state).await;
    switchboard_dispatch::retry::sweep_once(&harness.dispatch_state).await;

    let attempts = switchboard_store::queries::deliveries::list_attempts(
        &harness.db,
        &request_id,
        IntegrationKind::Webhook,
    )
    .await
    .unwrap();
    let outcomes: Vec<&str> = attempts.iter().map(|a| a.outcome.as_str()).collect();
    assert_eq!(outcomes, vec!["failed", "failed", "success"]);
    let indices: Vec<u32> = attempts.iter().map(|a| a.attempt).collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[tokio::test]
async fn replayed_request_produces_one_delivery() {
    let harness = TestHarness::builder()
        .with_mock_replies(vec!["only once"])
        .record_kind(IntegrationKind::Test)
        .with_user_integration("alice", IntegrationKind::Test, "{}", 0, 3, 30)
        .build()
        .await
        .unwrap();

    // Build one normalized request and deliver it twice, as an
    // at-least-once transport would.
    let (session, _) = sessions::get_or_create_session(
        &harness.db,
        "alice",
        switchboard_core::SurfaceKind::Web,
        &switchboard_core::SurfaceHandles::default(),
        30,
        &serde_json::Map::new(),
    )
    .await
    .unwrap();
    let request = switchboard_core::NormalizedRequest {
        request_id: "replayed-req".into(),
        session_id: session.id,
        user_id: "alice".into(),
        surface: switchboard_core::SurfaceKind::Web,
        handles: switchboard_core::SurfaceHandles::default(),
        content: "hello".into(),
        target_agent_id: None,
        forced_integration: None,
        created_at: chrono::Utc::now(),
        integration_context: serde_json::Map::new(),
    };
    switchboard_store::queries::requests::append_log(&harness.db, &request)
        .await
        .unwrap();

    let first = switchboard_worker::process_request(&harness.worker_state, &request)
        .await
        .unwrap();
    let second = switchboard_worker::process_request(&harness.worker_state, &request)
        .await
        .unwrap();
    assert_eq!(first.content, "only once");
    assert_eq!(second.content, "only once");

    // Exactly one user-visible delivery despite the replay.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.recorded(IntegrationKind::Test).len(), 1);
}

#[tokio::test]
async fn generic_endpoint_is_gated_by_flag() {
    let harness = TestHarness::builder().build().await.unwrap();
    let base = harness.spawn_router().await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{base}/api/v1/requests/generic"))
        .json(&json!({ "user_id": "anyone", "content": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn health_endpoints_expose_no_user_data() {
    let harness = TestHarness::builder()
        .with_web_key("KEY_ALICE", "alice")
        .build()
        .await
        .unwrap();
    let base = harness.spawn_router().await.unwrap();
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let detailed = client
        .get(format!("{base}/health/detailed"))
        .send()
        .await
        .unwrap();
    assert_eq!(detailed.status(), 200);
    let text = detailed.text().await.unwrap();
    assert!(!text.contains("alice"));
    assert!(!text.contains("KEY_ALICE"));
}
