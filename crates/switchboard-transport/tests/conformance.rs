// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strategy conformance matrix.
//!
//! Runs a fixed request trace through the broker and direct-HTTP
//! strategies and asserts the two produce identical observable outcomes:
//! the same store rows (ignoring transport event ids) and the same awaited
//! responses.

use std::time::Duration;

use chrono::Utc;
use serde_json::Map;
use switchboard_core::{
    envelope::sources, CompletedResponse, NormalizedRequest, SurfaceHandles, SurfaceKind,
    SwitchboardError, Transport,
};
use switchboard_store::queries::{requests, sessions};
use switchboard_store::Database;
use switchboard_transport::{BrokerTransport, DirectTransport};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    db: Database,
    _dir: tempfile::TempDir,
    session_id: String,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("t.db").to_str().unwrap())
        .await
        .unwrap();
    let (session, _) = sessions::get_or_create_session(
        &db,
        "alice",
        SurfaceKind::Web,
        &SurfaceHandles::default(),
        30,
        &Map::new(),
    )
    .await
    .unwrap();
    Fixture {
        db,
        _dir: dir,
        session_id: session.id,
    }
}

fn request(session_id: &str) -> NormalizedRequest {
    NormalizedRequest {
        request_id: "req-trace-1".into(),
        session_id: session_id.into(),
        user_id: "alice".into(),
        surface: SurfaceKind::Web,
        handles: SurfaceHandles::default(),
        content: "hello".into(),
        target_agent_id: None,
        forced_integration: None,
        created_at: Utc::now(),
        integration_context: Map::new(),
    }
}

fn response(session_id: &str) -> CompletedResponse {
    CompletedResponse {
        request_id: "req-trace-1".into(),
        session_id: session_id.into(),
        user_id: "alice".into(),
        agent_id: "routing-agent".into(),
        content: "hi alice".into(),
        metadata: Map::new(),
        processing_time_ms: 7,
        completed_at: Utc::now(),
    }
}

/// Runs the shared trace: append log, send request, complete the log (as
/// the worker would), await the response, publish it. Returns the awaited
/// response and the final log row.
async fn run_trace(
    fx: &Fixture,
    transport: &dyn Transport,
) -> (CompletedResponse, switchboard_store::RequestLogRecord) {
    let req = request(&fx.session_id);
    requests::append_log(&fx.db, &req).await.unwrap();

    transport.send_request(&req).await.unwrap();

    requests::complete_log(&fx.db, &response(&fx.session_id), None, None)
        .await
        .unwrap();

    let awaited = transport
        .await_response("req-trace-1", Duration::from_secs(2))
        .await
        .unwrap();

    transport.publish_response(&awaited).await.unwrap();

    let log = requests::get_log(&fx.db, "req-trace-1").await.unwrap().unwrap();
    (awaited, log)
}

async fn broker_transport(db: Database, server: &MockServer) -> BrokerTransport {
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
    BrokerTransport::new(server.uri(), db, Duration::from_millis(20))
        .unwrap()
        .with_source(sources::ROUTER)
}

async fn direct_transport(db: Database, server: &MockServer) -> DirectTransport {
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    DirectTransport::new(
        server.uri(),
        server.uri(),
        db,
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn both_strategies_produce_identical_outcomes() {
    let broker_fx = fixture().await;
    let broker_server = MockServer::start().await;
    let broker = broker_transport(broker_fx.db.clone(), &broker_server).await;
    let (broker_response, broker_log) = run_trace(&broker_fx, &broker).await;

    let direct_fx = fixture().await;
    let direct_server = MockServer::start().await;
    let direct = direct_transport(direct_fx.db.clone(), &direct_server).await;
    let (direct_response, direct_log) = run_trace(&direct_fx, &direct).await;

    // Awaited responses are identical apart from wall-clock fields.
    assert_eq!(broker_response.request_id, direct_response.request_id);
    assert_eq!(broker_response.content, direct_response.content);
    assert_eq!(broker_response.agent_id, direct_response.agent_id);
    assert_eq!(broker_response.user_id, direct_response.user_id);
    assert_eq!(
        broker_response.processing_time_ms,
        direct_response.processing_time_ms
    );

    // Log rows match, ignoring the event id columns the broker path may set
    // and the session/timestamp fields that differ per fixture.
    assert_eq!(broker_log.status, direct_log.status);
    assert_eq!(broker_log.status, "completed");
    assert_eq!(broker_log.content, direct_log.content);
    assert_eq!(broker_log.response_content, direct_log.response_content);
    assert_eq!(broker_log.agent_id, direct_log.agent_id);
    assert_eq!(broker_log.surface, direct_log.surface);
}

#[tokio::test]
async fn broker_send_publishes_one_request_created_event() {
    let fx = fixture().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(wiremock::matchers::header(
            "ce-type",
            "com.switchboard.request.created",
        ))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let transport = BrokerTransport::new(server.uri(), fx.db.clone(), Duration::from_millis(20))
        .unwrap()
        .with_source(sources::ROUTER);

    let req = request(&fx.session_id);
    requests::append_log(&fx.db, &req).await.unwrap();
    transport.send_request(&req).await.unwrap();
}

#[tokio::test]
async fn direct_send_surfaces_worker_failures() {
    let fx = fixture().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = DirectTransport::new(
        server.uri(),
        server.uri(),
        fx.db.clone(),
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap();

    let result = transport.send_request(&request(&fx.session_id)).await;
    assert!(matches!(result, Err(SwitchboardError::Transport { .. })));
}

#[tokio::test]
async fn timeout_is_identical_across_strategies() {
    for use_broker in [true, false] {
        let fx = fixture().await;
        let server = MockServer::start().await;
        let transport: Box<dyn Transport> = if use_broker {
            Box::new(broker_transport(fx.db.clone(), &server).await)
        } else {
            Box::new(direct_transport(fx.db.clone(), &server).await)
        };

        let req = request(&fx.session_id);
        requests::append_log(&fx.db, &req).await.unwrap();
        transport.send_request(&req).await.unwrap();

        // No worker completes the log: both strategies must time out.
        let result = transport
            .await_response("req-trace-1", Duration::from_millis(80))
            .await;
        assert!(matches!(result, Err(SwitchboardError::Timeout { .. })));
    }
}
