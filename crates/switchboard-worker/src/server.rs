// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent Worker HTTP server built on axum.
//!
//! Two intake paths converge on the same turn processor: `POST /process`
//! for the direct-HTTP transport, and `POST /events` for broker-delivered
//! `request.created` events (with the per-component atomic claim guarding
//! at-least-once redelivery).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use switchboard_core::envelope::event_types;
use switchboard_core::{NormalizedRequest, SwitchboardError};
use switchboard_store::queries::deliveries;
use switchboard_transport::broker::ce_headers;
use switchboard_transport::decode_binary;
use tracing::{info, warn};

use crate::service::{process_request, WorkerState};

/// Claim component name used in the event claim table.
const CLAIM_COMPONENT: &str = "worker";

/// Builds the worker's route table.
pub fn app(state: WorkerState) -> Router {
    Router::new()
        .route("/process", post(handle_process))
        .route("/events", post(handle_event))
        .route("/agents", get(handle_agents))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Binds and serves until the listener fails.
pub async fn serve(addr: &str, state: WorkerState) -> Result<(), SwitchboardError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("failed to bind worker to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!(addr, "agent worker listening");
    axum::serve(listener, app(state))
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("worker server error: {e}"),
            source: Some(Box::new(e)),
        })
}

fn error_response(err: SwitchboardError) -> Response {
    let status = match &err {
        SwitchboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
        SwitchboardError::Conflict(_) => StatusCode::CONFLICT,
        SwitchboardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        SwitchboardError::Storage { .. } | SwitchboardError::Unavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.code() }))).into_response()
}

/// Direct-HTTP entry: process synchronously and return the response.
async fn handle_process(
    State(state): State<WorkerState>,
    Json(request): Json<NormalizedRequest>,
) -> Response {
    match process_request(&state, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            warn!(request_id = request.request_id.as_str(), error = %e, "process failed");
            error_response(e)
        }
    }
}

/// Broker intake: consume `request.created` events.
async fn handle_event(
    State(state): State<WorkerState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    let envelope = match decode_binary(
        header(ce_headers::ID),
        header(ce_headers::TYPE),
        header(ce_headers::SOURCE),
        header(ce_headers::SUBJECT),
        header(ce_headers::TIME),
        &body,
    ) {
        Ok(envelope) => envelope,
        Err(e) => return error_response(e),
    };

    if envelope.event_type != event_types::REQUEST_CREATED {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "unhandled event type" })),
        )
            .into_response();
    }

    // At-least-once redelivery: only the claim winner processes.
    match deliveries::claim_event(&state.db, &envelope.id, CLAIM_COMPONENT, &state.instance_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::OK,
                Json(json!({ "status": "skipped", "reason": "duplicate event" })),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    }

    let request: NormalizedRequest = match envelope.decode_data() {
        Ok(request) => request,
        Err(e) => {
            let _ = deliveries::record_event_result(
                &state.db,
                &envelope.id,
                CLAIM_COMPONENT,
                None,
                None,
                "error",
                Some("malformed request.created data"),
            )
            .await;
            return error_response(e);
        }
    };

    let result = process_request(&state, &request).await;
    let (status_label, error_message) = match &result {
        Ok(_) => ("success", None),
        Err(e) => ("error", Some(e.to_string())),
    };
    let _ = deliveries::record_event_result(
        &state.db,
        &envelope.id,
        CLAIM_COMPONENT,
        Some(&request.request_id),
        Some(&request.session_id),
        status_label,
        error_message.as_deref(),
    )
    .await;

    match result {
        Ok(response) => (
            StatusCode::OK,
            Json(json!({ "status": "processed", "request_id": response.request_id })),
        )
            .into_response(),
        Err(e) => {
            warn!(request_id = request.request_id.as_str(), error = %e, "event processing failed");
            error_response(e)
        }
    }
}

/// Agents advertised for routing-directive validation.
async fn handle_agents(State(state): State<WorkerState>) -> Json<serde_json::Value> {
    Json(json!({ "agents": state.agents }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
