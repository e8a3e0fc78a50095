// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration Dispatcher HTTP server built on axum.
//!
//! Intake endpoints for both transports (`/events` for broker CloudEvents,
//! `/deliver` for direct HTTP), the per-user integration configuration API,
//! the delivery history endpoint, and health.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use switchboard_core::envelope::event_types;
use switchboard_core::{
    CompletedResponse, DeliveryPayload, IntegrationHandler, IntegrationKind, SwitchboardError,
};
use switchboard_store::queries::{deliveries, integrations};
use switchboard_transport::broker::ce_headers;
use switchboard_transport::decode_binary;
use tracing::{info, warn};

use crate::dispatcher::{dispatch_response, DispatchState};

/// Claim component name used in the event claim table.
const CLAIM_COMPONENT: &str = "dispatcher";

/// Builds the dispatcher's route table.
pub fn app(state: DispatchState) -> Router {
    Router::new()
        .route("/events", post(handle_event))
        .route("/deliver", post(handle_direct_delivery))
        .route("/health", get(handle_health))
        .route(
            "/api/v1/users/{user_id}/integrations",
            get(get_user_integrations).post(create_user_integration),
        )
        .route(
            "/api/v1/users/{user_id}/integrations/{kind}",
            put(update_user_integration).delete(delete_user_integration),
        )
        .route("/api/v1/users/{user_id}/deliveries", get(get_user_deliveries))
        .with_state(state)
}

/// Binds and serves until the listener fails.
pub async fn serve(addr: &str, state: DispatchState) -> Result<(), SwitchboardError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("failed to bind dispatcher to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!(addr, "integration dispatcher listening");
    axum::serve(listener, app(state))
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("dispatcher server error: {e}"),
            source: Some(Box::new(e)),
        })
}

fn error_response(err: SwitchboardError) -> Response {
    let status = match &err {
        SwitchboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
        SwitchboardError::Conflict(_) => StatusCode::CONFLICT,
        SwitchboardError::Storage { .. } | SwitchboardError::Unavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.code() }))).into_response()
}

/// Broker intake: consume `response.ready` events with the atomic claim.
async fn handle_event(
    State(state): State<DispatchState>,
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

    if envelope.event_type != event_types::RESPONSE_READY {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "unhandled event type" })),
        )
            .into_response();
    }

    match deliveries::claim_event(&state.db, &envelope.id, CLAIM_COMPONENT, &state.instance_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            info!(event_id = envelope.id.as_str(), "event already claimed, skipping");
            return (
                StatusCode::OK,
                Json(json!({ "status": "skipped", "reason": "duplicate event" })),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    }

    let response: CompletedResponse = match envelope.decode_data() {
        Ok(response) => response,
        Err(e) => {
            let _ = deliveries::record_event_result(
                &state.db,
                &envelope.id,
                CLAIM_COMPONENT,
                None,
                None,
                "error",
                Some("malformed response.ready data"),
            )
            .await;
            return error_response(e);
        }
    };

    let payload = DeliveryPayload::from_response(&response);
    let result = dispatch_response(&state, &payload).await;

    let (label, error_message) = match &result {
        Ok(_) => ("success", None),
        Err(e) => ("error", Some(e.to_string())),
    };
    let _ = deliveries::record_event_result(
        &state.db,
        &envelope.id,
        CLAIM_COMPONENT,
        Some(&response.request_id),
        Some(&response.session_id),
        label,
        error_message.as_deref(),
    )
    .await;

    match result {
        Ok(results) => (
            StatusCode::OK,
            Json(json!({
                "status": "processed",
                "request_id": response.request_id,
                "dispatched_integrations": results.len(),
                "results": results,
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(request_id = response.request_id.as_str(), error = %e, "dispatch failed");
            error_response(e)
        }
    }
}

/// Direct-HTTP intake: the worker posts the completed response here.
async fn handle_direct_delivery(
    State(state): State<DispatchState>,
    Json(response): Json<CompletedResponse>,
) -> Response {
    info!(
        request_id = response.request_id.as_str(),
        user_id = response.user_id.as_str(),
        "direct delivery request received"
    );

    let payload = DeliveryPayload::from_response(&response);
    match dispatch_response(&state, &payload).await {
        Ok(results) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "request_id": response.request_id,
                "deliveries": results,
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(request_id = response.request_id.as_str(), error = %e, "dispatch failed");
            error_response(e)
        }
    }
}

/// Health with per-handler reachability. No credentials or user data.
async fn handle_health(State(state): State<DispatchState>) -> Json<serde_json::Value> {
    let mut available = Vec::new();
    for (kind, handler) in state.handlers.iter() {
        if handler.health_check().await {
            available.push(kind.to_string());
        }
    }
    available.sort();

    Json(json!({
        "status": "healthy",
        "integrations_available": available,
    }))
}

// --- User integration configuration API ---

#[derive(Debug, Deserialize)]
struct IntegrationConfigBody {
    /// Required on POST; on PUT the path segment is authoritative.
    #[serde(default)]
    kind: Option<IntegrationKind>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_retry_count")]
    retry_count: u32,
    #[serde(default = "default_retry_delay")]
    retry_delay_seconds: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    30
}

async fn get_user_integrations(
    State(state): State<DispatchState>,
    Path(user_id): Path<String>,
) -> Response {
    match integrations::list_user_configs(&state.db, &user_id).await {
        Ok(configs) => (StatusCode::OK, Json(configs)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_user_integration(
    State(state): State<DispatchState>,
    Path(user_id): Path<String>,
    Json(body): Json<IntegrationConfigBody>,
) -> Response {
    let Some(kind) = body.kind else {
        return error_response(SwitchboardError::BadRequest("kind is required".into()));
    };
    let bag = serde_json::Value::Object(body.config).to_string();
    let result = integrations::upsert_config(
        &state.db,
        &user_id,
        kind,
        body.enabled,
        &bag,
        body.priority,
        body.retry_count,
        body.retry_delay_seconds,
    )
    .await;

    match result {
        Ok(()) => {
            info!(user_id = user_id.as_str(), kind = %kind, enabled = body.enabled,
                  "user integration configured");
            match integrations::get_config(&state.db, &user_id, kind).await {
                Ok(Some(config)) => (StatusCode::OK, Json(config)).into_response(),
                Ok(None) => error_response(SwitchboardError::Internal(
                    "config row vanished after upsert".into(),
                )),
                Err(e) => error_response(e),
            }
        }
        Err(e) => error_response(e),
    }
}

async fn update_user_integration(
    State(state): State<DispatchState>,
    Path((user_id, kind)): Path<(String, IntegrationKind)>,
    Json(mut body): Json<IntegrationConfigBody>,
) -> Response {
    // The path is authoritative for the kind.
    body.kind = Some(kind);

    match integrations::get_config(&state.db, &user_id, kind).await {
        Ok(Some(_)) => create_user_integration(State(state), Path(user_id), Json(body)).await,
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "bad_request", "detail": "integration configuration not found" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_user_integration(
    State(state): State<DispatchState>,
    Path((user_id, kind)): Path<(String, IntegrationKind)>,
) -> Response {
    match integrations::delete_config(&state.db, &user_id, kind).await {
        Ok(true) => {
            info!(user_id = user_id.as_str(), kind = %kind, "user integration deleted");
            (StatusCode::OK, Json(json!({ "message": "integration configuration deleted" })))
                .into_response()
        }
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "bad_request", "detail": "integration configuration not found" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeliveriesQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    50
}

async fn get_user_deliveries(
    State(state): State<DispatchState>,
    Path(user_id): Path<String>,
    Query(query): Query<DeliveriesQuery>,
) -> Response {
    match deliveries::list_user_deliveries(&state.db, &user_id, query.limit, query.offset).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => error_response(e),
    }
}
