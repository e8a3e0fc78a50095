// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker-mode event intake for the router.
//!
//! Consumes `response.ready` (idempotent log completion, e.g. when an
//! external runtime publishes straight to the broker) and
//! `request.database-update` (session context deltas). Self-sourced events
//! are dropped by the circuit breaker before any claim is taken, and every
//! processed event is claimed per component so redelivery is harmless.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use switchboard_core::envelope::{event_types, sources};
use switchboard_core::{CompletedResponse, ContextBag};
use switchboard_store::queries::{deliveries, requests, sessions};
use tracing::info;

use crate::responses::ApiError;
use crate::server::RouterState;

/// Claim component name used in the event claim table.
const CLAIM_COMPONENT: &str = "router";

#[derive(Debug, Deserialize)]
struct DatabaseUpdateData {
    session_id: String,
    context_delta: ContextBag,
}

pub async fn handle_event(
    State(state): State<RouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    let envelope = switchboard_transport::decode_binary(
        header(switchboard_transport::broker::ce_headers::ID),
        header(switchboard_transport::broker::ce_headers::TYPE),
        header(switchboard_transport::broker::ce_headers::SOURCE),
        header(switchboard_transport::broker::ce_headers::SUBJECT),
        header(switchboard_transport::broker::ce_headers::TIME),
        &body,
    )?;

    // Circuit breaker: never process our own events back.
    if envelope.source == sources::ROUTER {
        info!(
            event_id = envelope.id.as_str(),
            "ignoring self-generated event"
        );
        return Ok(ok_body("ignored", "self-generated event"));
    }

    match envelope.event_type.as_str() {
        event_types::RESPONSE_READY | event_types::DATABASE_UPDATE => {}
        _ => return Ok(ok_body("ignored", "unhandled event type")),
    }

    if !deliveries::claim_event(&state.db, &envelope.id, CLAIM_COMPONENT, &state.instance_id)
        .await?
    {
        return Ok(ok_body("skipped", "duplicate event"));
    }

    let result = match envelope.event_type.as_str() {
        event_types::RESPONSE_READY => {
            let response: CompletedResponse = envelope.decode_data()?;
            // Idempotent: the first writer wins, repeats are no-ops.
            let wrote =
                requests::complete_log(&state.db, &response, Some(&envelope.id), Some(&envelope.event_type))
                    .await?;
            info!(
                request_id = response.request_id.as_str(),
                wrote,
                "response.ready event processed"
            );
            deliveries::record_event_result(
                &state.db,
                &envelope.id,
                CLAIM_COMPONENT,
                Some(&response.request_id),
                Some(&response.session_id),
                "success",
                None,
            )
            .await?;
            ok_body("processed", "response recorded")
        }
        event_types::DATABASE_UPDATE => {
            let data: DatabaseUpdateData = envelope.decode_data()?;
            sessions::update_session_context(&state.db, &data.session_id, &data.context_delta)
                .await?;
            info!(
                session_id = data.session_id.as_str(),
                keys = data.context_delta.len(),
                "session context delta applied"
            );
            deliveries::record_event_result(
                &state.db,
                &envelope.id,
                CLAIM_COMPONENT,
                None,
                Some(&data.session_id),
                "success",
                None,
            )
            .await?;
            ok_body("processed", "context updated")
        }
        _ => unreachable!("filtered above"),
    };

    Ok(result)
}

fn ok_body(status: &str, reason: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": status, "reason": reason })),
    )
        .into_response()
}
