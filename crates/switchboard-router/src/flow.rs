// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-turn pipeline: session allocation, the turn lock, dispatch, and
//! the synchronous or asynchronous rendezvous with `response.ready`.
//!
//! Turn state machine: RECEIVED -> AUTHENTICATED -> NORMALIZED -> SESSIONED
//! -> DISPATCHED -> {RESPONDED | TIMED_OUT}. Authentication happens in the
//! handlers; this module owns everything from session allocation onward.

use std::time::Duration;

use serde::Serialize;
use switchboard_core::{
    ContextBag, IntegrationKind, NormalizedRequest, SurfaceHandles, SurfaceKind, SwitchboardError,
    Transport,
};
use switchboard_store::queries::{requests, sessions};
use tracing::{info, warn};

use crate::normalize::{build_normalized, validate_content};
use crate::server::RouterState;

/// Response body for synchronous surfaces.
#[derive(Debug, Serialize)]
pub struct SyncTurnBody {
    pub request_id: String,
    pub session_id: String,
    pub status: String,
    pub content: String,
    pub agent_id: String,
    pub processing_time_ms: i64,
}

/// Acknowledgement body for asynchronous surfaces.
#[derive(Debug, Serialize)]
pub struct AcceptedBody {
    pub request_id: String,
    pub session_id: String,
    pub status: String,
    pub message: String,
}

/// Inputs to a turn, produced by a surface handler after authentication.
#[derive(Debug)]
pub struct TurnInput {
    pub user_id: String,
    pub surface: SurfaceKind,
    pub handles: SurfaceHandles,
    pub content: String,
    pub forced_integration: Option<IntegrationKind>,
    pub integration_context: ContextBag,
}

/// Runs a turn synchronously: dispatch, await `response.ready`, release.
///
/// On timeout the log is marked `failed/timeout` and `504` surfaces to the
/// caller; a late response is still persisted and delivered asynchronously
/// by the dispatcher.
pub async fn run_turn_sync(
    state: &RouterState,
    input: TurnInput,
) -> Result<SyncTurnBody, SwitchboardError> {
    validate_content(&input.content, state.config.limits.max_content_kb)?;

    let (session, created) = sessions::get_or_create_session(
        &state.db,
        &input.user_id,
        input.surface,
        &input.handles,
        state.config.limits.session_idle_ttl_minutes,
        &input.integration_context,
    )
    .await?;
    if created {
        info!(
            session_id = session.id.as_str(),
            user_id = input.user_id.as_str(),
            surface = %input.surface,
            "session created"
        );
    }

    let lock_token = sessions::acquire_turn(&state.db, &session.id).await?;

    let normalized = build_normalized(
        &input.user_id,
        &session.id,
        input.surface,
        input.handles,
        input.content,
        session.current_agent_id.clone(),
        input.forced_integration,
        input.integration_context,
    );

    let outcome = dispatch_and_await(state, &normalized).await;

    if let Err(e) = sessions::release_turn(&state.db, &session.id, &lock_token).await {
        warn!(session_id = session.id.as_str(), error = %e, "turn lock release failed");
    }

    let response = outcome?;
    Ok(SyncTurnBody {
        request_id: normalized.request_id,
        session_id: session.id,
        status: "completed".to_string(),
        content: response.content,
        agent_id: response.agent_id,
        processing_time_ms: response.processing_time_ms,
    })
}

/// Runs a turn asynchronously: acknowledge immediately, do the work on a
/// spawned task.
///
/// Chat turns queue serially per thread: a held turn lock is awaited with
/// backoff instead of rejected, so threaded conversations never see
/// `conflict`.
pub async fn run_turn_async(
    state: &RouterState,
    input: TurnInput,
) -> Result<AcceptedBody, SwitchboardError> {
    validate_content(&input.content, state.config.limits.max_content_kb)?;

    let (session, created) = sessions::get_or_create_session(
        &state.db,
        &input.user_id,
        input.surface,
        &input.handles,
        state.config.limits.session_idle_ttl_minutes,
        &input.integration_context,
    )
    .await?;
    if created {
        info!(
            session_id = session.id.as_str(),
            user_id = input.user_id.as_str(),
            surface = %input.surface,
            "session created"
        );
    }

    let queue_serially = input.surface == SurfaceKind::Chat;
    let normalized = build_normalized(
        &input.user_id,
        &session.id,
        input.surface,
        input.handles,
        input.content,
        session.current_agent_id.clone(),
        input.forced_integration,
        input.integration_context,
    );
    let request_id = normalized.request_id.clone();
    let session_id = session.id.clone();

    let worker_state = state.clone();
    let spawned_request_id = request_id.clone();
    tokio::spawn(async move {
        if let Err(e) = run_background_turn(&worker_state, normalized, queue_serially).await {
            warn!(
                request_id = spawned_request_id.as_str(),
                error = %e,
                "background turn failed"
            );
        }
    });

    Ok(AcceptedBody {
        request_id,
        session_id,
        status: "accepted".to_string(),
        message: "Request has been queued for processing".to_string(),
    })
}

async fn run_background_turn(
    state: &RouterState,
    normalized: NormalizedRequest,
    queue_serially: bool,
) -> Result<(), SwitchboardError> {
    let session_id = normalized.session_id.clone();

    let lock_token = if queue_serially {
        acquire_turn_queued(state, &session_id).await?
    } else {
        sessions::acquire_turn(&state.db, &session_id).await?
    };

    let outcome = dispatch_and_await(state, &normalized).await;

    if let Err(e) = sessions::release_turn(&state.db, &session_id, &lock_token).await {
        warn!(session_id = session_id.as_str(), error = %e, "turn lock release failed");
    }

    outcome.map(|_| ())
}

/// Acquires the turn lock, waiting out an in-flight turn (chat threads
/// queue serially instead of rejecting).
async fn acquire_turn_queued(
    state: &RouterState,
    session_id: &str,
) -> Result<String, SwitchboardError> {
    let deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.config.limits.sync_timeout_seconds);
    loop {
        match sessions::acquire_turn(&state.db, session_id).await {
            Ok(token) => return Ok(token),
            Err(SwitchboardError::Conflict(_)) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// DISPATCHED -> {RESPONDED | TIMED_OUT}: append the log, hand the request
/// to the substrate, and rendezvous on the completed response.
async fn dispatch_and_await(
    state: &RouterState,
    normalized: &NormalizedRequest,
) -> Result<switchboard_core::CompletedResponse, SwitchboardError> {
    requests::append_log(&state.db, normalized).await?;

    if let Err(e) = state.transport.send_request(normalized).await {
        requests::fail_log(&state.db, &normalized.request_id, "dispatch failed").await?;
        return Err(SwitchboardError::Unavailable {
            message: format!("request dispatch failed: {e}"),
        });
    }

    info!(
        request_id = normalized.request_id.as_str(),
        session_id = normalized.session_id.as_str(),
        surface = %normalized.surface,
        "request dispatched"
    );

    let timeout = Duration::from_secs(state.config.limits.sync_timeout_seconds);
    match state
        .transport
        .await_response(&normalized.request_id, timeout)
        .await
    {
        Ok(response) => Ok(response),
        Err(SwitchboardError::Timeout { duration }) => {
            warn!(
                request_id = normalized.request_id.as_str(),
                timeout_secs = duration.as_secs(),
                "timed out awaiting response"
            );
            requests::fail_log(&state.db, &normalized.request_id, "timeout").await?;
            Err(SwitchboardError::Timeout { duration })
        }
        Err(e) => {
            requests::fail_log(&state.db, &normalized.request_id, "await failed").await?;
            Err(e)
        }
    }
}
