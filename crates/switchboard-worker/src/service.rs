// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The turn processor: consumes a normalized request, drives the agent
//! runtime, and produces exactly one completed response.
//!
//! Idempotency: a redelivered `request.created` either short-circuits on an
//! already-completed log (returning the prior response deterministically,
//! without republishing) or loses the `pending -> dispatched` claim and is
//! rejected with `conflict` while the first delivery is still running.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use switchboard_core::{
    AgentReply, AgentRuntime, CompletedResponse, NormalizedRequest, SwitchboardError, Transport,
};
use switchboard_store::queries::{requests, sessions};
use switchboard_store::{Database, SessionRecord};
use tracing::{error, info, warn};

use crate::routing::detect_routing_directive;

/// Prompt sent to a newly routed agent in place of the original content, so
/// the user gets an introduction from the specialist instead of a replayed
/// question the new agent has no context for.
const INTRODUCTION_PROMPT: &str = "please introduce yourself and tell me how you can help";

/// Shared state for the Agent Worker.
#[derive(Clone)]
pub struct WorkerState {
    pub db: Database,
    pub runtime: Arc<dyn AgentRuntime>,
    pub transport: Arc<dyn Transport>,
    /// Agents advertised for routing-directive validation.
    pub agents: Vec<String>,
    /// Fallback agent for sessions with none pinned.
    pub routing_agent: String,
    /// Hard deadline for one runtime invocation.
    pub runtime_deadline: Duration,
    /// Identity used in event claims.
    pub instance_id: String,
}

/// Processes one turn end to end and returns the completed response.
pub async fn process_request(
    state: &WorkerState,
    request: &NormalizedRequest,
) -> Result<CompletedResponse, SwitchboardError> {
    let session = sessions::get_session(&state.db, &request.session_id)
        .await?
        .ok_or_else(|| SwitchboardError::BadRequest("unknown session".to_string()))?;

    // Short-circuit: the log already carries a response.
    if let Some(prior) =
        requests::get_completed_response(&state.db, &request.request_id).await?
    {
        info!(
            request_id = request.request_id.as_str(),
            "request already completed, returning prior response"
        );
        return Ok(prior);
    }

    let mut agent = request
        .target_agent_id
        .clone()
        .or_else(|| session.current_agent_id.clone())
        .unwrap_or_else(|| state.routing_agent.clone());

    // Claim the turn before invoking the runtime.
    let claimed = requests::mark_dispatched(&state.db, &request.request_id, &agent).await?;
    if !claimed {
        // Either a concurrent delivery completed it in the window above, or
        // another replica is mid-flight.
        if let Some(prior) =
            requests::get_completed_response(&state.db, &request.request_id).await?
        {
            return Ok(prior);
        }
        return Err(SwitchboardError::Conflict(
            "request is already being processed".to_string(),
        ));
    }

    let handle = ensure_conversation(state, &session, &agent).await?;

    let mut reply = invoke_with_deadline(
        state,
        &handle,
        &agent,
        &request.content,
        request,
    )
    .await;

    // Agent routing: a directive switches the session and re-invokes the
    // target; the directive text itself is never delivered to the user.
    if let Some(target) = detect_routing_directive(
        &reply.content,
        &agent,
        &state.agents,
        &state.routing_agent,
    ) {
        if target != agent {
            info!(
                session_id = session.id.as_str(),
                from_agent = agent.as_str(),
                to_agent = target.as_str(),
                "switching session agent"
            );
            sessions::update_session_agent(&state.db, &session.id, Some(&target), true).await?;
            let new_handle = state.runtime.open_conversation(&target).await?;
            sessions::set_runtime_session(&state.db, &session.id, &new_handle).await?;

            reply = invoke_with_deadline(state, &new_handle, &target, INTRODUCTION_PROMPT, request)
                .await;
            agent = target;
        }
    } else if session.current_agent_id.is_none() {
        // Pin the first responding agent so subsequent turns stay with it.
        sessions::update_session_agent(&state.db, &session.id, Some(&agent), false).await?;
    }

    // Runtime-reported session context deltas are merged field-by-field.
    if let Some(delta) = reply.metadata.get("context_delta").and_then(|v| v.as_object()) {
        sessions::update_session_context(&state.db, &session.id, delta).await?;
    }

    // The surface context (channel, thread, tool ids) rides along so
    // delivery handlers can route replies back to where the turn started;
    // runtime-reported keys win on collision.
    let mut metadata = request.integration_context.clone();
    if let Some(kind) = request.forced_integration {
        metadata.insert(
            "forced_integration".to_string(),
            serde_json::Value::String(kind.to_string()),
        );
    }
    for (key, value) in reply.metadata {
        metadata.insert(key, value);
    }

    let response = CompletedResponse {
        request_id: request.request_id.clone(),
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        agent_id: agent,
        content: reply.content,
        metadata,
        processing_time_ms: reply.processing_time_ms,
        completed_at: Utc::now(),
    };

    requests::complete_log(&state.db, &response, None, None).await?;

    if let Err(e) = state.transport.publish_response(&response).await {
        // The response is persisted; a lost publish is recoverable by the
        // sync poll path, but asynchronous delivery is degraded.
        error!(
            request_id = response.request_id.as_str(),
            error = %e,
            "failed to publish response"
        );
    }

    info!(
        request_id = response.request_id.as_str(),
        session_id = response.session_id.as_str(),
        agent_id = response.agent_id.as_str(),
        processing_time_ms = response.processing_time_ms,
        "turn completed"
    );

    Ok(response)
}

/// Reuses the session's runtime conversation, creating one on first turn.
async fn ensure_conversation(
    state: &WorkerState,
    session: &SessionRecord,
    agent: &str,
) -> Result<String, SwitchboardError> {
    if let Some(handle) = &session.runtime_session_id {
        return Ok(handle.clone());
    }
    let handle = state.runtime.open_conversation(agent).await?;
    sessions::set_runtime_session(&state.db, &session.id, &handle).await?;
    Ok(handle)
}

/// Runs one runtime turn under the hard deadline.
///
/// Deadline exhaustion and terminal runtime failures both yield an
/// error-kind reply rather than a silent drop, so a `response.ready` is
/// always produced.
async fn invoke_with_deadline(
    state: &WorkerState,
    handle: &str,
    agent: &str,
    prompt: &str,
    request: &NormalizedRequest,
) -> AgentReply {
    let started = std::time::Instant::now();
    let turn = state
        .runtime
        .run_turn(handle, agent, prompt, &request.integration_context);

    match tokio::time::timeout(state.runtime_deadline, turn).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            warn!(
                request_id = request.request_id.as_str(),
                agent,
                error = %e,
                "runtime invocation failed"
            );
            error_reply(agent, "runtime_error", started)
        }
        Err(_) => {
            warn!(
                request_id = request.request_id.as_str(),
                agent,
                deadline_secs = state.runtime_deadline.as_secs(),
                "runtime invocation exceeded deadline"
            );
            error_reply(agent, "timeout", started)
        }
    }
}

fn error_reply(agent: &str, kind: &str, started: std::time::Instant) -> AgentReply {
    let mut metadata = switchboard_core::ContextBag::new();
    metadata.insert("error".to_string(), serde_json::Value::String(kind.to_string()));
    AgentReply {
        agent_id: agent.to_string(),
        content: "I was unable to process your request. Please try again in a moment."
            .to_string(),
        metadata,
        processing_time_ms: started.elapsed().as_millis() as i64,
    }
}
