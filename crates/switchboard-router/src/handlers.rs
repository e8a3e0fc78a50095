// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers for the inbound surfaces.
//!
//! Each surface authenticates its own way (signed payloads for chat,
//! bearer for web/CLI, static API key for tool), converges on a
//! [`TurnInput`](crate::flow::TurnInput), and hands off to the turn
//! pipeline in `flow`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use switchboard_auth::{verify_chat_signature, ProxyHeaders};
use switchboard_core::{SurfaceHandles, SurfaceKind, SwitchboardError, Transport};
use switchboard_store::queries::{requests, sessions};
use tracing::{info, warn};

use crate::flow::{run_turn_async, run_turn_sync, TurnInput};
use crate::normalize::{
    ChatEventEnvelope, ChatSlashCommand, GenericRequest, ToolRequest, WebRequest,
};
use crate::responses::ApiError;
use crate::server::RouterState;

/// Extracts the bearer token from the Authorization header.
fn bearer_from(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extracts upstream-injected identity headers (honoured only behind the
/// trusted-proxy flag, which the resolver enforces).
fn proxy_from(headers: &HeaderMap) -> ProxyHeaders<'_> {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    ProxyHeaders {
        user_id: get("x-user-id"),
        email: get("x-user-email"),
        groups: get("x-user-groups"),
    }
}

/// Resolves the authenticated subject for web/CLI surfaces and checks it
/// against the body-presented user id.
async fn authenticated_user(
    state: &RouterState,
    headers: &HeaderMap,
    presented_user_id: &str,
) -> Result<String, SwitchboardError> {
    let identity = state
        .resolver
        .resolve_user(bearer_from(headers), proxy_from(headers))
        .await?;
    if identity.user_id != presented_user_id {
        warn!(
            authenticated_user = identity.user_id.as_str(),
            presented_user = presented_user_id,
            "body user id does not match authenticated subject"
        );
        return Err(SwitchboardError::Unauthorized);
    }
    Ok(identity.user_id)
}

// --- Web and CLI surfaces (synchronous) ---

pub async fn handle_web(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Json(body): Json<WebRequest>,
) -> Result<Response, ApiError> {
    handle_direct_surface(state, headers, body, SurfaceKind::Web).await
}

pub async fn handle_cli(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Json(body): Json<WebRequest>,
) -> Result<Response, ApiError> {
    handle_direct_surface(state, headers, body, SurfaceKind::Cli).await
}

async fn handle_direct_surface(
    state: RouterState,
    headers: HeaderMap,
    body: WebRequest,
    surface: SurfaceKind,
) -> Result<Response, ApiError> {
    let user_id = authenticated_user(&state, &headers, &body.user_id).await?;

    let mut context = Map::new();
    if let Some(client_ip) = body.client_ip {
        context.insert("client_ip".into(), Value::String(client_ip));
    }
    if let Some(user_agent) = body.user_agent {
        context.insert("user_agent".into(), Value::String(user_agent));
    }

    let outcome = run_turn_sync(
        &state,
        TurnInput {
            user_id,
            surface,
            handles: SurfaceHandles::default(),
            content: body.content,
            forced_integration: None,
            integration_context: context,
        },
    )
    .await?;

    Ok((StatusCode::OK, Json(outcome)).into_response())
}

// --- Tool surface (asynchronous) ---

pub async fn handle_tool(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Json(body): Json<ToolRequest>,
) -> Result<Response, ApiError> {
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let principal = state.resolver.resolve_tool(api_key)?;
    if principal.user_id != body.user_id {
        warn!(
            principal = principal.user_id.as_str(),
            presented_user = body.user_id.as_str(),
            "tool body user id does not match key principal"
        );
        return Err(SwitchboardError::Unauthorized.into());
    }

    let mut context = Map::new();
    context.insert("tool_id".into(), Value::String(body.tool_id));
    context.insert("trigger_event".into(), Value::String(body.trigger_event));
    if let Some(instance) = body.tool_instance_id {
        context.insert("tool_instance_id".into(), Value::String(instance));
    }
    if let Some(tool_context) = body.tool_context {
        context.insert("tool_context".into(), Value::Object(tool_context));
    }

    let outcome = run_turn_async(
        &state,
        TurnInput {
            user_id: principal.user_id,
            surface: SurfaceKind::Tool,
            handles: SurfaceHandles::default(),
            content: body.content,
            forced_integration: None,
            integration_context: context,
        },
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(outcome)).into_response())
}

// --- Chat surfaces (signed, asynchronous) ---

/// Verifies the chat signature headers over the raw body.
fn verify_chat_headers(
    state: &RouterState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), SwitchboardError> {
    let Some(secret) = &state.config.chat.signing_secret else {
        // Fail-closed: without a secret, no signed surface is accepted.
        warn!("chat signing secret not configured, rejecting signed request");
        return Err(SwitchboardError::Unauthorized);
    };
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let timestamp = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if verify_chat_signature(secret, timestamp, body, signature) {
        Ok(())
    } else {
        warn!("invalid chat signature");
        Err(SwitchboardError::Unauthorized)
    }
}

pub async fn handle_chat_event(
    State(state): State<RouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify_chat_headers(&state, &headers, &body)?;

    let envelope: ChatEventEnvelope = serde_json::from_slice(&body)
        .map_err(|e| SwitchboardError::BadRequest(format!("malformed chat event: {e}")))?;

    // URL verification challenge during app installation.
    if envelope.kind == "url_verification" {
        let challenge = envelope.challenge.unwrap_or_default();
        return Ok((StatusCode::OK, Json(json!({ "challenge": challenge }))).into_response());
    }

    if envelope.kind != "event_callback" {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "unhandled envelope type" })),
        )
            .into_response());
    }

    let Some(event) = envelope.event else {
        return Err(SwitchboardError::BadRequest("missing event".into()).into());
    };

    // Drop bot echoes so the assistant never talks to itself.
    if event.bot_id.is_some() {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "bot message" })),
        )
            .into_response());
    }

    if event.kind != "message" && event.kind != "app_mention" {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "unhandled event type" })),
        )
            .into_response());
    }

    let (Some(user), Some(text), Some(channel)) = (event.user, event.text, event.channel) else {
        return Err(SwitchboardError::BadRequest("incomplete chat event".into()).into());
    };

    // Threaded replies stay in their thread; top-level messages thread
    // under their own timestamp.
    let thread_id = event.thread_ts.or(event.ts);
    let handles = SurfaceHandles {
        channel_id: Some(channel.clone()),
        thread_id: thread_id.clone(),
        external_user_id: Some(user.clone()),
        workspace_id: envelope.team_id,
    };

    let mut context = Map::new();
    context.insert("channel_id".into(), Value::String(channel));
    if let Some(thread) = thread_id {
        context.insert("thread_id".into(), Value::String(thread));
    }

    let outcome = run_turn_async(
        &state,
        TurnInput {
            user_id: user,
            surface: SurfaceKind::Chat,
            handles,
            content: text,
            forced_integration: Some(switchboard_core::IntegrationKind::Chat),
            integration_context: context,
        },
    )
    .await?;

    // Chat surfaces must ack fast; the work continues on the spawned task.
    Ok((StatusCode::OK, Json(json!({ "status": "ok", "request_id": outcome.request_id })))
        .into_response())
}

pub async fn handle_chat_slash(
    State(state): State<RouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify_chat_headers(&state, &headers, &body)?;

    let command: ChatSlashCommand = serde_urlencoded::from_bytes(&body)
        .map_err(|e| SwitchboardError::BadRequest(format!("malformed slash command: {e}")))?;

    let content = if command.text.trim().is_empty() {
        // A bare slash command is an implicit "hello".
        format!("{} help", command.command.trim_start_matches('/'))
    } else {
        command.text.clone()
    };

    let handles = SurfaceHandles {
        channel_id: Some(command.channel_id.clone()),
        thread_id: None,
        external_user_id: Some(command.user_id.clone()),
        workspace_id: Some(command.team_id),
    };
    let mut context = Map::new();
    context.insert("channel_id".into(), Value::String(command.channel_id));
    if let Some(response_url) = command.response_url {
        context.insert("response_url".into(), Value::String(response_url));
    }

    run_turn_async(
        &state,
        TurnInput {
            user_id: command.user_id,
            surface: SurfaceKind::Chat,
            handles,
            content,
            forced_integration: Some(switchboard_core::IntegrationKind::Chat),
            integration_context: context,
        },
    )
    .await?;

    // Ephemeral ack in the platform's slash-command response format.
    Ok((
        StatusCode::OK,
        Json(json!({
            "response_type": "ephemeral",
            "text": "Working on it...",
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct InteractiveForm {
    payload: String,
}

pub async fn handle_chat_interactive(
    State(state): State<RouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify_chat_headers(&state, &headers, &body)?;

    let form: InteractiveForm = serde_urlencoded::from_bytes(&body)
        .map_err(|e| SwitchboardError::BadRequest(format!("malformed interaction: {e}")))?;
    let payload: crate::normalize::ChatInteractionPayload =
        serde_json::from_str(&form.payload)
            .map_err(|e| SwitchboardError::BadRequest(format!("malformed interaction payload: {e}")))?;

    if payload.kind != "block_actions" {
        return Ok((
            StatusCode::OK,
            Json(json!({ "status": "ignored", "reason": "unhandled interaction type" })),
        )
            .into_response());
    }

    // A button press becomes the pressed value as the user's turn.
    let content = payload
        .actions
        .iter()
        .find_map(|a| a.value.clone().or_else(|| a.action_id.clone()))
        .ok_or_else(|| SwitchboardError::BadRequest("interaction carries no action".into()))?;

    let channel_id = payload.channel.map(|c| c.id);
    let handles = SurfaceHandles {
        channel_id: channel_id.clone(),
        thread_id: None,
        external_user_id: Some(payload.user.id.clone()),
        workspace_id: payload.team.map(|t| t.id),
    };
    let mut context = Map::new();
    if let Some(channel) = channel_id {
        context.insert("channel_id".into(), Value::String(channel));
    }

    run_turn_async(
        &state,
        TurnInput {
            user_id: payload.user.id,
            surface: SurfaceKind::Chat,
            handles,
            content,
            forced_integration: Some(switchboard_core::IntegrationKind::Chat),
            integration_context: context,
        },
    )
    .await?;

    Ok((StatusCode::OK, Json(json!({ "status": "ok" }))).into_response())
}

// --- Generic surface (feature-flagged) ---

pub async fn handle_generic(
    State(state): State<RouterState>,
    Json(body): Json<GenericRequest>,
) -> Result<Response, ApiError> {
    let input = generic_input(&state, body)?;
    let outcome = run_turn_async(&state, input).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)).into_response())
}

pub async fn handle_generic_sync(
    State(state): State<RouterState>,
    Json(body): Json<GenericRequest>,
) -> Result<Response, ApiError> {
    let input = generic_input(&state, body)?;
    let outcome = run_turn_sync(&state, input).await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

fn generic_input(state: &RouterState, body: GenericRequest) -> Result<TurnInput, ApiError> {
    if !state.config.router.generic_endpoint_enabled {
        return Err(SwitchboardError::Forbidden("generic endpoint is disabled".into()).into());
    }
    Ok(TurnInput {
        user_id: body.user_id,
        surface: SurfaceKind::Generic,
        handles: SurfaceHandles::default(),
        content: body.content,
        forced_integration: body.integration_kind,
        integration_context: body.metadata.unwrap_or_default(),
    })
}

// --- Request status ---

pub async fn get_request_status(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Response, ApiError> {
    let identity = state
        .resolver
        .resolve_user(bearer_from(&headers), proxy_from(&headers))
        .await?;

    let log = requests::get_log(&state.db, &request_id)
        .await?
        .ok_or_else(|| SwitchboardError::BadRequest("request not found".into()))?;
    let session = sessions::get_session(&state.db, &log.session_id)
        .await?
        .ok_or_else(|| SwitchboardError::Internal("log references missing session".into()))?;

    if session.user_id != identity.user_id {
        return Err(SwitchboardError::Forbidden("not the request owner".into()).into());
    }

    let mut body = json!({
        "request_id": log.request_id,
        "session_id": log.session_id,
        "status": log.status,
        "created_at": log.created_at,
        "completed_at": log.completed_at,
    });
    if let Some(content) = &log.response_content {
        body["response"] = json!({
            "content": content,
            "agent_id": log.agent_id,
            "processing_time_ms": log.processing_time_ms,
        });
    }
    Ok((StatusCode::OK, Json(body)).into_response())
}

// --- Session management ---

#[derive(Debug, Deserialize)]
pub struct SessionCreate {
    pub user_id: String,
    pub surface: SurfaceKind,
    #[serde(default)]
    pub handles: SurfaceHandles,
    #[serde(default)]
    pub integration_metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub current_agent_id: Option<String>,
    #[serde(default)]
    pub runtime_session_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conversation_context: Option<Map<String, Value>>,
}

pub async fn create_session(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Json(body): Json<SessionCreate>,
) -> Result<Response, ApiError> {
    let user_id = authenticated_user(&state, &headers, &body.user_id).await?;

    let (session, created) = sessions::get_or_create_session(
        &state.db,
        &user_id,
        body.surface,
        &body.handles,
        state.config.limits.session_idle_ttl_minutes,
        &body.integration_metadata.unwrap_or_default(),
    )
    .await?;

    info!(
        session_id = session.id.as_str(),
        user_id = user_id.as_str(),
        created,
        "session create requested"
    );
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(session)).into_response())
}

pub async fn get_session(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let identity = state
        .resolver
        .resolve_user(bearer_from(&headers), proxy_from(&headers))
        .await?;
    let session = sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| SwitchboardError::BadRequest("session not found".into()))?;
    if session.user_id != identity.user_id {
        return Err(SwitchboardError::Forbidden("not the session owner".into()).into());
    }
    Ok((StatusCode::OK, Json(session)).into_response())
}

pub async fn update_session(
    State(state): State<RouterState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<SessionUpdate>,
) -> Result<Response, ApiError> {
    let identity = state
        .resolver
        .resolve_user(bearer_from(&headers), proxy_from(&headers))
        .await?;
    let session = sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| SwitchboardError::BadRequest("session not found".into()))?;
    if session.user_id != identity.user_id {
        return Err(SwitchboardError::Forbidden("not the session owner".into()).into());
    }

    if let Some(agent_id) = &body.current_agent_id {
        sessions::update_session_agent(&state.db, &session_id, Some(agent_id), true).await?;
    }
    if let Some(handle) = &body.runtime_session_id {
        sessions::set_runtime_session(&state.db, &session_id, handle).await?;
    }
    if let Some(status) = &body.status {
        status
            .parse::<switchboard_core::SessionStatus>()
            .map_err(|_| SwitchboardError::BadRequest(format!("unknown status {status}")))?;
        sessions::update_session_status(&state.db, &session_id, status).await?;
    }
    if let Some(delta) = &body.conversation_context {
        sessions::update_session_context(&state.db, &session_id, delta).await?;
    }

    let session = sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| SwitchboardError::Internal("session vanished during update".into()))?;
    Ok((StatusCode::OK, Json(session)).into_response())
}

// --- Health ---

pub async fn health(State(state): State<RouterState>) -> Json<Value> {
    let healthy = state.db.ping().await.is_ok();
    Json(json!({ "status": if healthy { "healthy" } else { "degraded" } }))
}

/// Component statuses only. No credentials, no user data.
pub async fn health_detailed(State(state): State<RouterState>) -> Json<Value> {
    let database = state.db.ping().await.is_ok();
    Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "transport": state.transport.mode().to_string(),
        "services": {
            "database": if database { "connected" } else { "disconnected" },
        },
    }))
}
