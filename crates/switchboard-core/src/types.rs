// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Switchboard services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Opaque key/value bag carried on sessions and requests.
pub type ContextBag = Map<String, Value>;

/// The inbound surface a request arrived through.
///
/// Immutable for the lifetime of a session (a chat session never becomes a
/// web session).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Chat,
    Web,
    Cli,
    Tool,
    Generic,
}

/// Session lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Inactive,
    Completed,
    Error,
}

/// Request log lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Dispatched,
    Completed,
    Failed,
}

/// Outbound delivery channels.
///
/// A closed union: the dispatcher's handler table is keyed by this enum, so
/// adding a kind without wiring a handler is a compile-time hole rather than
/// a silently dropped string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Chat,
    Email,
    Webhook,
    Test,
}

impl IntegrationKind {
    /// All known kinds, in handler-table registration order.
    pub const ALL: [IntegrationKind; 4] = [
        IntegrationKind::Chat,
        IntegrationKind::Email,
        IntegrationKind::Webhook,
        IntegrationKind::Test,
    ];
}

/// Terminal state of one delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    Failed,
    Pending,
}

/// Surface-specific handles captured at session creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceHandles {
    /// Channel the conversation lives in (chat surfaces).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Thread within the channel, when threaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// The surface's own identifier for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    /// Workspace / team scope on multi-tenant surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

impl SurfaceHandles {
    pub fn is_empty(&self) -> bool {
        self.channel_id.is_none()
            && self.thread_id.is_none()
            && self.external_user_id.is_none()
            && self.workspace_id.is_none()
    }
}

/// The uniform record every inbound surface converges on.
///
/// Produced exactly once per turn by the Request Router; everything
/// downstream (worker, store, dispatcher) consumes this shape and never the
/// raw surface payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRequest {
    /// Router-assigned request id (uuid v4).
    pub request_id: String,
    /// Session the turn belongs to.
    pub session_id: String,
    /// Authenticated user id, never the body-presented one.
    pub user_id: String,
    /// Surface the request arrived through.
    pub surface: SurfaceKind,
    /// Surface handles captured from the raw payload.
    #[serde(default, skip_serializing_if = "SurfaceHandles::is_empty")]
    pub handles: SurfaceHandles,
    /// UTF-8 message content, bounded by the router.
    pub content: String,
    /// Agent the session is currently pinned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,
    /// Delivery kind explicitly requested by the surface, if forced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_integration: Option<IntegrationKind>,
    /// When the router accepted the request.
    pub created_at: DateTime<Utc>,
    /// Opaque per-surface context forwarded to delivery handlers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub integration_context: ContextBag,
}

/// Structured output of a single agent runtime turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// Agent that produced the reply.
    pub agent_id: String,
    /// Reply text (may carry a routing directive line).
    pub content: String,
    /// Runtime-reported metadata (token counts, stop reason, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: ContextBag,
    /// Wall-clock runtime of the turn.
    pub processing_time_ms: i64,
}

/// A completed response as persisted and fanned out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedResponse {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: ContextBag,
    pub processing_time_ms: i64,
    pub completed_at: DateTime<Utc>,
}

/// The canonical envelope handed to every integration handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Short subject line (email subject, chat header).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Response body text.
    pub body: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: ContextBag,
}

impl DeliveryPayload {
    /// Builds the delivery payload for a completed response.
    pub fn from_response(response: &CompletedResponse) -> Self {
        Self {
            request_id: response.request_id.clone(),
            session_id: response.session_id.clone(),
            user_id: response.user_id.clone(),
            agent_id: Some(response.agent_id.clone()),
            subject: None,
            body: response.content.clone(),
            metadata: response.metadata.clone(),
        }
    }

    /// Idempotency key for one attempt, stable across redelivery.
    ///
    /// Receivers deduplicate on `(request_id, kind, attempt)`.
    pub fn idempotency_key(&self, kind: IntegrationKind, attempt: u32) -> String {
        format!("{}:{}:{}", self.request_id, kind, attempt)
    }
}

/// Effective per-user, per-kind delivery configuration.
///
/// Computed by overlaying the user's override row on the system default row;
/// exactly one source wins (never a field-wise merge of both).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub user_id: String,
    pub kind: IntegrationKind,
    pub enabled: bool,
    /// Kind-specific settings bag, validated by the handler.
    pub config: ContextBag,
    pub priority: i32,
    pub retry_count: u32,
    pub retry_delay_seconds: u64,
    /// True when the row came from the user override rather than the
    /// system default.
    pub user_override: bool,
}

/// Result of one delivery attempt, as reported by a handler.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub outcome: DeliveryOutcome,
    /// Handler-provided detail, persisted on failures.
    pub message: Option<String>,
    /// Whether a failure is worth retrying (network, 5xx, 429).
    pub retryable: bool,
}

impl AttemptOutcome {
    pub fn success() -> Self {
        Self {
            outcome: DeliveryOutcome::Success,
            message: None,
            retryable: false,
        }
    }

    pub fn failed(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            outcome: DeliveryOutcome::Failed,
            message: Some(message.into()),
            retryable,
        }
    }
}

/// Generates a fresh opaque id (uuid v4) for sessions and requests.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn surface_kind_round_trips_as_snake_case() {
        for kind in [
            SurfaceKind::Chat,
            SurfaceKind::Web,
            SurfaceKind::Cli,
            SurfaceKind::Tool,
            SurfaceKind::Generic,
        ] {
            let s = kind.to_string();
            assert_eq!(SurfaceKind::from_str(&s).unwrap(), kind);
        }
        assert_eq!(SurfaceKind::Chat.to_string(), "chat");
    }

    #[test]
    fn integration_kind_all_is_exhaustive() {
        // Each ALL entry must parse back to itself; a new variant missing
        // from ALL shows up as a length mismatch in the dispatcher tests.
        for kind in IntegrationKind::ALL {
            assert_eq!(IntegrationKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn idempotency_key_is_stable() {
        let payload = DeliveryPayload {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
            user_id: "alice".into(),
            agent_id: None,
            subject: None,
            body: "hi".into(),
            metadata: Map::new(),
        };
        assert_eq!(
            payload.idempotency_key(IntegrationKind::Webhook, 3),
            "req-1:webhook:3"
        );
        assert_eq!(
            payload.idempotency_key(IntegrationKind::Webhook, 3),
            payload.idempotency_key(IntegrationKind::Webhook, 3),
        );
    }

    #[test]
    fn normalized_request_serializes_without_empty_optionals() {
        let req = NormalizedRequest {
            request_id: "r".into(),
            session_id: "s".into(),
            user_id: "u".into(),
            surface: SurfaceKind::Web,
            handles: SurfaceHandles::default(),
            content: "hello".into(),
            target_agent_id: None,
            forced_integration: None,
            created_at: Utc::now(),
            integration_context: Map::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("handles"));
        assert!(!json.contains("target_agent_id"));
        let back: NormalizedRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.surface, SurfaceKind::Web);
    }
}
