// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Surface payload schemas and normalization.
//!
//! Every inbound surface deserializes into its own strict schema, then
//! converges on [`NormalizedRequest`]. Rejection is immediate on schema
//! violation or oversized content; the authoritative user id always comes
//! from authentication, never from the body.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use switchboard_core::{
    types::new_id, ContextBag, IntegrationKind, NormalizedRequest, SurfaceHandles, SurfaceKind,
    SwitchboardError,
};

/// Body for `POST /api/v1/requests/web` and `/cli`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Body for `POST /api/v1/requests/tool`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolRequest {
    pub user_id: String,
    pub content: String,
    pub tool_id: String,
    #[serde(default)]
    pub tool_instance_id: Option<String>,
    pub trigger_event: String,
    #[serde(default)]
    pub tool_context: Option<Map<String, Value>>,
}

/// Body for the feature-flagged generic endpoint.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenericRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub integration_kind: Option<IntegrationKind>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Chat platform event envelope (`POST /api/v1/requests/chat_event`).
#[derive(Debug, Deserialize)]
pub struct ChatEventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub event: Option<ChatEvent>,
}

/// One chat event inside the envelope.
#[derive(Debug, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// Slash command form body (`POST /api/v1/requests/chat_slash`).
#[derive(Debug, Deserialize)]
pub struct ChatSlashCommand {
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub command: String,
    pub text: String,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
}

/// Interactive component payload (`POST /api/v1/requests/chat_interactive`).
#[derive(Debug, Deserialize)]
pub struct ChatInteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: ChatInteractionUser,
    #[serde(default)]
    pub channel: Option<ChatInteractionChannel>,
    #[serde(default)]
    pub team: Option<ChatInteractionTeam>,
    #[serde(default)]
    pub actions: Vec<ChatInteractionAction>,
}

#[derive(Debug, Deserialize)]
pub struct ChatInteractionUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatInteractionChannel {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatInteractionTeam {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatInteractionAction {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// Checks the content bound: non-empty UTF-8, at most `max_kb` KiB.
///
/// Content exactly at the bound passes; one byte over rejects.
pub fn validate_content(content: &str, max_kb: usize) -> Result<(), SwitchboardError> {
    if content.trim().is_empty() {
        return Err(SwitchboardError::BadRequest(
            "content must not be empty".to_string(),
        ));
    }
    let max_bytes = max_kb * 1024;
    if content.len() > max_bytes {
        return Err(SwitchboardError::BadRequest(format!(
            "content exceeds maximum size of {max_kb} KiB"
        )));
    }
    Ok(())
}

/// Builds the normalized record for a turn. The router assigns the request
/// id; `user_id` is the authenticated subject.
#[allow(clippy::too_many_arguments)]
pub fn build_normalized(
    user_id: &str,
    session_id: &str,
    surface: SurfaceKind,
    handles: SurfaceHandles,
    content: String,
    target_agent_id: Option<String>,
    forced_integration: Option<IntegrationKind>,
    integration_context: ContextBag,
) -> NormalizedRequest {
    NormalizedRequest {
        request_id: new_id(),
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        surface,
        handles,
        content,
        target_agent_id,
        forced_integration,
        created_at: Utc::now(),
        integration_context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_at_bound_passes_one_byte_over_rejects() {
        let at_bound = "a".repeat(64 * 1024);
        assert!(validate_content(&at_bound, 64).is_ok());

        let over = "a".repeat(64 * 1024 + 1);
        assert!(matches!(
            validate_content(&over, 64),
            Err(SwitchboardError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_content_rejects() {
        assert!(validate_content("", 64).is_err());
        assert!(validate_content("   ", 64).is_err());
    }

    #[test]
    fn web_request_rejects_unknown_fields() {
        let result: Result<WebRequest, _> =
            serde_json::from_str(r#"{"user_id":"alice","content":"hi","role":"admin"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn tool_request_requires_trigger_event() {
        let result: Result<ToolRequest, _> = serde_json::from_str(
            r#"{"user_id":"svc-snow","content":"laptop refresh","tool_id":"snow"}"#,
        );
        assert!(result.is_err());

        let ok: ToolRequest = serde_json::from_str(
            r#"{"user_id":"svc-snow","content":"laptop refresh","tool_id":"snow",
                "trigger_event":"asset.refresh.due"}"#,
        )
        .unwrap();
        assert_eq!(ok.trigger_event, "asset.refresh.due");
    }

    #[test]
    fn chat_envelope_parses_url_verification() {
        let envelope: ChatEventEnvelope =
            serde_json::from_str(r#"{"type":"url_verification","challenge":"c123"}"#).unwrap();
        assert_eq!(envelope.kind, "url_verification");
        assert_eq!(envelope.challenge.as_deref(), Some("c123"));
    }

    #[test]
    fn chat_envelope_parses_message_event() {
        let envelope: ChatEventEnvelope = serde_json::from_str(
            r#"{"type":"event_callback","team_id":"W1","event":{
                "type":"message","user":"U7","text":"hello",
                "channel":"C1","ts":"123.456"}}"#,
        )
        .unwrap();
        let event = envelope.event.unwrap();
        assert_eq!(event.user.as_deref(), Some("U7"));
        assert_eq!(event.thread_ts, None);
    }

    #[test]
    fn normalized_request_gets_a_fresh_id() {
        let a = build_normalized(
            "alice",
            "sess-1",
            SurfaceKind::Web,
            SurfaceHandles::default(),
            "hi".into(),
            None,
            None,
            Map::new(),
        );
        let b = build_normalized(
            "alice",
            "sess-1",
            SurfaceKind::Web,
            SurfaceHandles::default(),
            "hi".into(),
            None,
            None,
            Map::new(),
        );
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.user_id, "alice");
    }
}
