// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CloudEvents-shaped envelope used on the broker transport.
//!
//! Every event carries the structured top-level fields plus a typed JSON
//! `data` payload. The `subject` is always `session/<session_id>` so broker
//! triggers can filter per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SwitchboardError;
use crate::types::{CompletedResponse, ContextBag, NormalizedRequest};

/// Event types produced and consumed by the core services.
pub mod event_types {
    pub const REQUEST_CREATED: &str = "com.switchboard.request.created";
    pub const REQUEST_PROCESSING: &str = "com.switchboard.request.processing";
    pub const RESPONSE_READY: &str = "com.switchboard.response.ready";
    pub const DATABASE_UPDATE: &str = "com.switchboard.request.database-update";
}

/// Event source identifiers, one per service.
pub mod sources {
    pub const ROUTER: &str = "switchboard-router";
    pub const WORKER: &str = "switchboard-worker";
    pub const DISPATCHER: &str = "switchboard-dispatch";
}

/// Structured event envelope (CloudEvents 1.0 field shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub specversion: String,
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub subject: String,
    pub time: DateTime<Utc>,
    pub datacontenttype: String,
    pub data: Value,
}

impl EventEnvelope {
    /// Builds an envelope with a fresh event id for the given session.
    pub fn new(source: &str, event_type: &str, session_id: &str, data: Value) -> Self {
        Self {
            specversion: "1.0".to_string(),
            id: crate::types::new_id(),
            source: source.to_string(),
            event_type: event_type.to_string(),
            subject: format!("session/{session_id}"),
            time: Utc::now(),
            datacontenttype: "application/json".to_string(),
            data,
        }
    }

    /// `request.created` carrying the full normalized request.
    pub fn request_created(
        source: &str,
        request: &NormalizedRequest,
    ) -> Result<Self, SwitchboardError> {
        let data = serde_json::to_value(request)
            .map_err(|e| SwitchboardError::Internal(format!("envelope encode: {e}")))?;
        Ok(Self::new(
            source,
            event_types::REQUEST_CREATED,
            &request.session_id,
            data,
        ))
    }

    /// `request.processing` notification, emitted when a worker claims a turn.
    pub fn request_processing(source: &str, session_id: &str, request_id: &str, agent_id: &str) -> Self {
        Self::new(
            source,
            event_types::REQUEST_PROCESSING,
            session_id,
            json!({ "request_id": request_id, "agent_id": agent_id }),
        )
    }

    /// `response.ready` carrying the completed response.
    pub fn response_ready(
        source: &str,
        response: &CompletedResponse,
    ) -> Result<Self, SwitchboardError> {
        let data = serde_json::to_value(response)
            .map_err(|e| SwitchboardError::Internal(format!("envelope encode: {e}")))?;
        Ok(Self::new(
            source,
            event_types::RESPONSE_READY,
            &response.session_id,
            data,
        ))
    }

    /// `request.database-update` carrying a session context delta.
    pub fn database_update(source: &str, session_id: &str, context_delta: &ContextBag) -> Self {
        Self::new(
            source,
            event_types::DATABASE_UPDATE,
            session_id,
            json!({ "session_id": session_id, "context_delta": context_delta }),
        )
    }

    /// Decodes the `data` payload into a typed value.
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, SwitchboardError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            SwitchboardError::BadRequest(format!("malformed {} data: {e}", self.event_type))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SurfaceHandles, SurfaceKind};
    use serde_json::Map;

    fn sample_request() -> NormalizedRequest {
        NormalizedRequest {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
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

    #[test]
    fn request_created_envelope_shape() {
        let env = EventEnvelope::request_created(sources::ROUTER, &sample_request()).unwrap();
        assert_eq!(env.specversion, "1.0");
        assert_eq!(env.event_type, event_types::REQUEST_CREATED);
        assert_eq!(env.subject, "session/sess-1");
        assert_eq!(env.datacontenttype, "application/json");
        assert!(!env.id.is_empty());

        let back: NormalizedRequest = env.decode_data().unwrap();
        assert_eq!(back.request_id, "req-1");
    }

    #[test]
    fn envelope_type_field_renames_to_type() {
        let env = EventEnvelope::request_processing(sources::WORKER, "s", "r", "a");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], event_types::REQUEST_PROCESSING);
        assert!(json.get("event_type").is_none());
    }

    #[test]
    fn decode_data_rejects_mismatched_payload() {
        let env = EventEnvelope::new(sources::ROUTER, event_types::RESPONSE_READY, "s", json!("nope"));
        let result: Result<CompletedResponse, _> = env.decode_data();
        assert!(matches!(result, Err(SwitchboardError::BadRequest(_))));
    }
}
