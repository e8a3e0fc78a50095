// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! These types represent rows in the SQLite database. Timestamps are ISO
//! 8601 UTC strings as written by SQLite's `strftime`; JSON columns hold
//! serialized [`ContextBag`] values. The wire-level shared types live in
//! `switchboard-core::types`.

use serde::{Deserialize, Serialize};
use switchboard_core::{
    CompletedResponse, ContextBag, SwitchboardError,
};

/// A conversational session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    /// Surface kind string ("chat", "web", "cli", "tool", "generic").
    pub surface: String,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub external_user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub current_agent_id: Option<String>,
    /// Agent runtime conversation handle, created lazily on first turn.
    pub runtime_session_id: Option<String>,
    /// "active", "inactive", "completed", "error".
    pub status: String,
    /// Turn lock flag; at most one request in flight per session.
    pub in_flight: bool,
    pub lock_token: Option<String>,
    /// JSON conversation context bag.
    pub conversation_context: String,
    /// JSON integration metadata bag.
    pub integration_metadata: String,
    /// JSON user context bag.
    pub user_context: String,
    pub total_requests: i64,
    pub created_at: String,
    pub updated_at: String,
    pub last_activity_at: String,
}

impl SessionRecord {
    /// Parses the conversation context JSON column.
    pub fn context(&self) -> Result<ContextBag, SwitchboardError> {
        serde_json::from_str(&self.conversation_context)
            .map_err(|e| SwitchboardError::Internal(format!("corrupt session context: {e}")))
    }
}

/// One user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogRecord {
    pub request_id: String,
    pub session_id: String,
    pub surface: String,
    pub content: String,
    /// JSON-encoded `NormalizedRequest`.
    pub normalized: String,
    pub response_content: Option<String>,
    /// JSON metadata bag from the response, when complete.
    pub response_metadata: Option<String>,
    pub agent_id: Option<String>,
    pub processing_time_ms: Option<i64>,
    /// Transport event id/type, null on the direct-HTTP path.
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    /// "pending", "dispatched", "completed", "failed".
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl RequestLogRecord {
    /// Builds the completed response view, if the log is complete.
    pub fn completed_response(&self, user_id: &str) -> Option<CompletedResponse> {
        let content = self.response_content.clone()?;
        let metadata = self
            .response_metadata
            .as_deref()
            .and_then(|m| serde_json::from_str(m).ok())
            .unwrap_or_default();
        let completed_at = self
            .completed_at
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_else(chrono::Utc::now);
        Some(CompletedResponse {
            request_id: self.request_id.clone(),
            session_id: self.session_id.clone(),
            user_id: user_id.to_string(),
            agent_id: self.agent_id.clone().unwrap_or_default(),
            content,
            metadata,
            processing_time_ms: self.processing_time_ms.unwrap_or(0),
            completed_at,
        })
    }
}

/// One `(user, kind)` integration configuration row.
///
/// `user_id = ""` rows are the system defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfigRecord {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub enabled: bool,
    /// JSON kind-specific settings bag.
    pub config: String,
    pub priority: i32,
    pub retry_count: u32,
    pub retry_delay_seconds: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// One delivery attempt row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogRecord {
    pub id: i64,
    pub request_id: String,
    pub user_id: String,
    pub kind: String,
    /// 1-based, contiguous per (request, kind).
    pub attempt: u32,
    /// "success", "failed", "pending".
    pub outcome: String,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Persistent retry schedule row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryScheduleRecord {
    pub request_id: String,
    pub kind: String,
    pub next_attempt_at: String,
    pub attempts_done: u32,
    /// JSON-encoded `DeliveryPayload`.
    pub payload: String,
    /// JSON-encoded `EffectiveConfig` frozen at first failure.
    pub config: String,
}
