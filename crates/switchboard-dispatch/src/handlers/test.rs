// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console test sink.
//!
//! Writes one structured JSON line per delivery to stdout and nothing else.
//! Used in development and CI to observe the full pipeline without any
//! external dependency.

use async_trait::async_trait;
use serde_json::json;
use switchboard_core::{
    AttemptOutcome, DeliveryPayload, EffectiveConfig, IntegrationHandler, IntegrationKind,
    SwitchboardError,
};

/// Handler for the test integration kind.
pub struct TestHandler;

#[async_trait]
impl IntegrationHandler for TestHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Test
    }

    async fn deliver(
        &self,
        _config: &EffectiveConfig,
        payload: &DeliveryPayload,
        attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError> {
        let line = json!({
            "delivery": "test",
            "request_id": payload.request_id,
            "session_id": payload.session_id,
            "user_id": payload.user_id,
            "agent_id": payload.agent_id,
            "attempt": attempt,
            "idempotency_key": payload.idempotency_key(IntegrationKind::Test, attempt),
            "body": payload.body,
        });
        println!("{line}");
        Ok(AttemptOutcome::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use switchboard_core::DeliveryOutcome;

    #[tokio::test]
    async fn always_succeeds() {
        let handler = TestHandler;
        let payload = DeliveryPayload {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
            user_id: "alice".into(),
            agent_id: None,
            subject: None,
            body: "hello".into(),
            metadata: Map::new(),
        };
        let config = EffectiveConfig {
            user_id: "alice".into(),
            kind: IntegrationKind::Test,
            enabled: true,
            config: Map::new(),
            priority: 0,
            retry_count: 0,
            retry_delay_seconds: 0,
            user_override: false,
        };
        let outcome = handler.deliver(&config, &payload, 1).await.unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Success);
        assert!(handler.health_check().await);
    }
}
