// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat delivery handler.
//!
//! Posts the response to the chat platform's message API with the bot
//! token, threading the reply when the originating thread handle is known.
//! The channel comes from the user's config bag, falling back to the
//! handles captured on the payload metadata.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use switchboard_core::{
    AttemptOutcome, DeliveryPayload, EffectiveConfig, IntegrationHandler, IntegrationKind,
    SwitchboardError,
};
use tracing::debug;

/// Handler for the chat integration kind.
pub struct ChatHandler {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: Option<String>,
}

impl ChatHandler {
    pub fn new(
        api_base_url: String,
        bot_token: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, SwitchboardError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchboardError::Delivery {
                message: format!("failed to build chat HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token,
        })
    }
}

#[async_trait]
impl IntegrationHandler for ChatHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Chat
    }

    async fn deliver(
        &self,
        config: &EffectiveConfig,
        payload: &DeliveryPayload,
        attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError> {
        let Some(token) = &self.bot_token else {
            // Terminal: retrying cannot conjure a token.
            return Ok(AttemptOutcome::failed("chat bot token not configured", false));
        };

        // Destination: config bag first, then the surface handles the
        // router captured on the originating request.
        let channel = config
            .config
            .get("channel")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| {
                payload
                    .metadata
                    .get("channel_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            });
        let Some(channel) = channel else {
            return Ok(AttemptOutcome::failed("no chat channel resolved for user", false));
        };
        let thread = payload.metadata.get("thread_id").and_then(|v| v.as_str());

        let mut body = json!({
            "channel": channel,
            "text": payload.body,
        });
        if let Some(thread) = thread {
            body["thread"] = json!(thread);
        }

        let url = format!("{}/messages", self.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(
                "X-Idempotency-Key",
                payload.idempotency_key(IntegrationKind::Chat, attempt),
            )
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Ok(AttemptOutcome::failed(format!("chat post failed: {e}"), true)),
        };

        let status = response.status();
        debug!(%status, channel = channel.as_str(), "chat delivery response");
        Ok(classify_status(status))
    }

    async fn health_check(&self) -> bool {
        self.bot_token.is_some()
    }
}

/// HTTP outcome classification shared by the HTTP-shaped handlers:
/// network errors, 5xx, and 429 are retryable; other 4xx are terminal.
pub(crate) fn classify_status(status: StatusCode) -> AttemptOutcome {
    if status.is_success() {
        AttemptOutcome::success()
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AttemptOutcome::failed(format!("upstream returned {status}"), true)
    } else {
        AttemptOutcome::failed(format!("upstream returned {status}"), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::time::Duration;
    use switchboard_core::DeliveryOutcome;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(channel: Option<&str>) -> EffectiveConfig {
        let mut bag = Map::new();
        if let Some(channel) = channel {
            bag.insert("channel".into(), json!(channel));
        }
        EffectiveConfig {
            user_id: "alice".into(),
            kind: IntegrationKind::Chat,
            enabled: true,
            config: bag,
            priority: 0,
            retry_count: 3,
            retry_delay_seconds: 30,
            user_override: true,
        }
    }

    fn payload() -> DeliveryPayload {
        let mut metadata = Map::new();
        metadata.insert("thread_id".into(), json!("T100"));
        DeliveryPayload {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
            user_id: "alice".into(),
            agent_id: Some("routing-agent".into()),
            subject: None,
            body: "here you go".into(),
            metadata,
        }
    }

    #[tokio::test]
    async fn posts_threaded_message_with_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(header_exists("x-idempotency-key"))
            .and(body_partial_json(json!({
                "channel": "C42",
                "text": "here you go",
                "thread": "T100"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let handler = ChatHandler::new(
            server.uri(),
            Some("xoxb-test".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let outcome = handler
            .deliver(&config(Some("C42")), &payload(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Success);
    }

    #[tokio::test]
    async fn missing_channel_is_terminal() {
        let server = MockServer::start().await;
        let handler = ChatHandler::new(
            server.uri(),
            Some("xoxb-test".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let mut payload = payload();
        payload.metadata.clear();
        let outcome = handler.deliver(&config(None), &payload, 1).await.unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Failed);
        assert!(!outcome.retryable);
    }

    #[tokio::test]
    async fn rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let handler = ChatHandler::new(
            server.uri(),
            Some("xoxb-test".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let outcome = handler
            .deliver(&config(Some("C42")), &payload(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Failed);
        assert!(outcome.retryable);
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK).outcome, DeliveryOutcome::Success);
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).retryable);
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).retryable);
        assert!(!classify_status(StatusCode::FORBIDDEN).retryable);
        assert!(!classify_status(StatusCode::NOT_FOUND).retryable);
    }
}
