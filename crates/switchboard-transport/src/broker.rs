// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker-backed transport strategy.
//!
//! Events are published to the broker ingress in CloudEvents binary content
//! mode: the envelope fields travel as `ce-*` headers and the body is the
//! JSON data payload. The broker routes per event type to the subscribed
//! services, redelivering at-least-once; subscribers are responsible for
//! idempotency.

use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{
    envelope::sources, CompletedResponse, EventEnvelope, NormalizedRequest, SwitchboardError,
    Transport, TransportMode,
};
use switchboard_store::Database;
use tracing::{debug, error};

use crate::poll;

/// CloudEvents binary-mode header names.
pub mod ce_headers {
    pub const ID: &str = "ce-id";
    pub const SOURCE: &str = "ce-source";
    pub const TYPE: &str = "ce-type";
    pub const SUBJECT: &str = "ce-subject";
    pub const TIME: &str = "ce-time";
    pub const SPECVERSION: &str = "ce-specversion";
}

/// Rebuilds an envelope from binary-mode parts extracted at an intake
/// endpoint. `id`, `type`, and `source` are mandatory.
pub fn decode_binary(
    id: Option<String>,
    event_type: Option<String>,
    source: Option<String>,
    subject: Option<String>,
    time: Option<String>,
    body: &[u8],
) -> Result<EventEnvelope, SwitchboardError> {
    let data = serde_json::from_slice(body)
        .map_err(|e| SwitchboardError::BadRequest(format!("event body is not JSON: {e}")))?;
    Ok(EventEnvelope {
        specversion: "1.0".to_string(),
        id: id.ok_or_else(|| SwitchboardError::BadRequest("missing ce-id header".into()))?,
        source: source
            .ok_or_else(|| SwitchboardError::BadRequest("missing ce-source header".into()))?,
        event_type: event_type
            .ok_or_else(|| SwitchboardError::BadRequest("missing ce-type header".into()))?,
        subject: subject.unwrap_or_default(),
        time: time
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_else(chrono::Utc::now),
        datacontenttype: "application/json".to_string(),
        data,
    })
}

/// Transport that publishes envelopes to a broker ingress URL.
pub struct BrokerTransport {
    http: reqwest::Client,
    broker_url: String,
    source: &'static str,
    db: Database,
    poll_interval: Duration,
}

impl BrokerTransport {
    pub fn new(
        broker_url: String,
        db: Database,
        poll_interval: Duration,
    ) -> Result<Self, SwitchboardError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SwitchboardError::Transport {
                message: format!("failed to build broker HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            broker_url,
            source: sources::ROUTER,
            db,
            poll_interval,
        })
    }

    /// Overrides the event source identity (the worker and dispatcher
    /// publish under their own names).
    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), SwitchboardError> {
        let response = self
            .http
            .post(&self.broker_url)
            .header(ce_headers::ID, &envelope.id)
            .header(ce_headers::SOURCE, &envelope.source)
            .header(ce_headers::TYPE, &envelope.event_type)
            .header(ce_headers::SUBJECT, &envelope.subject)
            .header(ce_headers::TIME, envelope.time.to_rfc3339())
            .header(ce_headers::SPECVERSION, &envelope.specversion)
            .json(&envelope.data)
            .send()
            .await
            .map_err(|e| SwitchboardError::Transport {
                message: format!("broker publish failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(event_id = envelope.id.as_str(), %status, "broker rejected event");
            return Err(SwitchboardError::Transport {
                message: format!("broker returned {status}"),
                source: None,
            });
        }

        debug!(
            event_id = envelope.id.as_str(),
            event_type = envelope.event_type.as_str(),
            "event published"
        );
        Ok(())
    }
}

#[async_trait]
impl Transport for BrokerTransport {
    async fn send_request(&self, request: &NormalizedRequest) -> Result<(), SwitchboardError> {
        let envelope = EventEnvelope::request_created(self.source, request)?;
        self.publish(&envelope).await
    }

    async fn await_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<CompletedResponse, SwitchboardError> {
        poll::await_completed(&self.db, request_id, timeout, self.poll_interval).await
    }

    async fn publish_response(
        &self,
        response: &CompletedResponse,
    ) -> Result<(), SwitchboardError> {
        let envelope = EventEnvelope::response_ready(self.source, response)?;
        self.publish(&envelope).await
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Broker
    }
}
