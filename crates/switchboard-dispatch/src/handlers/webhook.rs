// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic HTTP webhook delivery handler.
//!
//! Per-user config bag:
//! - `url` (required)
//! - `method` (default POST)
//! - `headers` (object of extra headers)
//! - `auth` (`{"type": "bearer"|"api_key"|"basic", ...}`)
//! - `verify_tls` (default true)
//! - `timeout_seconds` (default from dispatcher config)
//!
//! The body is the canonical JSON envelope; every attempt carries the
//! idempotency key header so receivers can deduplicate redeliveries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use switchboard_core::{
    AttemptOutcome, ContextBag, DeliveryPayload, EffectiveConfig, IntegrationHandler,
    IntegrationKind, SwitchboardError,
};
use tracing::debug;

use crate::handlers::chat::classify_status;

/// Header carrying the `(request, kind, attempt)` idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// Handler for the webhook integration kind.
pub struct WebhookHandler {
    http: reqwest::Client,
    default_timeout: Duration,
}

impl WebhookHandler {
    pub fn new(default_timeout: Duration) -> Result<Self, SwitchboardError> {
        let http = reqwest::Client::builder()
            .timeout(default_timeout)
            .build()
            .map_err(|e| SwitchboardError::Delivery {
                message: format!("failed to build webhook HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            default_timeout,
        })
    }

    /// Client for one delivery: the pooled default, or a one-off client
    /// when the config disables TLS verification.
    fn client_for(&self, bag: &ContextBag) -> Result<reqwest::Client, SwitchboardError> {
        let verify_tls = bag
            .get("verify_tls")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if verify_tls {
            return Ok(self.http.clone());
        }
        reqwest::Client::builder()
            .timeout(self.default_timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| SwitchboardError::Delivery {
                message: format!("failed to build webhook HTTP client: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl IntegrationHandler for WebhookHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Webhook
    }

    async fn deliver(
        &self,
        config: &EffectiveConfig,
        payload: &DeliveryPayload,
        attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError> {
        let bag = &config.config;

        let Some(url) = bag.get("url").and_then(|v| v.as_str()) else {
            return Ok(AttemptOutcome::failed("no webhook url configured", false));
        };

        let method = bag
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("POST");
        let method = match method.to_ascii_uppercase().parse::<Method>() {
            Ok(method) => method,
            Err(_) => {
                return Ok(AttemptOutcome::failed(
                    format!("invalid webhook method {method}"),
                    false,
                ))
            }
        };

        let client = self.client_for(bag)?;
        let timeout = bag
            .get("timeout_seconds")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut request = client
            .request(method, url)
            .timeout(timeout)
            .header(
                IDEMPOTENCY_HEADER,
                payload.idempotency_key(IntegrationKind::Webhook, attempt),
            )
            .json(payload);

        if let Some(headers) = bag.get("headers").and_then(|v| v.as_object()) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }

        if let Some(auth) = bag.get("auth").and_then(|v| v.as_object()) {
            request = match auth.get("type").and_then(|v| v.as_str()) {
                Some("bearer") => match auth.get("token").and_then(|v| v.as_str()) {
                    Some(token) => request.bearer_auth(token),
                    None => {
                        return Ok(AttemptOutcome::failed("bearer auth without token", false))
                    }
                },
                Some("api_key") => {
                    let header = auth
                        .get("header")
                        .and_then(|v| v.as_str())
                        .unwrap_or("X-API-Key");
                    match auth.get("key").and_then(|v| v.as_str()) {
                        Some(key) => request.header(header, key),
                        None => {
                            return Ok(AttemptOutcome::failed("api_key auth without key", false))
                        }
                    }
                }
                Some("basic") => {
                    let username = auth.get("username").and_then(|v| v.as_str()).unwrap_or("");
                    let password = auth.get("password").and_then(|v| v.as_str());
                    request.basic_auth(username, password)
                }
                Some(other) => {
                    return Ok(AttemptOutcome::failed(
                        format!("unknown webhook auth type {other}"),
                        false,
                    ))
                }
                None => request,
            };
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url, %status, attempt, "webhook delivery response");
                Ok(classify_status(status))
            }
            Err(e) => Ok(AttemptOutcome::failed(format!("webhook call failed: {e}"), true)),
        }
    }
}
