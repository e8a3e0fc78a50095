// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct-HTTP transport strategy.
//!
//! No broker: `send_request` POSTs the normalized request straight to the
//! Agent Worker (which persists the response before replying), and
//! `publish_response` POSTs to the Integration Dispatcher. Used in
//! development and CI; callers observe the same behavior as the broker
//! strategy.

use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{
    CompletedResponse, NormalizedRequest, SwitchboardError, Transport, TransportMode,
};
use switchboard_store::Database;
use tracing::debug;

use crate::poll;

/// Transport that calls the worker and dispatcher directly.
pub struct DirectTransport {
    http: reqwest::Client,
    worker_url: String,
    dispatcher_url: String,
    db: Database,
    poll_interval: Duration,
}

impl DirectTransport {
    pub fn new(
        worker_url: String,
        dispatcher_url: String,
        db: Database,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SwitchboardError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SwitchboardError::Transport {
                message: format!("failed to build direct HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            worker_url,
            dispatcher_url,
            db,
            poll_interval,
        })
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send_request(&self, request: &NormalizedRequest) -> Result<(), SwitchboardError> {
        let url = format!("{}/process", self.worker_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| SwitchboardError::Transport {
                message: format!("worker call failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(SwitchboardError::Transport {
                message: format!("worker returned {}", response.status()),
                source: None,
            });
        }

        debug!(
            request_id = request.request_id.as_str(),
            "request sent via direct HTTP"
        );
        Ok(())
    }

    async fn await_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<CompletedResponse, SwitchboardError> {
        // The worker persisted the response before acknowledging, so the
        // first probe normally returns immediately.
        poll::await_completed(&self.db, request_id, timeout, self.poll_interval).await
    }

    async fn publish_response(
        &self,
        response: &CompletedResponse,
    ) -> Result<(), SwitchboardError> {
        let url = format!("{}/deliver", self.dispatcher_url.trim_end_matches('/'));
        let http_response = self
            .http
            .post(&url)
            .json(response)
            .send()
            .await
            .map_err(|e| SwitchboardError::Transport {
                message: format!("dispatcher call failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        if !http_response.status().is_success() {
            return Err(SwitchboardError::Transport {
                message: format!("dispatcher returned {}", http_response.status()),
                source: None,
            });
        }

        debug!(
            request_id = response.request_id.as_str(),
            "response delivered via direct HTTP"
        );
        Ok(())
    }

    fn mode(&self) -> TransportMode {
        TransportMode::DirectHttp
    }
}
