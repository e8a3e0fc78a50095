// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Communication substrate strategy contract.
//!
//! Two interchangeable strategies implement this trait: the broker-backed
//! pub/sub transport and the direct-HTTP transport used in development and
//! CI. Callers must not be able to observe which one is active: every log
//! line, store mutation, and retry that happens on one path happens on the
//! other, and the conformance tests in `switchboard-transport` compare the
//! two on identical traces.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;
use crate::types::{CompletedResponse, NormalizedRequest};

/// Which concrete strategy a transport is, for boot-time logging only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Broker,
    DirectHttp,
}

/// Strategy-selectable transport shared by router, worker, and dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hands a normalized request to the agent worker. Returns once the
    /// request is accepted (broker ack, or the direct call has completed
    /// and the response is persisted).
    async fn send_request(&self, request: &NormalizedRequest) -> Result<(), SwitchboardError>;

    /// Awaits the completed response for a request id.
    ///
    /// Returns `Timeout` when the deadline elapses; the response, if it
    /// arrives later, is still persisted and delivered asynchronously.
    async fn await_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<CompletedResponse, SwitchboardError>;

    /// Hands a completed response to the integration dispatcher.
    async fn publish_response(&self, response: &CompletedResponse)
        -> Result<(), SwitchboardError>;

    /// The active strategy.
    fn mode(&self) -> TransportMode;
}
