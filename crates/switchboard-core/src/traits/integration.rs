// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration handler contract for outbound delivery channels.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{AttemptOutcome, DeliveryPayload, EffectiveConfig, IntegrationKind};

/// One outbound delivery channel (chat, email, webhook, test sink).
///
/// Handlers never surface failures to the requesting user; they report an
/// [`AttemptOutcome`] and the dispatcher decides whether to retry.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// The kind this handler serves.
    fn kind(&self) -> IntegrationKind;

    /// Delivers one payload under the user's effective config.
    ///
    /// `attempt` is 1-based and contiguous per `(request, kind)`; handlers
    /// include the derived idempotency key so receivers can deduplicate.
    async fn deliver(
        &self,
        config: &EffectiveConfig,
        payload: &DeliveryPayload,
        attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError>;

    /// Cheap reachability probe for the detailed health endpoint.
    async fn health_check(&self) -> bool {
        true
    }
}
