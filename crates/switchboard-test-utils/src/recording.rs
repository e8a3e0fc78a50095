// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording delivery sink for asserting fan-out behavior.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use switchboard_core::{
    AttemptOutcome, DeliveryPayload, EffectiveConfig, IntegrationHandler, IntegrationKind,
    SwitchboardError,
};

/// One recorded delivery.
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub kind: IntegrationKind,
    pub payload: DeliveryPayload,
    pub attempt: u32,
    pub idempotency_key: String,
}

/// Handler that records every delivery and optionally fails the first N.
pub struct RecordingHandler {
    kind: IntegrationKind,
    deliveries: Arc<Mutex<Vec<RecordedDelivery>>>,
    failures_before_success: Mutex<u32>,
}

impl RecordingHandler {
    pub fn new(kind: IntegrationKind) -> (Arc<Self>, Arc<Mutex<Vec<RecordedDelivery>>>) {
        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(Self {
            kind,
            deliveries: deliveries.clone(),
            failures_before_success: Mutex::new(0),
        });
        (handler, deliveries)
    }

    /// Makes the next `n` deliveries fail with a retryable outcome.
    pub fn fail_next(&self, n: u32) {
        *self.failures_before_success.lock().unwrap() = n;
    }
}

#[async_trait]
impl IntegrationHandler for RecordingHandler {
    fn kind(&self) -> IntegrationKind {
        self.kind
    }

    async fn deliver(
        &self,
        _config: &EffectiveConfig,
        payload: &DeliveryPayload,
        attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError> {
        self.deliveries.lock().unwrap().push(RecordedDelivery {
            kind: self.kind,
            payload: payload.clone(),
            attempt,
            idempotency_key: payload.idempotency_key(self.kind, attempt),
        });

        let mut remaining = self.failures_before_success.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            Ok(AttemptOutcome::failed("simulated upstream 503", true))
        } else {
            Ok(AttemptOutcome::success())
        }
    }
}
