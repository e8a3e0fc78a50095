// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background retry sweeper.
//!
//! Drains the persistent retry schedule on an interval. Each due row is a
//! fresh claim (selected and deleted atomically), so the schedule survives
//! restarts and horizontally scaled dispatchers never double-claim.

use std::time::Duration;

use switchboard_core::{DeliveryPayload, EffectiveConfig};
use switchboard_store::queries::deliveries;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::{attempt_delivery, DispatchState};

/// Runs the sweeper until cancelled.
pub async fn run_retry_sweeper(
    state: DispatchState,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(sweep_interval);
    // Skip the first immediate tick.
    interval.tick().await;

    info!(
        interval_secs = sweep_interval.as_secs(),
        "retry sweeper started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep_once(&state).await;
            }
            _ = cancel.cancelled() => {
                info!("retry sweeper shutting down");
                break;
            }
        }
    }
}

/// One sweep: claim everything due and re-attempt it.
pub async fn sweep_once(state: &DispatchState) {
    let due = match deliveries::take_due_retries(&state.db).await {
        Ok(due) => due,
        Err(e) => {
            warn!(error = %e, "retry sweep failed to read schedule");
            return;
        }
    };

    if due.is_empty() {
        return;
    }

    info!(count = due.len(), "re-attempting due deliveries");

    for record in due {
        let payload: DeliveryPayload = match serde_json::from_str(&record.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    request_id = record.request_id.as_str(),
                    error = %e,
                    "dropping retry with corrupt payload"
                );
                continue;
            }
        };
        let config: EffectiveConfig = match serde_json::from_str(&record.config) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    request_id = record.request_id.as_str(),
                    error = %e,
                    "dropping retry with corrupt config"
                );
                continue;
            }
        };

        attempt_delivery(state, config, payload).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use switchboard_core::{
        AttemptOutcome, IntegrationHandler, IntegrationKind, SwitchboardError,
    };
    use switchboard_store::Database;
    use tempfile::tempdir;

    struct CountingHandler {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl IntegrationHandler for CountingHandler {
        fn kind(&self) -> IntegrationKind {
            IntegrationKind::Webhook
        }

        async fn deliver(
            &self,
            _config: &switchboard_core::EffectiveConfig,
            _payload: &DeliveryPayload,
            _attempt: u32,
        ) -> Result<AttemptOutcome, SwitchboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AttemptOutcome::success())
        }
    }

    #[tokio::test]
    async fn sweep_replays_due_rows_once() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let mut handlers: HashMap<IntegrationKind, Arc<dyn IntegrationHandler>> = HashMap::new();
        handlers.insert(
            IntegrationKind::Webhook,
            Arc::new(CountingHandler { calls: calls.clone() }),
        );
        let state = DispatchState {
            db: db.clone(),
            handlers: Arc::new(handlers),
            instance_id: "test".into(),
        };

        let payload = DeliveryPayload {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
            user_id: "bob".into(),
            agent_id: None,
            subject: None,
            body: "hello".into(),
            metadata: Map::new(),
        };
        let config = switchboard_core::EffectiveConfig {
            user_id: "bob".into(),
            kind: IntegrationKind::Webhook,
            enabled: true,
            config: Map::new(),
            priority: 0,
            retry_count: 3,
            retry_delay_seconds: 0,
            user_override: true,
        };
        deliveries::schedule_retry(&db, &payload, &config, 1, 0)
            .await
            .unwrap();

        sweep_once(&state).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Nothing left: a second sweep is a no-op.
        sweep_once(&state).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
