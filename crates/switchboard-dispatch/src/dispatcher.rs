// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fan-out engine.
//!
//! For one completed response: resolve the user's enabled integrations via
//! the effective-config overlay, dispatch to every kind concurrently, log
//! one `DeliveryLog` row per attempt, and schedule persistent retries for
//! retryable failures. Delivery failures are never surfaced to the
//! requesting user.

use std::collections::HashMap;
use std::sync::Arc;

use switchboard_core::{
    AttemptOutcome, DeliveryOutcome, DeliveryPayload, EffectiveConfig, IntegrationHandler,
    IntegrationKind, SwitchboardError,
};
use switchboard_store::queries::{deliveries, integrations};
use switchboard_store::Database;
use tracing::{error, info, warn};

/// Shared state for the Integration Dispatcher.
#[derive(Clone)]
pub struct DispatchState {
    pub db: Database,
    pub handlers: Arc<HashMap<IntegrationKind, Arc<dyn IntegrationHandler>>>,
    /// Identity used in event claims (hostname + pid by default).
    pub instance_id: String,
}

/// Result of one kind's dispatch, reported to the intake caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResult {
    pub kind: IntegrationKind,
    pub attempt: u32,
    pub outcome: DeliveryOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fans a payload out to every enabled integration for the user.
///
/// Kinds run concurrently; within one response there is no cross-kind
/// ordering. An empty fan-out is not an error (the user simply has nothing
/// configured).
pub async fn dispatch_response(
    state: &DispatchState,
    payload: &DeliveryPayload,
) -> Result<Vec<DispatchResult>, SwitchboardError> {
    let mut fanout = integrations::effective_fanout(&state.db, &payload.user_id).await?;

    // A surface-forced kind restricts the fan-out: a chat reply goes back to
    // the originating thread, not to every channel the user has configured.
    if let Some(forced) = payload
        .metadata
        .get("forced_integration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<IntegrationKind>().ok())
    {
        fanout.retain(|config| config.kind == forced);
    }

    if fanout.is_empty() {
        info!(
            user_id = payload.user_id.as_str(),
            request_id = payload.request_id.as_str(),
            "no integrations configured for user"
        );
        return Ok(Vec::new());
    }

    info!(
        user_id = payload.user_id.as_str(),
        request_id = payload.request_id.as_str(),
        kinds = fanout.len(),
        "dispatching response"
    );

    let results = futures::future::join_all(
        fanout
            .into_iter()
            .map(|config| attempt_delivery(state, config, payload.clone())),
    )
    .await;

    Ok(results.into_iter().flatten().collect())
}

/// Runs one delivery attempt for `(payload, kind)` and schedules a retry on
/// retryable failure.
///
/// The authoritative attempt index comes from the delivery log, so indices
/// stay contiguous whether the call comes from first dispatch or the retry
/// sweeper.
pub async fn attempt_delivery(
    state: &DispatchState,
    config: EffectiveConfig,
    payload: DeliveryPayload,
) -> Option<DispatchResult> {
    let handler = match state.handlers.get(&config.kind) {
        Some(handler) => handler.clone(),
        None => {
            // A kind present in the table type but not registered at boot.
            warn!(kind = %config.kind, "no handler registered for integration kind, dropping");
            return None;
        }
    };

    let (row_id, attempt) = match deliveries::begin_attempt(
        &state.db,
        &payload.request_id,
        &payload.user_id,
        config.kind,
    )
    .await
    {
        Ok(pair) => pair,
        Err(e) => {
            error!(kind = %config.kind, error = %e, "failed to open delivery attempt");
            return None;
        }
    };

    let outcome = match handler.deliver(&config, &payload, attempt).await {
        Ok(outcome) => outcome,
        Err(e) => AttemptOutcome::failed(e.to_string(), e.is_retryable()),
    };

    if let Err(e) = deliveries::finish_attempt(
        &state.db,
        row_id,
        outcome.outcome,
        outcome.message.as_deref(),
    )
    .await
    {
        error!(kind = %config.kind, error = %e, "failed to record delivery outcome");
    }

    match outcome.outcome {
        DeliveryOutcome::Success => {
            info!(
                kind = %config.kind,
                request_id = payload.request_id.as_str(),
                attempt,
                "delivery succeeded"
            );
        }
        _ => {
            warn!(
                kind = %config.kind,
                request_id = payload.request_id.as_str(),
                attempt,
                error = outcome.message.as_deref().unwrap_or("unknown"),
                "delivery failed"
            );
            if outcome.retryable && attempt < config.retry_count {
                let delay = retry_delay_seconds(&config, attempt);
                if let Err(e) =
                    deliveries::schedule_retry(&state.db, &payload, &config, attempt, delay).await
                {
                    error!(kind = %config.kind, error = %e, "failed to schedule retry");
                } else {
                    info!(
                        kind = %config.kind,
                        request_id = payload.request_id.as_str(),
                        next_attempt = attempt + 1,
                        delay_seconds = delay,
                        "retry scheduled"
                    );
                }
            }
        }
    }

    Some(DispatchResult {
        kind: config.kind,
        attempt,
        outcome: outcome.outcome,
        message: outcome.message,
    })
}

/// Spacing before the attempt after `attempts_done` failures.
///
/// Linear by default; exponential doubling when the config bag carries
/// `"backoff": "exponential"`.
fn retry_delay_seconds(config: &EffectiveConfig, attempts_done: u32) -> u64 {
    let base = config.retry_delay_seconds;
    match config.config.get("backoff").and_then(|v| v.as_str()) {
        Some("exponential") => base.saturating_mul(1u64 << attempts_done.saturating_sub(1).min(16)),
        _ => base,
    }
}
