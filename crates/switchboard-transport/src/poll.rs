// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-backed response rendezvous.
//!
//! Both strategies resolve `await_response` the same way: poll the request
//! log until the worker has completed it. On the direct path the response
//! is already persisted when the poll starts, so the first probe returns;
//! on the broker path the poll bridges the gap until the `response.ready`
//! event lands. Keeping one implementation is what makes the two strategies
//! observably identical here.

use std::time::Duration;

use switchboard_core::{CompletedResponse, SwitchboardError};
use switchboard_store::{queries::requests, Database};
use tracing::debug;

/// Polls the store for the completed response until the deadline.
pub async fn await_completed(
    db: &Database,
    request_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<CompletedResponse, SwitchboardError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(response) = requests::get_completed_response(db, request_id).await? {
            debug!(request_id, "response ready");
            return Ok(response);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(SwitchboardError::Timeout { duration: timeout });
        }
        tokio::time::sleep(poll_interval).await;
    }
}
