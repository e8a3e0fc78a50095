// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery attempt log (append-only) and the persistent retry schedule.

use rusqlite::params;
use switchboard_core::{
    DeliveryOutcome, DeliveryPayload, EffectiveConfig, IntegrationKind, SwitchboardError,
};

use crate::database::Database;
use crate::models::{DeliveryLogRecord, RetryScheduleRecord};

fn row_to_delivery(row: &rusqlite::Row<'_>) -> Result<DeliveryLogRecord, rusqlite::Error> {
    Ok(DeliveryLogRecord {
        id: row.get(0)?,
        request_id: row.get(1)?,
        user_id: row.get(2)?,
        kind: row.get(3)?,
        attempt: row.get::<_, i64>(4)? as u32,
        outcome: row.get(5)?,
        error_message: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

const DELIVERY_COLUMNS: &str =
    "id, request_id, user_id, kind, attempt, outcome, error_message, started_at, completed_at";

/// Open the next attempt row for `(request, kind)` with outcome `pending`.
///
/// The attempt index is `max(existing) + 1`, computed and inserted in one
/// transaction so indices stay contiguous under concurrency; the UNIQUE
/// constraint backstops a race between replicas.
pub async fn begin_attempt(
    db: &Database,
    request_id: &str,
    user_id: &str,
    kind: IntegrationKind,
) -> Result<(i64, u32), SwitchboardError> {
    let request_id = request_id.to_string();
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let attempt: i64 = tx.query_row(
                "SELECT COALESCE(MAX(attempt), 0) + 1 FROM delivery_logs
                 WHERE request_id = ?1 AND kind = ?2",
                params![request_id, kind],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO delivery_logs (request_id, user_id, kind, attempt)
                 VALUES (?1, ?2, ?3, ?4)",
                params![request_id, user_id, kind, attempt],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok((id, attempt as u32))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Close an attempt row with its final outcome.
pub async fn finish_attempt(
    db: &Database,
    attempt_row_id: i64,
    outcome: DeliveryOutcome,
    error_message: Option<&str>,
) -> Result<(), SwitchboardError> {
    let outcome = outcome.to_string();
    let error_message = error_message.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE delivery_logs
                 SET outcome = ?2,
                     error_message = ?3,
                     completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![attempt_row_id, outcome, error_message],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All attempts for `(request, kind)`, in attempt order.
pub async fn list_attempts(
    db: &Database,
    request_id: &str,
    kind: IntegrationKind,
) -> Result<Vec<DeliveryLogRecord>, SwitchboardError> {
    let request_id = request_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DELIVERY_COLUMNS} FROM delivery_logs
                 WHERE request_id = ?1 AND kind = ?2 ORDER BY attempt ASC"
            ))?;
            let rows = stmt.query_map(params![request_id, kind], row_to_delivery)?;
            let mut attempts = Vec::new();
            for row in rows {
                attempts.push(row?);
            }
            Ok(attempts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// A user's delivery history, newest first.
pub async fn list_user_deliveries(
    db: &Database,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<DeliveryLogRecord>, SwitchboardError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DELIVERY_COLUMNS} FROM delivery_logs
                 WHERE user_id = ?1 ORDER BY started_at DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(
                params![user_id, limit as i64, offset as i64],
                row_to_delivery,
            )?;
            let mut deliveries = Vec::new();
            for row in rows {
                deliveries.push(row?);
            }
            Ok(deliveries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Schedule the next attempt for a failed delivery.
///
/// The payload and the effective config are frozen into the row so the
/// retry survives a restart and replays under the settings in force at
/// failure time.
pub async fn schedule_retry(
    db: &Database,
    payload: &DeliveryPayload,
    config: &EffectiveConfig,
    attempts_done: u32,
    delay_seconds: u64,
) -> Result<(), SwitchboardError> {
    let payload_json = serde_json::to_string(payload)
        .map_err(|e| SwitchboardError::Internal(format!("payload encode: {e}")))?;
    let config_json = serde_json::to_string(config)
        .map_err(|e| SwitchboardError::Internal(format!("config encode: {e}")))?;
    let request_id = payload.request_id.clone();
    let kind = config.kind.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_retries
                     (request_id, kind, next_attempt_at, attempts_done, payload, config)
                 VALUES (?1, ?2,
                     strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '+' || ?3 || ' seconds'),
                     ?4, ?5, ?6)
                 ON CONFLICT (request_id, kind) DO UPDATE SET
                     next_attempt_at = excluded.next_attempt_at,
                     attempts_done = excluded.attempts_done,
                     payload = excluded.payload,
                     config = excluded.config",
                params![
                    request_id,
                    kind,
                    delay_seconds as i64,
                    attempts_done as i64,
                    payload_json,
                    config_json,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Claim all due retries: selects and deletes them in one transaction.
///
/// Each attempt is a fresh claim; if it fails again the dispatcher
/// re-schedules, so a crash between claim and attempt costs at most one
/// redundant delivery (the receiver-side idempotency key covers that).
pub async fn take_due_retries(
    db: &Database,
) -> Result<Vec<RetryScheduleRecord>, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let due = {
                let mut stmt = tx.prepare(
                    "SELECT request_id, kind, next_attempt_at, attempts_done, payload, config
                     FROM delivery_retries
                     WHERE next_attempt_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY next_attempt_at ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(RetryScheduleRecord {
                        request_id: row.get(0)?,
                        kind: row.get(1)?,
                        next_attempt_at: row.get(2)?,
                        attempts_done: row.get::<_, i64>(3)? as u32,
                        payload: row.get(4)?,
                        config: row.get(5)?,
                    })
                })?;
                let mut due = Vec::new();
                for row in rows {
                    due.push(row?);
                }
                due
            };
            for record in &due {
                tx.execute(
                    "DELETE FROM delivery_retries WHERE request_id = ?1 AND kind = ?2",
                    params![record.request_id, record.kind],
                )?;
            }
            tx.commit()?;
            Ok(due)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically claim an event for one consuming component.
///
/// Returns `true` when this caller is the single winner for
/// `(event, component)`; replicas of the same component that lose the
/// insert skip the event. `claimed_by` records the winning instance.
pub async fn claim_event(
    db: &Database,
    event_id: &str,
    component: &str,
    claimed_by: &str,
) -> Result<bool, SwitchboardError> {
    let event_id = event_id.to_string();
    let component = component.to_string();
    let claimed_by = claimed_by.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO event_claims (event_id, component, claimed_by)
                 VALUES (?1, ?2, ?3)",
                params![event_id, component, claimed_by],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the processing result on a claimed event.
pub async fn record_event_result(
    db: &Database,
    event_id: &str,
    component: &str,
    request_id: Option<&str>,
    session_id: Option<&str>,
    result: &str,
    error_message: Option<&str>,
) -> Result<(), SwitchboardError> {
    let event_id = event_id.to_string();
    let component = component.to_string();
    let request_id = request_id.map(|s| s.to_string());
    let session_id = session_id.map(|s| s.to_string());
    let result = result.to_string();
    let error_message = error_message.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE event_claims
                 SET request_id = ?3, session_id = ?4, result = ?5, error_message = ?6
                 WHERE event_id = ?1 AND component = ?2",
                params![event_id, component, request_id, session_id, result, error_message],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
