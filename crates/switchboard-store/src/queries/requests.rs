// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request log operations: append, the worker's dispatch claim, and
//! idempotent completion.

use rusqlite::params;
use switchboard_core::{CompletedResponse, NormalizedRequest, SwitchboardError};

use crate::database::Database;
use crate::models::RequestLogRecord;

fn row_to_log(row: &rusqlite::Row<'_>) -> Result<RequestLogRecord, rusqlite::Error> {
    Ok(RequestLogRecord {
        request_id: row.get(0)?,
        session_id: row.get(1)?,
        surface: row.get(2)?,
        content: row.get(3)?,
        normalized: row.get(4)?,
        response_content: row.get(5)?,
        response_metadata: row.get(6)?,
        agent_id: row.get(7)?,
        processing_time_ms: row.get(8)?,
        event_id: row.get(9)?,
        event_type: row.get(10)?,
        status: row.get(11)?,
        created_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

const LOG_COLUMNS: &str = "request_id, session_id, surface, content, normalized,
     response_content, response_metadata, agent_id, processing_time_ms,
     event_id, event_type, status, created_at, completed_at";

const LOG_COLUMNS_QUALIFIED: &str = "r.request_id, r.session_id, r.surface, r.content, r.normalized,
     r.response_content, r.response_metadata, r.agent_id, r.processing_time_ms,
     r.event_id, r.event_type, r.status, r.created_at, r.completed_at";

/// Insert the log row for a new turn with status `pending`.
pub async fn append_log(
    db: &Database,
    request: &NormalizedRequest,
) -> Result<(), SwitchboardError> {
    let normalized = serde_json::to_string(request)
        .map_err(|e| SwitchboardError::Internal(format!("request encode: {e}")))?;
    let request = request.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO request_logs (request_id, session_id, surface, content,
                     normalized, agent_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    request.request_id,
                    request.session_id,
                    request.surface.to_string(),
                    request.content,
                    normalized,
                    request.target_agent_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The worker's idempotency claim: `pending -> dispatched`.
///
/// Returns `true` when this caller won the claim. A redelivered
/// `request.created` finds the row already dispatched (or completed) and
/// gets `false`.
pub async fn mark_dispatched(
    db: &Database,
    request_id: &str,
    agent_id: &str,
) -> Result<bool, SwitchboardError> {
    let request_id = request_id.to_string();
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE request_logs
                 SET status = 'dispatched', agent_id = ?2
                 WHERE request_id = ?1 AND status = 'pending'",
                params![request_id, agent_id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the completed response on the log.
///
/// Idempotent for at-least-once response delivery: only the first call with
/// a given request id writes; repeats return `false` and change nothing. A
/// log that already timed out (`failed`) is still completed so the late
/// response can be delivered asynchronously.
pub async fn complete_log(
    db: &Database,
    response: &CompletedResponse,
    event_id: Option<&str>,
    event_type: Option<&str>,
) -> Result<bool, SwitchboardError> {
    let metadata = serde_json::to_string(&response.metadata)
        .map_err(|e| SwitchboardError::Internal(format!("response encode: {e}")))?;
    let response = response.clone();
    let event_id = event_id.map(|s| s.to_string());
    let event_type = event_type.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE request_logs
                 SET response_content = ?2,
                     response_metadata = ?3,
                     agent_id = ?4,
                     processing_time_ms = ?5,
                     event_id = ?6,
                     event_type = ?7,
                     status = 'completed',
                     completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE request_id = ?1 AND response_content IS NULL",
                params![
                    response.request_id,
                    response.content,
                    metadata,
                    response.agent_id,
                    response.processing_time_ms,
                    event_id,
                    event_type,
                ],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a log failed (timeout or dispatch error). Completed logs are left
/// alone.
pub async fn fail_log(
    db: &Database,
    request_id: &str,
    reason: &str,
) -> Result<(), SwitchboardError> {
    let request_id = request_id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE request_logs
                 SET status = 'failed',
                     response_metadata = json_object('error', ?2)
                 WHERE request_id = ?1 AND status != 'completed'",
                params![request_id, reason],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a log row by request id.
pub async fn get_log(
    db: &Database,
    request_id: &str,
) -> Result<Option<RequestLogRecord>, SwitchboardError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM request_logs WHERE request_id = ?1"
            ))?;
            let result = stmt.query_row(params![request_id], row_to_log);
            match result {
                Ok(log) => Ok(Some(log)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the completed response for a request, joining the owning session
/// for the user id. `None` until the worker has completed the log.
pub async fn get_completed_response(
    db: &Database,
    request_id: &str,
) -> Result<Option<CompletedResponse>, SwitchboardError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS_QUALIFIED}, s.user_id
                 FROM request_logs r JOIN sessions s ON s.id = r.session_id
                 WHERE r.request_id = ?1 AND r.response_content IS NOT NULL"
            ))?;
            let result = stmt.query_row(params![request_id], |row| {
                let log = row_to_log(row)?;
                let user_id: String = row.get(14)?;
                Ok((log, user_id))
            });
            match result {
                Ok((log, user_id)) => Ok(log.completed_response(&user_id)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
