// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration configuration rows and the effective-config overlay.
//!
//! `user_id = ""` rows are the system defaults for a kind. The effective
//! config for `(user, kind)` is the user override if present, else the
//! default, else disabled; exactly one source wins, never a field-wise
//! merge of both.

use rusqlite::params;
use switchboard_core::{EffectiveConfig, IntegrationKind, SwitchboardError};

use crate::database::Database;
use crate::models::IntegrationConfigRecord;

/// The reserved user id for system default rows.
pub const DEFAULT_USER: &str = "";

fn row_to_config(row: &rusqlite::Row<'_>) -> Result<IntegrationConfigRecord, rusqlite::Error> {
    Ok(IntegrationConfigRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        config: row.get(4)?,
        priority: row.get(5)?,
        retry_count: row.get::<_, i64>(6)? as u32,
        retry_delay_seconds: row.get::<_, i64>(7)? as u64,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const CONFIG_COLUMNS: &str = "id, user_id, kind, enabled, config, priority, retry_count,
     retry_delay_seconds, created_at, updated_at";

fn record_to_effective(record: IntegrationConfigRecord) -> Option<EffectiveConfig> {
    let kind: IntegrationKind = match record.kind.parse() {
        Ok(kind) => kind,
        Err(_) => {
            tracing::warn!(kind = record.kind.as_str(), "unknown integration kind, dropping row");
            return None;
        }
    };
    let config = serde_json::from_str(&record.config).unwrap_or_default();
    Some(EffectiveConfig {
        user_id: record.user_id.clone(),
        kind,
        enabled: record.enabled,
        config,
        priority: record.priority,
        retry_count: record.retry_count,
        retry_delay_seconds: record.retry_delay_seconds,
        user_override: record.user_id != DEFAULT_USER,
    })
}

/// Create or replace the `(user, kind)` row. Pass [`DEFAULT_USER`] to write
/// a system default.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_config(
    db: &Database,
    user_id: &str,
    kind: IntegrationKind,
    enabled: bool,
    config_json: &str,
    priority: i32,
    retry_count: u32,
    retry_delay_seconds: u64,
) -> Result<(), SwitchboardError> {
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    let config_json = config_json.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO integration_configs
                     (user_id, kind, enabled, config, priority, retry_count, retry_delay_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (user_id, kind) DO UPDATE SET
                     enabled = excluded.enabled,
                     config = excluded.config,
                     priority = excluded.priority,
                     retry_count = excluded.retry_count,
                     retry_delay_seconds = excluded.retry_delay_seconds,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    user_id,
                    kind,
                    enabled as i64,
                    config_json,
                    priority,
                    retry_count as i64,
                    retry_delay_seconds as i64,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch the raw `(user, kind)` row, if any.
pub async fn get_config(
    db: &Database,
    user_id: &str,
    kind: IntegrationKind,
) -> Result<Option<IntegrationConfigRecord>, SwitchboardError> {
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONFIG_COLUMNS} FROM integration_configs
                 WHERE user_id = ?1 AND kind = ?2"
            ))?;
            let result = stmt.query_row(params![user_id, kind], row_to_config);
            match result {
                Ok(config) => Ok(Some(config)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All of a user's override rows, priority-descending.
pub async fn list_user_configs(
    db: &Database,
    user_id: &str,
) -> Result<Vec<IntegrationConfigRecord>, SwitchboardError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONFIG_COLUMNS} FROM integration_configs
                 WHERE user_id = ?1 ORDER BY priority DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_config)?;
            let mut configs = Vec::new();
            for row in rows {
                configs.push(row?);
            }
            Ok(configs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a user's override row. Returns whether a row existed.
pub async fn delete_config(
    db: &Database,
    user_id: &str,
    kind: IntegrationKind,
) -> Result<bool, SwitchboardError> {
    let user_id = user_id.to_string();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM integration_configs WHERE user_id = ?1 AND kind = ?2",
                params![user_id, kind],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The effective config for `(user, kind)`: user override, else system
/// default, else `None` (treated as disabled). Single read.
pub async fn effective_config(
    db: &Database,
    user_id: &str,
    kind: IntegrationKind,
) -> Result<Option<EffectiveConfig>, SwitchboardError> {
    let user_id = user_id.to_string();
    let kind_str = kind.to_string();
    db.connection()
        .call(move |conn| {
            // The user row sorts before the default row ('' < any user id,
            // so order by user_id descending puts the override first).
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONFIG_COLUMNS} FROM integration_configs
                 WHERE (user_id = ?1 OR user_id = '') AND kind = ?2
                 ORDER BY user_id DESC
                 LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id, kind_str], row_to_config);
            match result {
                Ok(record) => Ok(record_to_effective(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve the full fan-out for a user: the effective config of every known
/// kind, enabled rows only, priority-descending.
pub async fn effective_fanout(
    db: &Database,
    user_id: &str,
) -> Result<Vec<EffectiveConfig>, SwitchboardError> {
    let mut fanout = Vec::new();
    for kind in IntegrationKind::ALL {
        if let Some(config) = effective_config(db, user_id, kind).await? {
            if config.enabled {
                fanout.push(config);
            }
        }
    }
    fanout.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(fanout)
}
