// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session operations: lookup/create, the turn lock, and context updates.

use rusqlite::params;
use switchboard_core::{ContextBag, SwitchboardError, SurfaceHandles, SurfaceKind};

use crate::database::Database;
use crate::models::SessionRecord;

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        surface: row.get(2)?,
        channel_id: row.get(3)?,
        thread_id: row.get(4)?,
        external_user_id: row.get(5)?,
        workspace_id: row.get(6)?,
        current_agent_id: row.get(7)?,
        runtime_session_id: row.get(8)?,
        status: row.get(9)?,
        in_flight: row.get::<_, i64>(10)? != 0,
        lock_token: row.get(11)?,
        conversation_context: row.get(12)?,
        integration_metadata: row.get(13)?,
        user_context: row.get(14)?,
        total_requests: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        last_activity_at: row.get(18)?,
    })
}

const SESSION_COLUMNS: &str = "id, user_id, surface, channel_id, thread_id, external_user_id,
     workspace_id, current_agent_id, runtime_session_id, status, in_flight, lock_token,
     conversation_context, integration_metadata, user_context, total_requests,
     created_at, updated_at, last_activity_at";

/// Find the most recent active session for `(user, surface, channel?,
/// thread?)` within the idle TTL, or create one. Atomic.
///
/// Returns the session and whether it was created.
pub async fn get_or_create_session(
    db: &Database,
    user_id: &str,
    surface: SurfaceKind,
    handles: &SurfaceHandles,
    idle_ttl_minutes: i64,
    integration_metadata: &ContextBag,
) -> Result<(SessionRecord, bool), SwitchboardError> {
    let user_id = user_id.to_string();
    let surface = surface.to_string();
    let handles = handles.clone();
    let metadata_json = serde_json::to_string(integration_metadata)
        .map_err(|e| SwitchboardError::Internal(format!("metadata encode: {e}")))?;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let found = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_id = ?1 AND surface = ?2
                       AND channel_id IS ?3 AND thread_id IS ?4
                       AND status = 'active'
                       AND last_activity_at >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-' || ?5 || ' minutes')
                     ORDER BY last_activity_at DESC
                     LIMIT 1"
                ))?;
                stmt.query_row(
                    params![
                        user_id,
                        surface,
                        handles.channel_id,
                        handles.thread_id,
                        idle_ttl_minutes,
                    ],
                    row_to_session,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?
            };

            if let Some(session) = found {
                tx.commit()?;
                return Ok((session, false));
            }

            let id = uuid::Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO sessions (id, user_id, surface, channel_id, thread_id,
                     external_user_id, workspace_id, integration_metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    user_id,
                    surface,
                    handles.channel_id,
                    handles.thread_id,
                    handles.external_user_id,
                    handles.workspace_id,
                    metadata_json,
                ],
            )?;

            let session = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
                ))?;
                stmt.query_row(params![id], row_to_session)?
            };
            tx.commit()?;
            Ok((session, true))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by id.
pub async fn get_session(
    db: &Database,
    id: &str,
) -> Result<Option<SessionRecord>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acquire the session turn lock.
///
/// A conditional update on the session row carries the lock: it succeeds
/// only when no turn is in flight, and bumps `last_activity_at`. Losers get
/// `Conflict` with no state change.
pub async fn acquire_turn(db: &Database, session_id: &str) -> Result<String, SwitchboardError> {
    let session_id = session_id.to_string();
    let token = uuid::Uuid::new_v4().to_string();
    let token_out = token.clone();

    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET in_flight = 1,
                     lock_token = ?2,
                     total_requests = total_requests + 1,
                     last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND in_flight = 0",
                params![session_id, token],
            )?;
            if changed == 1 {
                return Ok(TurnOutcome::Acquired);
            }
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sessions WHERE id = ?1",
                    params![session_id],
                    |_| Ok(true),
                )
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(false),
                    other => Err(other),
                })?;
            Ok(if exists {
                TurnOutcome::InFlight
            } else {
                TurnOutcome::Unknown
            })
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        TurnOutcome::Acquired => Ok(token_out),
        TurnOutcome::InFlight => Err(SwitchboardError::Conflict(
            "a request is already in flight for this session".to_string(),
        )),
        TurnOutcome::Unknown => Err(SwitchboardError::BadRequest(
            "unknown session".to_string(),
        )),
    }
}

enum TurnOutcome {
    Acquired,
    InFlight,
    Unknown,
}

/// Release the turn lock. Only the holder's token releases.
pub async fn release_turn(
    db: &Database,
    session_id: &str,
    lock_token: &str,
) -> Result<(), SwitchboardError> {
    let session_id = session_id.to_string();
    let lock_token = lock_token.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE sessions
                 SET in_flight = 0,
                     lock_token = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND lock_token = ?2",
                params![session_id, lock_token],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 1 {
        Ok(())
    } else {
        Err(SwitchboardError::Conflict(
            "turn lock not held by this token".to_string(),
        ))
    }
}

/// Pin the session to an agent. Clearing the runtime handle forces the
/// worker to open a fresh runtime conversation on the next turn (used after
/// an agent-routing switch).
pub async fn update_session_agent(
    db: &Database,
    session_id: &str,
    agent_id: Option<&str>,
    clear_runtime_handle: bool,
) -> Result<(), SwitchboardError> {
    let session_id = session_id.to_string();
    let agent_id = agent_id.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            if clear_runtime_handle {
                conn.execute(
                    "UPDATE sessions
                     SET current_agent_id = ?2, runtime_session_id = NULL,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![session_id, agent_id],
                )?;
            } else {
                conn.execute(
                    "UPDATE sessions
                     SET current_agent_id = ?2,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![session_id, agent_id],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist the runtime conversation handle created on a session's first turn.
pub async fn set_runtime_session(
    db: &Database,
    session_id: &str,
    runtime_session_id: &str,
) -> Result<(), SwitchboardError> {
    let session_id = session_id.to_string();
    let runtime_session_id = runtime_session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET runtime_session_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![session_id, runtime_session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Merge a delta into the session's conversation context.
///
/// Last-writer-wins at field granularity: keys in the delta replace keys in
/// the stored bag, other keys are untouched. Runs in one transaction.
pub async fn update_session_context(
    db: &Database,
    session_id: &str,
    delta: &ContextBag,
) -> Result<(), SwitchboardError> {
    let session_id = session_id.to_string();
    let delta = delta.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: String = tx.query_row(
                "SELECT conversation_context FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            let mut bag: ContextBag = serde_json::from_str(&current).unwrap_or_default();
            for (key, value) in delta {
                bag.insert(key, value);
            }
            let merged = serde_json::to_string(&bag)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            tx.execute(
                "UPDATE sessions
                 SET conversation_context = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![session_id, merged],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Update the session lifecycle status.
pub async fn update_session_status(
    db: &Database,
    session_id: &str,
    status: &str,
) -> Result<(), SwitchboardError> {
    let session_id = session_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![session_id, status],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark active sessions idle past the TTL as inactive.
///
/// Sessions with a turn in flight are left alone. Returns the number of
/// sessions transitioned.
pub async fn expire_idle_sessions(
    db: &Database,
    idle_ttl_minutes: i64,
) -> Result<usize, SwitchboardError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE sessions
                 SET status = 'inactive',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'active' AND in_flight = 0
                   AND last_activity_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-' || ?1 || ' minutes')",
                params![idle_ttl_minutes],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_then_reuse_session() {
        let (db, _dir) = setup_db().await;
        let handles = SurfaceHandles::default();

        let (first, created) =
            get_or_create_session(&db, "alice", SurfaceKind::Web, &handles, 30, &Map::new())
                .await
                .unwrap();
        assert!(created);
        assert_eq!(first.user_id, "alice");
        assert_eq!(first.surface, "web");
        assert_eq!(first.status, "active");
        assert!(!first.in_flight);

        let (second, created) =
            get_or_create_session(&db, "alice", SurfaceKind::Web, &handles, 30, &Map::new())
                .await
                .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sessions_are_scoped_by_surface_and_thread() {
        let (db, _dir) = setup_db().await;

        let (web, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        let (cli, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Cli,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();
        assert_ne!(web.id, cli.id);

        let threaded = SurfaceHandles {
            channel_id: Some("C1".into()),
            thread_id: Some("T1".into()),
            ..Default::default()
        };
        let (chat_a, _) =
            get_or_create_session(&db, "alice", SurfaceKind::Chat, &threaded, 30, &Map::new())
                .await
                .unwrap();
        let other_thread = SurfaceHandles {
            channel_id: Some("C1".into()),
            thread_id: Some("T2".into()),
            ..Default::default()
        };
        let (chat_b, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Chat,
            &other_thread,
            30,
            &Map::new(),
        )
        .await
        .unwrap();
        assert_ne!(chat_a.id, chat_b.id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn turn_lock_is_exclusive() {
        let (db, _dir) = setup_db().await;
        let (session, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        let token = acquire_turn(&db, &session.id).await.unwrap();
        let second = acquire_turn(&db, &session.id).await;
        assert!(matches!(second, Err(SwitchboardError::Conflict(_))));

        release_turn(&db, &session.id, &token).await.unwrap();
        let third = acquire_turn(&db, &session.id).await;
        assert!(third.is_ok());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn release_requires_the_holder_token() {
        let (db, _dir) = setup_db().await;
        let (session, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        let _token = acquire_turn(&db, &session.id).await.unwrap();
        let wrong = release_turn(&db, &session.id, "not-the-token").await;
        assert!(matches!(wrong, Err(SwitchboardError::Conflict(_))));

        // Still locked.
        assert!(acquire_turn(&db, &session.id).await.is_err());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn acquire_turn_on_unknown_session_is_bad_request() {
        let (db, _dir) = setup_db().await;
        let result = acquire_turn(&db, "no-such-session").await;
        assert!(matches!(result, Err(SwitchboardError::BadRequest(_))));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_acquires_have_one_winner() {
        let (db, _dir) = setup_db().await;
        let (session, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move { acquire_turn(&db, &id).await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one concurrent acquire may win");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn context_merge_is_field_granular() {
        let (db, _dir) = setup_db().await;
        let (session, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        let mut delta = Map::new();
        delta.insert("topic".into(), serde_json::json!("laptops"));
        delta.insert("step".into(), serde_json::json!(1));
        update_session_context(&db, &session.id, &delta).await.unwrap();

        let mut delta2 = Map::new();
        delta2.insert("step".into(), serde_json::json!(2));
        update_session_context(&db, &session.id, &delta2).await.unwrap();

        let session = get_session(&db, &session.id).await.unwrap().unwrap();
        let bag = session.context().unwrap();
        assert_eq!(bag.get("topic").unwrap(), "laptops");
        assert_eq!(bag.get("step").unwrap(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn agent_switch_clears_runtime_handle() {
        let (db, _dir) = setup_db().await;
        let (session, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();

        set_runtime_session(&db, &session.id, "rt-1").await.unwrap();
        update_session_agent(&db, &session.id, Some("hr-agent"), true)
            .await
            .unwrap();

        let session = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(session.current_agent_id.as_deref(), Some("hr-agent"));
        assert!(session.runtime_session_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn idle_sessions_expire_but_in_flight_survive() {
        let (db, _dir) = setup_db().await;
        let (idle, _) = get_or_create_session(
            &db,
            "alice",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();
        let (busy, _) = get_or_create_session(
            &db,
            "bob",
            SurfaceKind::Web,
            &SurfaceHandles::default(),
            30,
            &Map::new(),
        )
        .await
        .unwrap();
        let _token = acquire_turn(&db, &busy.id).await.unwrap();

        // Backdate both sessions past the TTL.
        for id in [&idle.id, &busy.id] {
            let id = id.clone();
            db.connection()
                .call(move |conn| {
                    conn.execute(
                        "UPDATE sessions
                         SET last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-2 hours')
                         WHERE id = ?1",
                        params![id],
                    )?;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let expired = expire_idle_sessions(&db, 30).await.unwrap();
        assert_eq!(expired, 1);

        let idle = get_session(&db, &idle.id).await.unwrap().unwrap();
        assert_eq!(idle.status, "inactive");
        let busy = get_session(&db, &busy.id).await.unwrap().unwrap();
        assert_eq!(busy.status, "active");

        db.close().await.unwrap();
    }
}
