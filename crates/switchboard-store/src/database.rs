// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes; query
//! modules accept `&Database` and call through `conn.call()`.

use std::time::Duration;

use switchboard_core::SwitchboardError;

use crate::migrations::run_migrations;

/// Handle to the single-writer SQLite connection.
///
/// Opening runs all pending migrations, so a `Database` is always at the
/// expected schema version once construction returns.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database at `path`, applies PRAGMAs, and runs
    /// embedded migrations.
    pub async fn open(path: &str) -> Result<Self, SwitchboardError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        tracing::debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Round-trips a trivial query, for health probes.
    pub async fn ping(&self) -> Result<(), SwitchboardError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Flushes and closes the connection.
    pub async fn close(self) -> Result<(), SwitchboardError> {
        self.conn
            .close()
            .await
            .map_err(|e| SwitchboardError::Storage {
                source: Box::new(e),
            })
    }
}

/// Maps a tokio-rusqlite error into the workspace error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SwitchboardError {
    SwitchboardError::Storage {
        source: Box::new(e),
    }
}
