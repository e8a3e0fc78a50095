// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Switchboard control plane.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed
//! operations for sessions (including the per-session turn lock), request
//! logs, integration configuration overlays, delivery attempt logs, the
//! persistent retry schedule, and atomic event claims.
//!
//! The session row carries the turn lock: `acquire_turn` is a conditional
//! update (`in_flight = 0 -> 1`) so no external coordinator is needed, and
//! at most one request is ever in flight per session.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
