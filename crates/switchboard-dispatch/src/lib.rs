// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration Dispatcher service for Switchboard.
//!
//! Consumes `response.ready`, claims each event atomically, resolves the
//! per-user delivery fan-out from the effective-config overlay, dispatches
//! concurrently through the kind -> handler table, logs every attempt, and
//! retries retryable failures on a persistent schedule.

pub mod defaults;
pub mod dispatcher;
pub mod handlers;
pub mod retry;
pub mod server;

pub use defaults::seed_defaults;
pub use dispatcher::{dispatch_response, DispatchState};
pub use handlers::build_handlers;
pub use retry::run_retry_sweeper;
pub use server::{app, serve};
