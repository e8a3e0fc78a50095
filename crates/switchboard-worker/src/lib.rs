// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent Worker service for Switchboard.
//!
//! Consumes `request.created`, drives the agent runtime under a hard
//! deadline, interprets agent-routing directives, and produces exactly one
//! `response.ready` per request.

pub mod routing;
pub mod runtime;
pub mod server;
pub mod service;

pub use routing::detect_routing_directive;
pub use runtime::HttpAgentRuntime;
pub use server::{app, serve};
pub use service::{process_request, WorkerState};
