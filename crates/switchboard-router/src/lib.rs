// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request Router service for Switchboard.
//!
//! Terminates the inbound surfaces (signed chat webhooks, bearer-auth web
//! and CLI, API-key tool triggers, the flag-gated generic endpoint),
//! normalizes every payload into the uniform request record, allocates
//! sessions with the at-most-one-turn discipline, dispatches over the
//! communication substrate, and returns or acknowledges the response.

pub mod events;
pub mod flow;
pub mod handlers;
pub mod normalize;
pub mod responses;
pub mod server;

pub use server::{app, serve, RouterState};
