// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the Switchboard services and their collaborators.

pub mod integration;
pub mod runtime;
pub mod transport;

pub use integration::IntegrationHandler;
pub use runtime::AgentRuntime;
pub use transport::{Transport, TransportMode};
