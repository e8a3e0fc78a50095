// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard control plane.
//!
//! This crate provides the error taxonomy, shared domain types, the
//! CloudEvents-shaped event envelope, and the trait seams between services
//! (transport strategy, integration handlers, agent runtime). Every other
//! workspace crate depends on this one and nothing else in the workspace.

pub mod envelope;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use envelope::EventEnvelope;
pub use error::SwitchboardError;
pub use traits::{AgentRuntime, IntegrationHandler, Transport, TransportMode};
pub use types::{
    AgentReply, AttemptOutcome, CompletedResponse, ContextBag, DeliveryOutcome, DeliveryPayload,
    EffectiveConfig, IntegrationKind, NormalizedRequest, RequestStatus, SessionStatus,
    SurfaceHandles, SurfaceKind,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn transport_mode_round_trips() {
        assert_eq!(TransportMode::Broker.to_string(), "broker");
        assert_eq!(
            TransportMode::from_str("direct_http").unwrap(),
            TransportMode::DirectHttp
        );
    }

    #[test]
    fn trait_objects_are_usable() {
        // The services hold these behind Arc<dyn ...>; object safety is
        // load-bearing for the whole workspace.
        fn _assert_transport(_: &dyn Transport) {}
        fn _assert_handler(_: &dyn IntegrationHandler) {}
        fn _assert_runtime(_: &dyn AgentRuntime) {}
    }
}
