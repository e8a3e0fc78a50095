// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent-routing directive detection.
//!
//! Two signals can appear in a reply:
//! 1. `task_complete_return_to_router` routes the session back to the
//!    routing agent (valid from any agent).
//! 2. A `ROUTE_TO: <agent>` line switches to a named specialized agent,
//!    validated against the advertised agent registry.
//!
//! Pure routing replies are control flow, never user content; the caller
//! re-invokes the target agent and delivers that reply instead.

use tracing::{info, warn};

/// The completion signal any agent may emit to hand the session back.
pub const TASK_COMPLETE_SIGNAL: &str = "task_complete_return_to_router";

/// The structured routing prefix the routing agent emits.
pub const ROUTE_TO_PREFIX: &str = "ROUTE_TO:";

/// Detects and validates a routing directive in a reply.
///
/// Returns the target agent, or `None` when the reply is ordinary content
/// (including a `ROUTE_TO:` naming an unknown agent, which is ignored with
/// a warning rather than trusted).
pub fn detect_routing_directive(
    content: &str,
    current_agent: &str,
    available_agents: &[String],
    routing_agent: &str,
) -> Option<String> {
    let reply = content.trim();

    if reply.contains(TASK_COMPLETE_SIGNAL) {
        info!(current_agent, "task completion signal detected, returning to routing agent");
        return Some(routing_agent.to_string());
    }

    if reply.contains(ROUTE_TO_PREFIX) {
        for line in reply.lines() {
            let line = line.trim();
            let Some(target) = line.strip_prefix(ROUTE_TO_PREFIX) else {
                continue;
            };
            let target = target.trim();
            if available_agents.iter().any(|a| a == target) {
                info!(current_agent, target_agent = target, "routing directive detected");
                return Some(target.to_string());
            }
            warn!(
                current_agent,
                target_agent = target,
                "routing directive names an unknown agent, ignoring"
            );
            return None;
        }
    }

    None
}
