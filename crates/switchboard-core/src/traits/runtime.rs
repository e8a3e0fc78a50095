// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent runtime boundary.
//!
//! The runtime (LLM execution, tool calling) is an external collaborator.
//! The worker owns timeouts, bounded retries on transport errors, and error
//! classification; the runtime is treated as best-effort.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{AgentReply, ContextBag};

/// Boundary to the agent runtime.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Opens a fresh runtime conversation for the given agent and returns
    /// its opaque handle. Called on a session's first turn, and again after
    /// an agent-routing switch clears the handle.
    async fn open_conversation(&self, agent_id: &str) -> Result<String, SwitchboardError>;

    /// Runs one turn on an existing conversation.
    async fn run_turn(
        &self,
        conversation_handle: &str,
        agent_id: &str,
        prompt: &str,
        context: &ContextBag,
    ) -> Result<AgentReply, SwitchboardError>;

    /// Known agents, `name -> runtime agent id`. Used by the router to
    /// validate routing directives.
    async fn list_agents(&self) -> Result<Vec<String>, SwitchboardError>;
}
