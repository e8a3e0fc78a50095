// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted agent runtime for tests.
//!
//! Replies are consumed in order; once the script is exhausted every turn
//! echoes its prompt, which keeps multi-turn tests deterministic without
//! scripting every exchange.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Map;
use switchboard_core::{AgentReply, AgentRuntime, ContextBag, SwitchboardError};

/// In-memory [`AgentRuntime`] with scripted replies.
pub struct MockAgentRuntime {
    replies: Mutex<VecDeque<String>>,
    conversations_opened: AtomicUsize,
    agents: Vec<String>,
}

impl MockAgentRuntime {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            conversations_opened: AtomicUsize::new(0),
            agents: vec![
                "routing-agent".to_string(),
                "hr-agent".to_string(),
                "it-agent".to_string(),
            ],
        }
    }

    /// How many conversations have been opened so far.
    pub fn conversations_opened(&self) -> usize {
        self.conversations_opened.load(Ordering::SeqCst)
    }
}

impl Default for MockAgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    async fn open_conversation(&self, agent_id: &str) -> Result<String, SwitchboardError> {
        let n = self.conversations_opened.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-conv-{agent_id}-{n}"))
    }

    async fn run_turn(
        &self,
        _conversation_handle: &str,
        agent_id: &str,
        prompt: &str,
        _context: &ContextBag,
    ) -> Result<AgentReply, SwitchboardError> {
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("Echo: {prompt}"));
        Ok(AgentReply {
            agent_id: agent_id.to_string(),
            content,
            metadata: Map::new(),
            processing_time_ms: 1,
        })
    }

    async fn list_agents(&self) -> Result<Vec<String>, SwitchboardError> {
        Ok(self.agents.clone())
    }
}
