// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the agent runtime.
//!
//! Handles conversation creation, turn execution, and transient error
//! retry. The runtime is a best-effort collaborator: transport-class
//! failures (429, 500, 503, connection errors) are retried once after a
//! short delay; semantic failures are terminal.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use switchboard_core::{AgentReply, AgentRuntime, ContextBag, SwitchboardError};
use tracing::{debug, warn};

/// HTTP client implementation of [`AgentRuntime`].
#[derive(Debug, Clone)]
pub struct HttpAgentRuntime {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct OpenConversationBody<'a> {
    agent_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenConversationResponse {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct TurnBody<'a> {
    agent_id: &'a str,
    prompt: &'a str,
    context: &'a ContextBag,
}

#[derive(Debug, Deserialize)]
struct TurnResponse {
    content: String,
    #[serde(default)]
    metadata: ContextBag,
}

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    agents: Vec<String>,
}

impl HttpAgentRuntime {
    pub fn new(base_url: String, deadline: Duration) -> Result<Self, SwitchboardError> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| SwitchboardError::Runtime {
                message: format!("failed to build runtime HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, SwitchboardError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, url, "retrying runtime call after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = match self.client.post(url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    // Connection-class failure: retryable.
                    last_error = Some(SwitchboardError::Runtime {
                        message: format!("runtime call failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(%status, attempt, url, "runtime response received");

            if status.is_success() {
                return response.json::<R>().await.map_err(|e| {
                    SwitchboardError::Runtime {
                        message: format!("malformed runtime response: {e}"),
                        source: Some(Box::new(e)),
                    }
                });
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(SwitchboardError::Runtime {
                    message: format!("runtime returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Semantic error: terminal, no retry.
            let body = response.text().await.unwrap_or_default();
            return Err(SwitchboardError::Runtime {
                message: format!("runtime returned {status}: {body}"),
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| SwitchboardError::Runtime {
            message: "runtime call failed after retries".into(),
            source: None,
        }))
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn open_conversation(&self, agent_id: &str) -> Result<String, SwitchboardError> {
        let url = format!("{}/conversations", self.base_url);
        let response: OpenConversationResponse = self
            .post_json(&url, &OpenConversationBody { agent_id })
            .await?;
        Ok(response.conversation_id)
    }

    async fn run_turn(
        &self,
        conversation_handle: &str,
        agent_id: &str,
        prompt: &str,
        context: &ContextBag,
    ) -> Result<AgentReply, SwitchboardError> {
        let url = format!("{}/conversations/{conversation_handle}/turns", self.base_url);
        let started = Instant::now();
        let response: TurnResponse = self
            .post_json(
                &url,
                &TurnBody {
                    agent_id,
                    prompt,
                    context,
                },
            )
            .await?;
        Ok(AgentReply {
            agent_id: agent_id.to_string(),
            content: response.content,
            metadata: response.metadata,
            processing_time_ms: started.elapsed().as_millis() as i64,
        })
    }

    async fn list_agents(&self) -> Result<Vec<String>, SwitchboardError> {
        let url = format!("{}/agents", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SwitchboardError::Runtime {
                message: format!("agent list failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let agents: AgentsResponse =
            response.json().await.map_err(|e| SwitchboardError::Runtime {
                message: format!("malformed agent list: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(agents.agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn turn_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations/conv-1/turns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "hello from the agent",
                "metadata": {"stop_reason": "end_of_turn"}
            })))
            .mount(&server)
            .await;

        let runtime = HttpAgentRuntime::new(server.uri(), Duration::from_secs(5)).unwrap();
        let reply = runtime
            .run_turn("conv-1", "routing-agent", "hi", &Map::new())
            .await
            .unwrap();
        assert_eq!(reply.content, "hello from the agent");
        assert_eq!(reply.agent_id, "routing-agent");
        assert_eq!(reply.metadata.get("stop_reason").unwrap(), "end_of_turn");
    }

    #[tokio::test]
    async fn transient_error_retries_once_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"conversation_id": "conv-9"})),
            )
            .mount(&server)
            .await;

        let runtime = HttpAgentRuntime::new(server.uri(), Duration::from_secs(5)).unwrap();
        let handle = runtime.open_conversation("routing-agent").await.unwrap();
        assert_eq!(handle, "conv-9");
    }

    #[tokio::test]
    async fn semantic_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let runtime = HttpAgentRuntime::new(server.uri(), Duration::from_secs(5)).unwrap();
        let result = runtime.open_conversation("routing-agent").await;
        assert!(matches!(result, Err(SwitchboardError::Runtime { .. })));
    }
}
