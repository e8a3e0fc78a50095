// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! Assembles the full control plane in one process: a temp SQLite store,
//! the scripted mock runtime, real router/worker/dispatcher state, and an
//! in-process transport that calls the worker and dispatcher directly
//! (same contract as the HTTP strategies, no sockets). `spawn_router`
//! binds the real axum router on an ephemeral port for wire-level tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use switchboard_auth::CredentialResolver;
use switchboard_config::SwitchboardConfig;
use switchboard_core::{
    AgentRuntime, CompletedResponse, DeliveryPayload, IntegrationHandler, IntegrationKind,
    NormalizedRequest, SwitchboardError, Transport, TransportMode,
};
use switchboard_dispatch::{seed_defaults, DispatchState};
use switchboard_router::RouterState;
use switchboard_store::queries::{integrations, requests};
use switchboard_store::Database;
use switchboard_worker::WorkerState;

use crate::mock_runtime::MockAgentRuntime;
use crate::recording::{RecordedDelivery, RecordingHandler};

/// In-process transport: the worker and dispatcher are function calls.
///
/// Observably equivalent to the HTTP strategies (same store mutations,
/// same rendezvous), which is exactly what the harness needs.
pub struct LocalTransport {
    db: Database,
    worker: OnceLock<WorkerState>,
    dispatch: OnceLock<DispatchState>,
}

impl LocalTransport {
    fn new(db: Database) -> Self {
        Self {
            db,
            worker: OnceLock::new(),
            dispatch: OnceLock::new(),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send_request(&self, request: &NormalizedRequest) -> Result<(), SwitchboardError> {
        let worker = self
            .worker
            .get()
            .ok_or_else(|| SwitchboardError::Internal("harness worker not wired".into()))?;
        switchboard_worker::process_request(worker, request).await?;
        Ok(())
    }

    async fn await_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<CompletedResponse, SwitchboardError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(response) = requests::get_completed_response(&self.db, request_id).await? {
                return Ok(response);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SwitchboardError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn publish_response(
        &self,
        response: &CompletedResponse,
    ) -> Result<(), SwitchboardError> {
        let dispatch = self
            .dispatch
            .get()
            .ok_or_else(|| SwitchboardError::Internal("harness dispatcher not wired".into()))?;
        let payload = DeliveryPayload::from_response(response);
        switchboard_dispatch::dispatch_response(dispatch, &payload).await?;
        Ok(())
    }

    fn mode(&self) -> TransportMode {
        TransportMode::DirectHttp
    }
}

/// Builder for the harness.
pub struct TestHarnessBuilder {
    replies: Vec<String>,
    config: SwitchboardConfig,
    recorded_kinds: Vec<IntegrationKind>,
    user_integrations: Vec<(String, IntegrationKind, String, i32, u32, u64)>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = SwitchboardConfig::default();
        // Tight deadlines keep tests fast.
        config.limits.sync_timeout_seconds = 5;
        config.limits.runtime_deadline_seconds = 5;
        Self {
            replies: Vec::new(),
            config,
            recorded_kinds: Vec::new(),
            user_integrations: Vec::new(),
        }
    }

    /// Scripted runtime replies, consumed in order.
    pub fn with_mock_replies(mut self, replies: Vec<&str>) -> Self {
        self.replies = replies.into_iter().map(String::from).collect();
        self
    }

    /// Registers a web-scoped API key.
    pub fn with_web_key(mut self, key: &str, user_id: &str) -> Self {
        self.config
            .auth
            .web_api_keys
            .insert(key.to_string(), user_id.to_string());
        self
    }

    /// Registers a tool-scoped API key.
    pub fn with_tool_key(mut self, key: &str, principal: &str) -> Self {
        self.config
            .auth
            .tool_api_keys
            .insert(key.to_string(), principal.to_string());
        self
    }

    /// Sets the chat signing secret.
    pub fn with_signing_secret(mut self, secret: &str) -> Self {
        self.config.chat.signing_secret = Some(secret.to_string());
        self
    }

    /// Enables the generic endpoint.
    pub fn with_generic_enabled(mut self) -> Self {
        self.config.router.generic_endpoint_enabled = true;
        self
    }

    /// Replaces a kind's handler with a recording sink.
    pub fn record_kind(mut self, kind: IntegrationKind) -> Self {
        self.recorded_kinds.push(kind);
        self
    }

    /// Seeds a user integration row.
    pub fn with_user_integration(
        mut self,
        user_id: &str,
        kind: IntegrationKind,
        config_json: &str,
        priority: i32,
        retry_count: u32,
        retry_delay_seconds: u64,
    ) -> Self {
        self.user_integrations.push((
            user_id.to_string(),
            kind,
            config_json.to_string(),
            priority,
            retry_count,
            retry_delay_seconds,
        ));
        self
    }

    /// Arbitrary config adjustments.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut SwitchboardConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    pub async fn build(self) -> Result<TestHarness, SwitchboardError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SwitchboardError::Storage {
            source: e.into(),
        })?;
        let db_path = temp_dir.path().join("harness.db");
        let db = Database::open(db_path.to_str().unwrap()).await?;

        let config = Arc::new(self.config);
        seed_defaults(&db, &config).await?;
        for (user_id, kind, bag, priority, retry_count, retry_delay) in &self.user_integrations {
            integrations::upsert_config(
                &db, user_id, *kind, true, bag, *priority, *retry_count, *retry_delay,
            )
            .await?;
        }

        let runtime = Arc::new(MockAgentRuntime::with_replies(self.replies));
        let transport = Arc::new(LocalTransport::new(db.clone()));

        // Handler table: real handlers, with recorders where requested.
        let mut handlers = switchboard_dispatch::build_handlers(&config)?;
        let mut recorders = HashMap::new();
        for kind in self.recorded_kinds {
            let (handler, deliveries) = RecordingHandler::new(kind);
            handlers.insert(
                kind,
                handler.clone() as Arc<dyn IntegrationHandler>,
            );
            recorders.insert(kind, (handler, deliveries));
        }

        let dispatch_state = DispatchState {
            db: db.clone(),
            handlers: Arc::new(handlers),
            instance_id: "harness-dispatch".to_string(),
        };
        let worker_state = WorkerState {
            db: db.clone(),
            runtime: runtime.clone(),
            transport: transport.clone(),
            agents: runtime.list_agents().await?,
            routing_agent: config.worker.routing_agent.clone(),
            runtime_deadline: Duration::from_secs(config.limits.runtime_deadline_seconds),
            instance_id: "harness-worker".to_string(),
        };
        transport
            .worker
            .set(worker_state.clone())
            .map_err(|_| SwitchboardError::Internal("worker already wired".into()))?;
        transport
            .dispatch
            .set(dispatch_state.clone())
            .map_err(|_| SwitchboardError::Internal("dispatcher already wired".into()))?;

        let resolver = Arc::new(CredentialResolver::new(
            config.auth.clone(),
            reqwest::Client::new(),
        ));
        let router_state = RouterState {
            db: db.clone(),
            transport: transport.clone(),
            resolver,
            config: config.clone(),
            instance_id: "harness-router".to_string(),
            start_time: Instant::now(),
        };

        Ok(TestHarness {
            db,
            config,
            runtime,
            router_state,
            worker_state,
            dispatch_state,
            recorders,
            _temp_dir: temp_dir,
        })
    }
}

/// Fully wired control plane over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub config: Arc<SwitchboardConfig>,
    pub runtime: Arc<MockAgentRuntime>,
    pub router_state: RouterState,
    pub worker_state: WorkerState,
    pub dispatch_state: DispatchState,
    recorders: HashMap<
        IntegrationKind,
        (Arc<RecordingHandler>, Arc<Mutex<Vec<RecordedDelivery>>>),
    >,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Deliveries recorded for a kind registered via `record_kind`.
    pub fn recorded(&self, kind: IntegrationKind) -> Vec<RecordedDelivery> {
        self.recorders
            .get(&kind)
            .map(|(_, deliveries)| deliveries.lock().unwrap().clone())
            .unwrap_or_default()
    }

    /// The recording handler for a kind, for failure injection.
    pub fn recorder(&self, kind: IntegrationKind) -> Option<Arc<RecordingHandler>> {
        self.recorders.get(&kind).map(|(handler, _)| handler.clone())
    }

    /// Binds the real router on an ephemeral port and returns its base URL.
    pub async fn spawn_router(&self) -> Result<String, SwitchboardError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| SwitchboardError::Transport {
                message: format!("failed to bind harness router: {e}"),
                source: Some(Box::new(e)),
            })?;
        let addr = listener.local_addr().map_err(|e| SwitchboardError::Transport {
            message: format!("no local addr: {e}"),
            source: Some(Box::new(e)),
        })?;
        let app = switchboard_router::app(self.router_state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "harness router exited");
            }
        });
        Ok(format!("http://{addr}"))
    }
}
