// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly and lifecycle.
//!
//! Each service follows the same sequence: load config, open the store
//! (which asserts the migration version by applying pending migrations),
//! build the configured transport, start background tasks, serve, and shut
//! down within the grace deadline on signal. `run_all` hosts all three
//! services in one process for development.

use std::sync::Arc;
use std::time::{Duration, Instant};

use switchboard_auth::CredentialResolver;
use switchboard_config::{validate_config, SwitchboardConfig};
use switchboard_core::envelope::sources;
use switchboard_core::SwitchboardError;
use switchboard_dispatch::DispatchState;
use switchboard_router::RouterState;
use switchboard_store::queries::sessions;
use switchboard_store::Database;
use switchboard_transport::build_transport;
use switchboard_worker::{HttpAgentRuntime, WorkerState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown;

/// Which service(s) this process hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Router,
    Worker,
    Dispatcher,
    All,
}

/// Loads config, validates it, and runs the requested service until a
/// shutdown signal.
pub async fn run(service: Service, config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            error!(error = %error, "configuration invalid");
        }
        return Err(SwitchboardError::Config(format!(
            "{} configuration error(s)",
            errors.len()
        )));
    }

    info!(
        transport = %config.transport.mode,
        database = config.storage.database_path.as_str(),
        "starting switchboard"
    );

    // Opening the store applies (and thereby asserts) the schema version.
    let db = Database::open(&config.storage.database_path).await?;
    let config = Arc::new(config);
    let cancel = shutdown::install_signal_handler();

    let result = match service {
        Service::Router => run_router(config.clone(), db.clone(), cancel.clone()).await,
        Service::Worker => run_worker(config.clone(), db.clone(), cancel.clone()).await,
        Service::Dispatcher => run_dispatcher(config.clone(), db.clone(), cancel.clone()).await,
        Service::All => run_all(config.clone(), db.clone(), cancel.clone()).await,
    };

    // Bounded drain for in-flight work spawned off the request paths.
    if cancel.is_cancelled() {
        let grace = Duration::from_secs(config.limits.shutdown_grace_seconds);
        tokio::time::sleep(grace).await;
    }
    info!("switchboard shutdown complete");
    result
}

fn instance_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "switchboard".to_string());
    format!("{host}-{}", std::process::id())
}

fn router_state(
    config: &Arc<SwitchboardConfig>,
    db: &Database,
) -> Result<RouterState, SwitchboardError> {
    let transport = build_transport(config, db.clone(), sources::ROUTER)?;
    let resolver = Arc::new(CredentialResolver::new(
        config.auth.clone(),
        reqwest::Client::new(),
    ));
    Ok(RouterState {
        db: db.clone(),
        transport,
        resolver,
        config: config.clone(),
        instance_id: instance_id(),
        start_time: Instant::now(),
    })
}

fn worker_state(
    config: &Arc<SwitchboardConfig>,
    db: &Database,
) -> Result<WorkerState, SwitchboardError> {
    let deadline = Duration::from_secs(config.limits.runtime_deadline_seconds);
    let runtime = Arc::new(HttpAgentRuntime::new(
        config.worker.runtime_url.clone(),
        deadline,
    )?);
    let transport = build_transport(config, db.clone(), sources::WORKER)?;
    Ok(WorkerState {
        db: db.clone(),
        runtime,
        transport,
        agents: config.worker.agents.clone(),
        routing_agent: config.worker.routing_agent.clone(),
        runtime_deadline: deadline,
        instance_id: instance_id(),
    })
}

fn dispatch_state(
    config: &Arc<SwitchboardConfig>,
    db: &Database,
) -> Result<DispatchState, SwitchboardError> {
    let handlers = switchboard_dispatch::build_handlers(config)?;
    Ok(DispatchState {
        db: db.clone(),
        handlers: Arc::new(handlers),
        instance_id: config
            .dispatch
            .instance_id
            .clone()
            .unwrap_or_else(instance_id),
    })
}

/// Periodically transitions idle sessions to inactive.
fn spawn_session_janitor(
    db: Database,
    idle_ttl_minutes: i64,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match sessions::expire_idle_sessions(&db, idle_ttl_minutes).await {
                        Ok(0) => {}
                        Ok(n) => info!(count = n, "idle sessions expired"),
                        Err(e) => warn!(error = %e, "session expiry sweep failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("session janitor shutting down");
                    break;
                }
            }
        }
    });
}

async fn run_router(
    config: Arc<SwitchboardConfig>,
    db: Database,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let state = router_state(&config, &db)?;
    spawn_session_janitor(
        db,
        config.limits.session_idle_ttl_minutes,
        cancel.clone(),
    );

    let addr = format!("{}:{}", config.server.host, config.server.router_port);
    tokio::select! {
        result = switchboard_router::serve(&addr, state) => result,
        _ = cancel.cancelled() => Ok(()),
    }
}

async fn run_worker(
    config: Arc<SwitchboardConfig>,
    db: Database,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let state = worker_state(&config, &db)?;
    let addr = format!("{}:{}", config.server.host, config.server.worker_port);
    tokio::select! {
        result = switchboard_worker::serve(&addr, state) => result,
        _ = cancel.cancelled() => Ok(()),
    }
}

async fn run_dispatcher(
    config: Arc<SwitchboardConfig>,
    db: Database,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    switchboard_dispatch::seed_defaults(&db, &config).await?;
    let state = dispatch_state(&config, &db)?;

    tokio::spawn(switchboard_dispatch::run_retry_sweeper(
        state.clone(),
        Duration::from_secs(config.dispatch.retry_sweep_interval_seconds),
        cancel.clone(),
    ));

    let addr = format!("{}:{}", config.server.host, config.server.dispatcher_port);
    tokio::select! {
        result = switchboard_dispatch::serve(&addr, state) => result,
        _ = cancel.cancelled() => Ok(()),
    }
}

/// Development mode: all three services in one process, sharing the store.
async fn run_all(
    config: Arc<SwitchboardConfig>,
    db: Database,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    switchboard_dispatch::seed_defaults(&db, &config).await?;

    let router = router_state(&config, &db)?;
    let worker = worker_state(&config, &db)?;
    let dispatcher = dispatch_state(&config, &db)?;

    spawn_session_janitor(
        db.clone(),
        config.limits.session_idle_ttl_minutes,
        cancel.clone(),
    );
    tokio::spawn(switchboard_dispatch::run_retry_sweeper(
        dispatcher.clone(),
        Duration::from_secs(config.dispatch.retry_sweep_interval_seconds),
        cancel.clone(),
    ));

    let router_addr = format!("{}:{}", config.server.host, config.server.router_port);
    let worker_addr = format!("{}:{}", config.server.host, config.server.worker_port);
    let dispatcher_addr = format!("{}:{}", config.server.host, config.server.dispatcher_port);

    tokio::select! {
        result = switchboard_router::serve(&router_addr, router) => result,
        result = switchboard_worker::serve(&worker_addr, worker) => result,
        result = switchboard_dispatch::serve(&dispatcher_addr, dispatcher) => result,
        _ = cancel.cancelled() => Ok(()),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
