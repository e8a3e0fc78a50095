// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request Router HTTP server built on axum.
//!
//! Sets up per-surface routes, the broker event intake, session and
//! request-status endpoints, and unauthenticated health probes.

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post, put};
use axum::Router;
use switchboard_auth::CredentialResolver;
use switchboard_config::SwitchboardConfig;
use switchboard_core::{SwitchboardError, Transport};
use switchboard_store::Database;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{events, handlers};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct RouterState {
    pub db: Database,
    pub transport: Arc<dyn Transport>,
    pub resolver: Arc<CredentialResolver>,
    pub config: Arc<SwitchboardConfig>,
    /// Identity used in event claims.
    pub instance_id: String,
    /// Process start, for the detailed health endpoint.
    pub start_time: Instant,
}

/// Builds the router's route table.
pub fn app(state: RouterState) -> Router {
    // Unauthenticated health probes; the detailed form never exposes
    // secrets or per-user data.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/health/detailed", get(handlers::health_detailed))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/v1/requests/chat_event", post(handlers::handle_chat_event))
        .route(
            "/api/v1/requests/chat_interactive",
            post(handlers::handle_chat_interactive),
        )
        .route("/api/v1/requests/chat_slash", post(handlers::handle_chat_slash))
        .route("/api/v1/requests/web", post(handlers::handle_web))
        .route("/api/v1/requests/cli", post(handlers::handle_cli))
        .route("/api/v1/requests/tool", post(handlers::handle_tool))
        .route("/api/v1/requests/generic", post(handlers::handle_generic))
        .route(
            "/api/v1/requests/generic/sync",
            post(handlers::handle_generic_sync),
        )
        .route("/api/v1/requests/{request_id}", get(handlers::get_request_status))
        .route("/api/v1/sessions", post(handlers::create_session))
        .route("/api/v1/sessions/{session_id}", get(handlers::get_session))
        .route("/api/v1/sessions/{session_id}", put(handlers::update_session))
        .route("/api/v1/events", post(events::handle_event))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Binds and serves until the listener fails.
pub async fn serve(addr: &str, state: RouterState) -> Result<(), SwitchboardError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("failed to bind router to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!(addr, "request router listening");
    axum::serve(listener, app(state))
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("router server error: {e}"),
            source: Some(Box::new(e)),
        })
}
