// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard services.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use switchboard_core::TransportMode;

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values; a
/// bare `switchboard all` with no config file serves the direct-HTTP
/// development stack.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Process-wide settings (log level).
    #[serde(default)]
    pub service: ServiceConfig,

    /// Listen addresses for the three services.
    #[serde(default)]
    pub server: ServerConfig,

    /// Communication substrate selection and endpoints.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Credential resolver settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Chat platform settings (inbound signatures, outbound bot API).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Payload and deadline bounds.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// SMTP submission settings for the email integration.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// System-wide fallback delivery configuration per integration kind.
    #[serde(default)]
    pub integration_defaults: IntegrationDefaultsConfig,

    /// Request Router feature flags.
    #[serde(default)]
    pub router: RouterConfig,

    /// Integration Dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Agent Worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Listen addresses for the three services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Request Router port.
    #[serde(default = "default_router_port")]
    pub router_port: u16,

    /// Agent Worker port.
    #[serde(default = "default_worker_port")]
    pub worker_port: u16,

    /// Integration Dispatcher port.
    #[serde(default = "default_dispatcher_port")]
    pub dispatcher_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            router_port: default_router_port(),
            worker_port: default_worker_port(),
            dispatcher_port: default_dispatcher_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_router_port() -> u16 {
    8080
}

fn default_worker_port() -> u16 {
    8081
}

fn default_dispatcher_port() -> u16 {
    8082
}

/// Communication substrate selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Active strategy: `broker` or `direct_http`.
    #[serde(default = "default_transport_mode")]
    pub mode: TransportMode,

    /// Broker ingress URL (broker mode only).
    #[serde(default)]
    pub broker_url: Option<String>,

    /// Agent Worker base URL (direct-HTTP mode).
    #[serde(default = "default_worker_url")]
    pub worker_url: String,

    /// Integration Dispatcher base URL (direct-HTTP mode).
    #[serde(default = "default_dispatcher_url")]
    pub dispatcher_url: String,

    /// Store poll interval while awaiting a response, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: default_transport_mode(),
            broker_url: None,
            worker_url: default_worker_url(),
            dispatcher_url: default_dispatcher_url(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_transport_mode() -> TransportMode {
    TransportMode::DirectHttp
}

fn default_worker_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_dispatcher_url() -> String {
    "http://127.0.0.1:8082".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// One trusted JWT issuer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JwtIssuerConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim. `None` skips audience verification.
    #[serde(default)]
    pub audience: Option<String>,

    /// JWKS document URL for signature verification.
    pub jwks_url: String,

    /// Algorithm whitelist for this issuer.
    #[serde(default = "default_jwt_algorithms")]
    pub algorithms: Vec<String>,
}

fn default_jwt_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

/// Credential resolver settings.
///
/// Validators are tried in order: bearer JWT, static API key, then
/// upstream-injected headers (only behind `trusted_proxy_enabled`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Enables bearer JWT validation.
    #[serde(default)]
    pub jwt_enabled: bool,

    /// Trusted issuers, matched by the token's `iss` claim.
    #[serde(default)]
    pub jwt_issuers: Vec<JwtIssuerConfig>,

    /// Clock-skew leeway applied to `exp`/`nbf`, in seconds.
    #[serde(default = "default_jwt_leeway")]
    pub jwt_leeway_seconds: u64,

    /// Claim carrying the subject user id.
    #[serde(default = "default_subject_claim")]
    pub subject_claim: String,

    /// JWKS cache TTL in seconds.
    #[serde(default = "default_jwks_ttl")]
    pub jwks_cache_ttl_seconds: u64,

    /// Enables static API key validation.
    #[serde(default = "default_true")]
    pub api_keys_enabled: bool,

    /// Web-scoped keys: `token -> user id`.
    #[serde(default)]
    pub web_api_keys: HashMap<String, String>,

    /// Tool-scoped keys: `token -> system principal`.
    #[serde(default)]
    pub tool_api_keys: HashMap<String, String>,

    /// Accept `x-user-id`/`x-user-email`/`x-user-groups` headers injected by
    /// a trusted upstream reverse proxy. Off by default.
    #[serde(default)]
    pub trusted_proxy_enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_enabled: false,
            jwt_issuers: Vec::new(),
            jwt_leeway_seconds: default_jwt_leeway(),
            subject_claim: default_subject_claim(),
            jwks_cache_ttl_seconds: default_jwks_ttl(),
            api_keys_enabled: default_true(),
            web_api_keys: HashMap::new(),
            tool_api_keys: HashMap::new(),
            trusted_proxy_enabled: false,
        }
    }
}

fn default_jwt_leeway() -> u64 {
    60
}

fn default_subject_claim() -> String {
    "sub".to_string()
}

fn default_jwks_ttl() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// Chat platform settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Shared secret for inbound signature verification. `None` rejects all
    /// signed-surface requests (fail-closed).
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Bot token for outbound chat delivery.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Chat platform API base URL.
    #[serde(default = "default_chat_api_url")]
    pub api_base_url: String,
}

fn default_chat_api_url() -> String {
    "https://chat.example.com/api".to_string()
}

/// Payload and deadline bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum request content size in KiB; one byte over rejects.
    #[serde(default = "default_max_content_kb")]
    pub max_content_kb: usize,

    /// How long a synchronous surface awaits `response.ready`.
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_seconds: u64,

    /// Idle TTL after which a session stops being reused and is marked
    /// inactive.
    #[serde(default = "default_idle_ttl")]
    pub session_idle_ttl_minutes: i64,

    /// Hard deadline for one agent runtime invocation.
    #[serde(default = "default_runtime_deadline")]
    pub runtime_deadline_seconds: u64,

    /// Grace period for draining work at shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_kb: default_max_content_kb(),
            sync_timeout_seconds: default_sync_timeout(),
            session_idle_ttl_minutes: default_idle_ttl(),
            runtime_deadline_seconds: default_runtime_deadline(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_max_content_kb() -> usize {
    64
}

fn default_sync_timeout() -> u64 {
    120
}

fn default_idle_ttl() -> i64 {
    30
}

fn default_runtime_deadline() -> u64 {
    90
}

fn default_shutdown_grace() -> u64 {
    20
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "switchboard.db".to_string()
}

/// SMTP submission settings for the email integration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP relay host. `None` disables the email integration default.
    #[serde(default)]
    pub host: Option<String>,

    /// Submission port; STARTTLS is negotiated on it.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// `From` address on outbound mail.
    #[serde(default = "default_smtp_from")]
    pub from_address: String,

    /// Optional reply-to address.
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_smtp_from(),
            reply_to: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "switchboard@localhost".to_string()
}

/// Retry spacing shape for outbound deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffShape {
    Linear,
    Exponential,
}

/// System-wide fallback for one integration kind.
///
/// `enabled = None` means auto: the kind enables itself when its
/// prerequisite is configured (email needs an SMTP host, chat a bot token).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationDefaultEntry {
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Higher priority dispatches earlier.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,

    #[serde(default = "default_backoff")]
    pub backoff: BackoffShape,
}

impl Default for IntegrationDefaultEntry {
    fn default() -> Self {
        Self {
            enabled: None,
            priority: 0,
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
            backoff: default_backoff(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    30
}

fn default_backoff() -> BackoffShape {
    BackoffShape::Linear
}

/// Per-kind system defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationDefaultsConfig {
    #[serde(default)]
    pub chat: IntegrationDefaultEntry,
    #[serde(default)]
    pub email: IntegrationDefaultEntry,
    #[serde(default)]
    pub webhook: IntegrationDefaultEntry,
    #[serde(default)]
    pub test: IntegrationDefaultEntry,
}

/// Request Router feature flags.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Enables the unauthenticated generic endpoint. Off by default; keep
    /// it off in hardened deployments.
    #[serde(default)]
    pub generic_endpoint_enabled: bool,
}

/// Integration Dispatcher settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Identity used in atomic event claims. Defaults to hostname + pid.
    #[serde(default)]
    pub instance_id: Option<String>,

    /// How often the retry sweeper drains due attempts.
    #[serde(default = "default_retry_sweep")]
    pub retry_sweep_interval_seconds: u64,

    /// Per-delivery HTTP/SMTP timeout.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            retry_sweep_interval_seconds: default_retry_sweep(),
            delivery_timeout_seconds: default_delivery_timeout(),
        }
    }
}

fn default_retry_sweep() -> u64 {
    5
}

fn default_delivery_timeout() -> u64 {
    30
}

/// Agent Worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Agent runtime base URL.
    #[serde(default = "default_runtime_url")]
    pub runtime_url: String,

    /// Agent the router falls back to when a session has none pinned.
    #[serde(default = "default_routing_agent")]
    pub routing_agent: String,

    /// Agents the worker advertises for routing-directive validation.
    #[serde(default = "default_agents")]
    pub agents: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            runtime_url: default_runtime_url(),
            routing_agent: default_routing_agent(),
            agents: default_agents(),
        }
    }
}

fn default_runtime_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_routing_agent() -> String {
    "routing-agent".to_string()
}

fn default_agents() -> Vec<String> {
    vec!["routing-agent".to_string()]
}
