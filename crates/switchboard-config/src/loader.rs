// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./switchboard.toml` > `~/.config/switchboard/switchboard.toml`
//! > `/etc/switchboard/switchboard.toml` with environment variable overrides
//! via `SWITCHBOARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SwitchboardConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/switchboard/switchboard.toml` (system-wide)
/// 3. `~/.config/switchboard/switchboard.toml` (user XDG config)
/// 4. `./switchboard.toml` (local directory)
/// 5. `SWITCHBOARD_*` environment variables
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file("/etc/switchboard/switchboard.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("switchboard/switchboard.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("switchboard.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example,
/// `SWITCHBOARD_CHAT_SIGNING_SECRET` must map to `chat.signing_secret`,
/// not `chat.signing.secret`.
fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("server_", "server.", 1)
            .replacen("transport_", "transport.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("chat_", "chat.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("smtp_", "smtp.", 1)
            .replacen("router_", "router.", 1)
            .replacen("dispatch_", "dispatch.", 1)
            .replacen("worker_", "worker.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::TransportMode;

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.router_port, 8080);
        assert_eq!(config.transport.mode, TransportMode::DirectHttp);
        assert_eq!(config.limits.sync_timeout_seconds, 120);
        assert!(!config.router.generic_endpoint_enabled);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[transport]
mode = "broker"
broker_url = "http://broker:8088"

[limits]
max_content_kb = 32
"#,
        )
        .unwrap();
        assert_eq!(config.transport.mode, TransportMode::Broker);
        assert_eq!(config.transport.broker_url.as_deref(), Some("http://broker:8088"));
        assert_eq!(config.limits.max_content_kb, 32);
        // Untouched sections keep their defaults.
        assert_eq!(config.smtp.port, 587);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
[limits]
max_content_mb = 5
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn api_key_maps_deserialize() {
        let config = load_config_from_str(
            r#"
[auth.web_api_keys]
KEY_ALICE = "alice"

[auth.tool_api_keys]
TOOL_KEY_SNOW = "svc-snow"
"#,
        )
        .unwrap();
        assert_eq!(config.auth.web_api_keys.get("KEY_ALICE").unwrap(), "alice");
        assert_eq!(
            config.auth.tool_api_keys.get("TOOL_KEY_SNOW").unwrap(),
            "svc-snow"
        );
    }
}
