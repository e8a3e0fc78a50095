// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as required URLs per transport mode and key-scope
//! separation.

use std::collections::HashSet;

use switchboard_core::{SwitchboardError, TransportMode};

use crate::model::SwitchboardConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<SwitchboardError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(SwitchboardError::Config(
            "server.host must not be empty".to_string(),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(SwitchboardError::Config(
            "storage.database_path must not be empty".to_string(),
        ));
    }

    // Broker mode needs somewhere to publish.
    if config.transport.mode == TransportMode::Broker
        && config
            .transport
            .broker_url
            .as_deref()
            .unwrap_or("")
            .trim()
            .is_empty()
    {
        errors.push(SwitchboardError::Config(
            "transport.broker_url is required when transport.mode = \"broker\"".to_string(),
        ));
    }

    if config.limits.max_content_kb == 0 {
        errors.push(SwitchboardError::Config(
            "limits.max_content_kb must be at least 1".to_string(),
        ));
    }

    if config.limits.sync_timeout_seconds == 0 {
        errors.push(SwitchboardError::Config(
            "limits.sync_timeout_seconds must be at least 1".to_string(),
        ));
    }

    // JWT enabled without issuers cannot validate anything.
    if config.auth.jwt_enabled && config.auth.jwt_issuers.is_empty() {
        errors.push(SwitchboardError::Config(
            "auth.jwt_enabled requires at least one [[auth.jwt_issuers]] entry".to_string(),
        ));
    }

    for (i, issuer) in config.auth.jwt_issuers.iter().enumerate() {
        if issuer.issuer.trim().is_empty() {
            errors.push(SwitchboardError::Config(format!(
                "auth.jwt_issuers[{i}].issuer must not be empty"
            )));
        }
        if issuer.jwks_url.trim().is_empty() {
            errors.push(SwitchboardError::Config(format!(
                "auth.jwt_issuers[{i}].jwks_url must not be empty"
            )));
        }
        if issuer.algorithms.is_empty() {
            errors.push(SwitchboardError::Config(format!(
                "auth.jwt_issuers[{i}].algorithms must not be empty"
            )));
        }
    }

    // A key present in both maps would let a tool principal authenticate as
    // a web user. Scopes must not cross.
    let web_keys: HashSet<&String> = config.auth.web_api_keys.keys().collect();
    for key in config.auth.tool_api_keys.keys() {
        if web_keys.contains(key) {
            errors.push(SwitchboardError::Config(
                "auth: the same API key appears in both web_api_keys and tool_api_keys"
                    .to_string(),
            ));
            break;
        }
    }

    // Explicitly enabled email needs an SMTP host.
    if config.integration_defaults.email.enabled == Some(true) && config.smtp.host.is_none() {
        errors.push(SwitchboardError::Config(
            "integration_defaults.email.enabled = true requires smtp.host".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
