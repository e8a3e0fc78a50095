// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential resolver: three cooperating validators tried in order,
//! short-circuiting on the first success.
//!
//! 1. Bearer JWT against the configured issuers (JWKS-verified).
//! 2. Static API key, constant-time compared. Keys scope to either a web
//!    user or a tool principal; scopes never cross.
//! 3. Upstream-injected identity headers, accepted only when the deployment
//!    marks the reverse proxy as trusted.
//!
//! Every failure collapses to `Unauthorized` with no hint of which
//! validator refused.

use switchboard_config::model::AuthConfig;
use switchboard_core::SwitchboardError;
use tracing::debug;

use crate::jwt::{lookup_api_key, parse_groups_header, AuthMethod, Identity, JwtValidator};

/// Identity headers injected by a trusted upstream reverse proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyHeaders<'a> {
    pub user_id: Option<&'a str>,
    pub email: Option<&'a str>,
    pub groups: Option<&'a str>,
}

/// Resolves inbound credentials to an [`Identity`].
///
/// Pure apart from the JWKS cache refresh inside the JWT validator.
pub struct CredentialResolver {
    config: AuthConfig,
    jwt: Option<JwtValidator>,
}

impl CredentialResolver {
    pub fn new(config: AuthConfig, http: reqwest::Client) -> Self {
        let jwt = if config.jwt_enabled {
            Some(JwtValidator::new(&config, http))
        } else {
            None
        };
        Self { config, jwt }
    }

    /// Resolves a web/CLI caller from a bearer token and proxy headers.
    pub async fn resolve_user(
        &self,
        bearer: Option<&str>,
        proxy: ProxyHeaders<'_>,
    ) -> Result<Identity, SwitchboardError> {
        if let Some(token) = bearer {
            if let Some(validator) = &self.jwt {
                if let Some(identity) = validator.validate(token).await {
                    debug!(user_id = identity.user_id.as_str(), "authenticated via JWT");
                    return Ok(identity);
                }
            }

            if self.config.api_keys_enabled {
                if let Some(user_id) = lookup_api_key(&self.config.web_api_keys, token) {
                    debug!(user_id, "authenticated via web API key");
                    return Ok(Identity {
                        user_id: user_id.to_string(),
                        email: None,
                        groups: Vec::new(),
                        method: AuthMethod::WebApiKey,
                    });
                }
            }
        }

        if self.config.trusted_proxy_enabled {
            if let Some(user_id) = proxy.user_id {
                debug!(user_id, "authenticated via trusted proxy headers");
                return Ok(Identity {
                    user_id: user_id.to_string(),
                    email: proxy.email.map(|e| e.to_string()),
                    groups: proxy.groups.map(parse_groups_header).unwrap_or_default(),
                    method: AuthMethod::TrustedProxy,
                });
            }
        }

        Err(SwitchboardError::Unauthorized)
    }

    /// Resolves a tool caller from the static API key header.
    ///
    /// Tool keys identify a system principal, never a human; the web key
    /// map is deliberately not consulted here.
    pub fn resolve_tool(&self, api_key: Option<&str>) -> Result<Identity, SwitchboardError> {
        if !self.config.api_keys_enabled {
            return Err(SwitchboardError::Unauthorized);
        }
        let key = api_key.ok_or(SwitchboardError::Unauthorized)?;
        match lookup_api_key(&self.config.tool_api_keys, key) {
            Some(principal) => {
                debug!(principal, "authenticated tool principal via API key");
                Ok(Identity {
                    user_id: principal.to_string(),
                    email: None,
                    groups: Vec::new(),
                    method: AuthMethod::ToolApiKey,
                })
            }
            None => Err(SwitchboardError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolver() -> CredentialResolver {
        let mut web_api_keys = HashMap::new();
        web_api_keys.insert("KEY_ALICE".to_string(), "alice".to_string());
        let mut tool_api_keys = HashMap::new();
        tool_api_keys.insert("TOOL_KEY_SNOW".to_string(), "svc-snow".to_string());

        CredentialResolver::new(
            AuthConfig {
                web_api_keys,
                tool_api_keys,
                ..AuthConfig::default()
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn web_api_key_resolves_user() {
        let identity = resolver()
            .resolve_user(Some("KEY_ALICE"), ProxyHeaders::default())
            .await
            .unwrap();
        assert_eq!(identity.user_id, "alice");
        assert_eq!(identity.method, AuthMethod::WebApiKey);
    }

    #[tokio::test]
    async fn wrong_bearer_is_unauthorized() {
        let result = resolver()
            .resolve_user(Some("WRONG"), ProxyHeaders::default())
            .await;
        assert!(matches!(result, Err(SwitchboardError::Unauthorized)));
    }

    #[tokio::test]
    async fn missing_bearer_is_unauthorized() {
        let result = resolver().resolve_user(None, ProxyHeaders::default()).await;
        assert!(matches!(result, Err(SwitchboardError::Unauthorized)));
    }

    #[tokio::test]
    async fn tool_key_never_authenticates_a_web_caller() {
        let result = resolver()
            .resolve_user(Some("TOOL_KEY_SNOW"), ProxyHeaders::default())
            .await;
        assert!(matches!(result, Err(SwitchboardError::Unauthorized)));
    }

    #[test]
    fn web_key_never_authenticates_a_tool_caller() {
        let result = resolver().resolve_tool(Some("KEY_ALICE"));
        assert!(matches!(result, Err(SwitchboardError::Unauthorized)));
    }

    #[test]
    fn tool_key_resolves_principal() {
        let identity = resolver().resolve_tool(Some("TOOL_KEY_SNOW")).unwrap();
        assert_eq!(identity.user_id, "svc-snow");
        assert_eq!(identity.method, AuthMethod::ToolApiKey);
    }

    #[tokio::test]
    async fn proxy_headers_ignored_unless_trusted() {
        let proxy = ProxyHeaders {
            user_id: Some("mallory"),
            email: None,
            groups: None,
        };
        let result = resolver().resolve_user(None, proxy).await;
        assert!(matches!(result, Err(SwitchboardError::Unauthorized)));
    }

    #[tokio::test]
    async fn trusted_proxy_headers_resolve() {
        let resolver = CredentialResolver::new(
            AuthConfig {
                trusted_proxy_enabled: true,
                ..AuthConfig::default()
            },
            reqwest::Client::new(),
        );
        let proxy = ProxyHeaders {
            user_id: Some("carol"),
            email: Some("carol@example.com"),
            groups: Some("staff,admins"),
        };
        let identity = resolver.resolve_user(None, proxy).await.unwrap();
        assert_eq!(identity.user_id, "carol");
        assert_eq!(identity.email.as_deref(), Some("carol@example.com"));
        assert_eq!(identity.groups, vec!["staff", "admins"]);
        assert_eq!(identity.method, AuthMethod::TrustedProxy);
    }
}
