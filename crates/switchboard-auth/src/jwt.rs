// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer JWT validation against configured issuers.
//!
//! Each issuer brings its own JWKS URL and algorithm whitelist. JWKS
//! documents are cached process-wide with a TTL and refreshed lazily when a
//! token arrives with an unknown `kid`. Signature, `iss`, `aud`, and `exp`
//! (with bounded leeway) are all enforced; any failure is reported as a
//! plain "no identity" so callers cannot distinguish which check refused.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use switchboard_config::model::{AuthConfig, JwtIssuerConfig};

/// A validated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub groups: Vec<String>,
    pub method: AuthMethod,
}

/// Which validator produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Jwt,
    WebApiKey,
    ToolApiKey,
    TrustedProxy,
}

struct CachedJwks {
    set: JwkSet,
    fetched_at: Instant,
}

struct IssuerState {
    config: JwtIssuerConfig,
    algorithms: Vec<Algorithm>,
    jwks: RwLock<Option<CachedJwks>>,
}

/// JWKS-backed JWT validator over the configured issuer list.
pub struct JwtValidator {
    issuers: Vec<IssuerState>,
    leeway_seconds: u64,
    subject_claim: String,
    cache_ttl: Duration,
    http: reqwest::Client,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig, http: reqwest::Client) -> Self {
        let issuers = config
            .jwt_issuers
            .iter()
            .map(|issuer| {
                let algorithms = issuer
                    .algorithms
                    .iter()
                    .filter_map(|name| match name.parse::<Algorithm>() {
                        Ok(alg) => Some(alg),
                        Err(_) => {
                            warn!(issuer = issuer.issuer.as_str(), algorithm = name.as_str(),
                                  "unknown JWT algorithm in config, skipping");
                            None
                        }
                    })
                    .collect();
                IssuerState {
                    config: issuer.clone(),
                    algorithms,
                    jwks: RwLock::new(None),
                }
            })
            .collect();

        Self {
            issuers,
            leeway_seconds: config.jwt_leeway_seconds,
            subject_claim: config.subject_claim.clone(),
            cache_ttl: Duration::from_secs(config.jwks_cache_ttl_seconds),
            http,
        }
    }

    /// Validates a bearer token. `None` means "no identity" with no further
    /// detail.
    pub async fn validate(&self, token: &str) -> Option<Identity> {
        let header = decode_header(token).ok()?;
        let kid = header.kid.clone();

        for issuer in &self.issuers {
            if !issuer.algorithms.contains(&header.alg) {
                continue;
            }
            if let Some(identity) = self.try_issuer(issuer, token, header.alg, kid.as_deref()).await
            {
                return Some(identity);
            }
        }

        debug!("bearer token matched no configured issuer");
        None
    }

    async fn try_issuer(
        &self,
        issuer: &IssuerState,
        token: &str,
        alg: Algorithm,
        kid: Option<&str>,
    ) -> Option<Identity> {
        let key = self.decoding_key(issuer, kid).await?;

        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway_seconds;
        validation.set_issuer(&[issuer.config.issuer.as_str()]);
        match &issuer.config.audience {
            Some(aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = decode::<serde_json::Map<String, serde_json::Value>>(token, &key, &validation)
            .map_err(|e| {
                debug!(issuer = issuer.config.issuer.as_str(), error = %e, "JWT rejected");
                e
            })
            .ok()?;

        let claims = data.claims;
        let user_id = claims
            .get(&self.subject_claim)
            .or_else(|| claims.get("preferred_username"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())?;
        let email = claims
            .get("email")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let groups = claims
            .get("groups")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Some(Identity {
            user_id,
            email,
            groups,
            method: AuthMethod::Jwt,
        })
    }

    /// Finds the decoding key for a `kid`, refreshing the cached JWKS when
    /// it is stale or the kid is unknown.
    async fn decoding_key(&self, issuer: &IssuerState, kid: Option<&str>) -> Option<DecodingKey> {
        if let Some(key) = self.key_from_cache(issuer, kid).await {
            return Some(key);
        }

        // Cache miss or unknown kid: fetch a fresh document once.
        let set = self.fetch_jwks(&issuer.config.jwks_url).await?;
        let key = find_key(&set, kid);
        *issuer.jwks.write().await = Some(CachedJwks {
            set,
            fetched_at: Instant::now(),
        });
        key
    }

    async fn key_from_cache(&self, issuer: &IssuerState, kid: Option<&str>) -> Option<DecodingKey> {
        let cached = issuer.jwks.read().await;
        let cached = cached.as_ref()?;
        if cached.fetched_at.elapsed() > self.cache_ttl {
            return None;
        }
        find_key(&cached.set, kid)
    }

    async fn fetch_jwks(&self, url: &str) -> Option<JwkSet> {
        match self.http.get(url).send().await {
            Ok(response) => match response.json::<JwkSet>().await {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!(url, error = %e, "malformed JWKS document");
                    None
                }
            },
            Err(e) => {
                warn!(url, error = %e, "JWKS fetch failed");
                None
            }
        }
    }
}

fn find_key(set: &JwkSet, kid: Option<&str>) -> Option<DecodingKey> {
    let jwk = match kid {
        Some(kid) => set.find(kid)?,
        // Tokens without a kid only work when the issuer publishes a single key.
        None if set.keys.len() == 1 => &set.keys[0],
        None => return None,
    };
    DecodingKey::from_jwk(jwk).ok()
}

/// Parses the upstream-injected group header (`a,b,c`) into a list.
pub(crate) fn parse_groups_header(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect()
}

/// Constant-time lookup of a static API key in a key map.
///
/// Every entry is compared so the timing does not reveal how far the probe
/// got through the map.
pub(crate) fn lookup_api_key<'a>(
    keys: &'a HashMap<String, String>,
    presented: &str,
) -> Option<&'a str> {
    let mut found: Option<&str> = None;
    for (key, principal) in keys {
        if crate::signature::constant_time_str_eq(key, presented) {
            found = Some(principal.as_str());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_header_parses_and_trims() {
        assert_eq!(
            parse_groups_header("admins, employees ,"),
            vec!["admins".to_string(), "employees".to_string()]
        );
        assert!(parse_groups_header("").is_empty());
    }

    #[test]
    fn api_key_lookup_matches_exactly() {
        let mut keys = HashMap::new();
        keys.insert("KEY_ALICE".to_string(), "alice".to_string());
        keys.insert("KEY_BOB".to_string(), "bob".to_string());

        assert_eq!(lookup_api_key(&keys, "KEY_ALICE"), Some("alice"));
        assert_eq!(lookup_api_key(&keys, "KEY_ALICE "), None);
        assert_eq!(lookup_api_key(&keys, "key_alice"), None);
        assert_eq!(lookup_api_key(&keys, ""), None);
    }

    #[tokio::test]
    async fn garbage_token_yields_no_identity() {
        let config = AuthConfig {
            jwt_enabled: true,
            jwt_issuers: vec![JwtIssuerConfig {
                issuer: "https://issuer.example.com".into(),
                audience: Some("switchboard".into()),
                jwks_url: "https://issuer.example.com/jwks".into(),
                algorithms: vec!["RS256".into()],
            }],
            ..AuthConfig::default()
        };
        let validator = JwtValidator::new(&config, reqwest::Client::new());
        assert!(validator.validate("not.a.jwt").await.is_none());
        assert!(validator.validate("").await.is_none());
    }
}
