// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into an
//! [`AppConfig`], which then builds the verification policies. Nothing reads
//! the environment after that.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `OC_WEBHOOK_KEY` | Shared secret for `x-oc-hash` webhook signatures | None |
//! | `OC_API_URL` | Platform API base URL, serves `/oauth/certs/<kid>` | `https://sandboxapi.ordercloud.io` |
//! | `OC_API_VERSION` | Platform API version | `v1` |
//! | `OC_CLIENT_ID` | API client id of this integration | None |
//! | `OC_REQUIRE_SIGNATURE` | Require a valid webhook signature | `true` when `OC_WEBHOOK_KEY` is set |
//! | `OC_REQUIRE_BEARER` | Require a verified bearer / user token | `true` |
//! | `OC_EXPECTED_ISSUER` | Expected JWT `iss` | None |
//! | `OC_EXPECTED_AUDIENCE` | Expected JWT `aud` | None |
//! | `OC_ALLOWED_ALGORITHMS` | Comma-separated JWT algorithm allow-list | `RS256` |
//! | `OC_KEY_SOURCE` | Certificate base: `api`, `issuer` or `audience`; the last two need `OC_EXPECTED_ISSUER` / `OC_EXPECTED_AUDIENCE` | `api` |
//! | `OC_TOKEN_LEEWAY_SECS` | Clock skew allowed on `exp` / `nbf` | `60` |
//! | `OC_KEY_CACHE_TTL_SECS` | Verification key lifetime in the cache | `120` |
//! | `OC_KEY_CACHE_CAPACITY` | Maximum cached verification keys | `5` |
//! | `OC_KEY_FETCH_TIMEOUT_SECS` | Certificate fetch timeout | `5` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::auth::key_cache::{DEFAULT_CAPACITY, DEFAULT_KEY_TTL};
use crate::auth::jwks::DEFAULT_FETCH_TIMEOUT;
use crate::auth::policy::{KeySource, SharedSecret, VerificationPolicy, DEFAULT_LEEWAY_SECS};

pub const WEBHOOK_KEY_ENV: &str = "OC_WEBHOOK_KEY";
pub const API_URL_ENV: &str = "OC_API_URL";
pub const API_VERSION_ENV: &str = "OC_API_VERSION";
pub const CLIENT_ID_ENV: &str = "OC_CLIENT_ID";
pub const REQUIRE_SIGNATURE_ENV: &str = "OC_REQUIRE_SIGNATURE";
pub const REQUIRE_BEARER_ENV: &str = "OC_REQUIRE_BEARER";
pub const EXPECTED_ISSUER_ENV: &str = "OC_EXPECTED_ISSUER";
pub const EXPECTED_AUDIENCE_ENV: &str = "OC_EXPECTED_AUDIENCE";
pub const ALLOWED_ALGORITHMS_ENV: &str = "OC_ALLOWED_ALGORITHMS";
pub const KEY_SOURCE_ENV: &str = "OC_KEY_SOURCE";
pub const TOKEN_LEEWAY_ENV: &str = "OC_TOKEN_LEEWAY_SECS";
pub const KEY_CACHE_TTL_ENV: &str = "OC_KEY_CACHE_TTL_SECS";
pub const KEY_CACHE_CAPACITY_ENV: &str = "OC_KEY_CACHE_CAPACITY";
pub const KEY_FETCH_TIMEOUT_ENV: &str = "OC_KEY_FETCH_TIMEOUT_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Sandbox API, used when `OC_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "https://sandboxapi.ordercloud.io";
pub const DEFAULT_API_VERSION: &str = "v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webhook_secret: Option<SharedSecret>,
    pub api_url: String,
    pub api_version: String,
    pub client_id: Option<String>,
    pub require_signature: bool,
    pub require_bearer: bool,
    pub expected_issuer: Option<String>,
    pub expected_audience: Option<String>,
    pub allowed_algorithms: Vec<Algorithm>,
    pub key_source: KeySource,
    pub token_leeway_secs: u64,
    pub key_cache_ttl: Duration,
    pub key_cache_capacity: usize,
    pub key_fetch_timeout: Duration,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let webhook_secret = env.optional(WEBHOOK_KEY_ENV).map(SharedSecret::new);
        let require_signature =
            env.parse_bool(REQUIRE_SIGNATURE_ENV)?.unwrap_or(webhook_secret.is_some());
        if require_signature && webhook_secret.is_none() {
            return Err(ConfigError::MissingConfig(format!(
                "{WEBHOOK_KEY_ENV} (required because {REQUIRE_SIGNATURE_ENV} is enabled)"
            )));
        }

        let api_url = env.or_default(API_URL_ENV, DEFAULT_API_URL);
        validate_base_url(API_URL_ENV, &api_url)?;

        let allowed_algorithms = match env.optional(ALLOWED_ALGORITHMS_ENV) {
            Some(list) => parse_algorithms(&list)?,
            None => vec![Algorithm::RS256],
        };

        let key_source = match env.optional(KEY_SOURCE_ENV) {
            Some(raw) => KeySource::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                name: KEY_SOURCE_ENV,
                reason: format!("expected api, issuer or audience, got {raw:?}"),
            })?,
            None => KeySource::default(),
        };

        // Keys are only ever fetched from a base the operator named
        let expected_issuer = env.optional(EXPECTED_ISSUER_ENV);
        let expected_audience = env.optional(EXPECTED_AUDIENCE_ENV);
        let claim_base = match key_source {
            KeySource::Api => None,
            KeySource::Issuer => Some((EXPECTED_ISSUER_ENV, &expected_issuer)),
            KeySource::Audience => Some((EXPECTED_AUDIENCE_ENV, &expected_audience)),
        };
        if let Some((name, expected)) = claim_base {
            let expected = expected.as_deref().ok_or_else(|| {
                ConfigError::MissingConfig(format!(
                    "{name} (required because {KEY_SOURCE_ENV} is {key_source:?})"
                ))
            })?;
            validate_base_url(name, expected)?;
        }

        Ok(Self {
            webhook_secret,
            api_url,
            api_version: env.or_default(API_VERSION_ENV, DEFAULT_API_VERSION),
            client_id: env.optional(CLIENT_ID_ENV),
            require_signature,
            require_bearer: env.parse_bool(REQUIRE_BEARER_ENV)?.unwrap_or(true),
            expected_issuer,
            expected_audience,
            allowed_algorithms,
            key_source,
            token_leeway_secs: env
                .parse_number(TOKEN_LEEWAY_ENV)?
                .unwrap_or(DEFAULT_LEEWAY_SECS),
            key_cache_ttl: env
                .parse_number(KEY_CACHE_TTL_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_KEY_TTL),
            key_cache_capacity: env
                .parse_number::<usize>(KEY_CACHE_CAPACITY_ENV)?
                .unwrap_or(DEFAULT_CAPACITY),
            key_fetch_timeout: env
                .parse_number(KEY_FETCH_TIMEOUT_ENV)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
            host: env.or_default(HOST_ENV, "0.0.0.0"),
            port: env.parse_number(PORT_ENV)?.unwrap_or(8080),
        })
    }

    /// Policy for webhook deliveries: signature lane when configured, plus
    /// the envelope's user token when bearer verification is on.
    pub fn webhook_policy(&self) -> VerificationPolicy {
        let mut policy = self.base_policy().with_bearer(self.require_bearer);
        if self.require_signature {
            if let Some(secret) = &self.webhook_secret {
                policy = policy.with_signature(secret.expose());
            }
        }
        policy
    }

    /// Policy for proxied API calls: bearer lane only.
    pub fn api_policy(&self) -> VerificationPolicy {
        self.base_policy().with_bearer(self.require_bearer)
    }

    fn base_policy(&self) -> VerificationPolicy {
        let mut policy = VerificationPolicy::new(self.api_url.clone())
            .with_algorithms(self.allowed_algorithms.clone())
            .with_key_source(self.key_source)
            .with_leeway(self.token_leeway_secs);
        if let Some(issuer) = &self.expected_issuer {
            policy = policy.with_issuer(issuer.clone());
        }
        if let Some(audience) = &self.expected_audience {
            policy = policy.with_audience(audience.clone());
        }
        policy
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse_bool(&self, name: &'static str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.optional(name) else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                name,
                reason: format!("expected a boolean, got {raw:?}"),
            }),
        }
    }

    fn parse_number<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                    name,
                    reason: format!("{raw:?}: {e}"),
                })
            })
            .transpose()
    }
}

fn validate_base_url(name: &'static str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }
    Ok(())
}

fn parse_algorithms(list: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if raw.eq_ignore_ascii_case("none") {
            return Err(ConfigError::InvalidValue {
                name: ALLOWED_ALGORITHMS_ENV,
                reason: "\"none\" can never be allowed".to_string(),
            });
        }
        let alg = Algorithm::from_str(raw).map_err(|_| ConfigError::InvalidValue {
            name: ALLOWED_ALGORITHMS_ENV,
            reason: format!("unknown algorithm {raw:?}"),
        })?;
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    if algorithms.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: ALLOWED_ALGORITHMS_ENV,
            reason: "allow-list is empty".to_string(),
        });
    }
    Ok(algorithms)
}

#[cfg(test)]
impl AppConfig {
    pub(crate) fn from_pairs(vars: &[(&str, &str)]) -> Result<Self, ConfigError> {
        Self::from_source(|name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        })
    }
}
