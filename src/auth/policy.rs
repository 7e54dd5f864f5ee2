// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification policy: which checks run and what they compare against.
//!
//! A policy is built once at startup (see [`crate::config::AppConfig`]) and
//! shared read-only between requests.

use std::fmt;

use jsonwebtoken::Algorithm;

/// Clock skew tolerance (60 seconds).
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

/// Shared HMAC secret for webhook signatures.
///
/// Debug output is redacted so the secret cannot end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Where the certificate endpoint base URL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySource {
    /// The configured API base URL
    #[default]
    Api,
    /// The token's `iss` claim
    Issuer,
    /// The token's `aud` claim (first entry when it is a list)
    Audience,
}

impl KeySource {
    /// Parse from a config string (case-insensitive).
    pub fn parse(s: &str) -> Option<KeySource> {
        match s.trim().to_lowercase().as_str() {
            "api" => Some(KeySource::Api),
            "issuer" | "iss" => Some(KeySource::Issuer),
            "audience" | "aud" => Some(KeySource::Audience),
            _ => None,
        }
    }
}

/// Immutable verification policy.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    /// Webhook bodies must carry a valid `x-oc-hash` signature
    pub require_signature: bool,
    /// A verified bearer token must be presented
    pub require_bearer: bool,
    /// HMAC secret used by the signature lane
    pub shared_secret: Option<SharedSecret>,
    /// Expected `iss` claim, checked when set
    pub expected_issuer: Option<String>,
    /// Expected `aud` claim, checked when set
    pub expected_audience: Option<String>,
    /// Signing algorithms a token may use
    pub allowed_algorithms: Vec<Algorithm>,
    /// Where to fetch verification keys from
    pub key_source: KeySource,
    /// API base URL, used by [`KeySource::Api`]
    pub api_base_url: String,
    /// Clock skew tolerance for `exp`/`nbf`
    pub leeway_secs: u64,
}

impl VerificationPolicy {
    /// Create a policy that requires a bearer token signed with RS256 and
    /// fetches keys from `api_base_url`.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            require_signature: false,
            require_bearer: true,
            shared_secret: None,
            expected_issuer: None,
            expected_audience: None,
            allowed_algorithms: vec![Algorithm::RS256],
            key_source: KeySource::Api,
            api_base_url: api_base_url.into(),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// Require webhook signatures computed with `secret`.
    pub fn with_signature(mut self, secret: impl Into<String>) -> Self {
        self.require_signature = true;
        self.shared_secret = Some(SharedSecret::new(secret));
        self
    }

    pub fn with_bearer(mut self, required: bool) -> Self {
        self.require_bearer = required;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience = Some(audience.into());
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    pub fn with_key_source(mut self, source: KeySource) -> Self {
        self.key_source = source;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Look up a header `alg` value in the allow-list.
    ///
    /// `none` never parses into an [`Algorithm`], so it is always rejected.
    pub fn allowed_algorithm(&self, alg: &str) -> Option<Algorithm> {
        alg.parse::<Algorithm>()
            .ok()
            .filter(|a| self.allowed_algorithms.contains(a))
    }
}
