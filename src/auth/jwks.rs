// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification key fetching and caching.
//!
//! Keys are published one per id at `<base>/oauth/certs/<kid>`. A resolved
//! key is cached under its full certificate URL, so the same kid served by
//! two different bases never collides.
//!
//! ## Known inefficiency
//!
//! Concurrent misses for the same kid are not coalesced: each one fetches,
//! and the last write wins in the cache. This costs duplicate requests only
//! during the first burst after a key appears or expires.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use url::Url;

use super::error::{AuthError, KeyError};
use super::key_cache::KeyCache;

/// Default certificate fetch timeout (5 seconds).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A key ready to verify token signatures.
#[derive(Clone)]
pub struct VerificationKey {
    /// Key id the key was published under
    pub kid: String,
    /// Algorithm pinned by the JWK `alg` member, if any
    pub algorithm: Option<Algorithm>,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl VerificationKey {
    pub(crate) fn from_secret_for_tests(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            algorithm: Some(Algorithm::HS256),
            decoding_key: DecodingKey::from_secret(kid.as_bytes()),
        }
    }
}

/// Certificate endpoints answer with a single JWK; a set is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum CertDocument {
    Set(JwkSet),
    Single(Box<Jwk>),
}

/// Resolves key ids to verification keys, going to the network only on a
/// cache miss.
pub struct KeyResolver {
    cache: Arc<KeyCache>,
    client: reqwest::Client,
}

impl KeyResolver {
    /// Create a resolver backed by `cache`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] if the HTTP client cannot be built.
    pub fn new(cache: Arc<KeyCache>, fetch_timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { cache, client })
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Resolve `kid` published under `base`.
    ///
    /// # Errors
    ///
    /// [`KeyError::Fetch`] when the endpoint is unreachable, times out or
    /// answers non-2xx; [`KeyError::Format`] when the document is not a
    /// usable key.
    pub async fn resolve(&self, base: &str, kid: &str) -> Result<Arc<VerificationKey>, KeyError> {
        let url = cert_url(base, kid)?;

        // Check cache first
        if let Some(key) = self.cache.get(url.as_str()) {
            tracing::debug!(kid, "Key cache hit");
            return Ok(key);
        }

        tracing::info!(kid, url = %url, "Fetching verification key");
        let key = Arc::new(self.fetch_key(&url, kid).await?);

        // Lock is not held across the fetch above
        self.cache.put(url.as_str(), Arc::clone(&key));

        Ok(key)
    }

    /// Fetch a key document from the certificate endpoint.
    async fn fetch_key(&self, url: &Url, kid: &str) -> Result<VerificationKey, KeyError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KeyError::Fetch("certificate endpoint timed out".to_string())
                } else {
                    KeyError::Fetch(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(KeyError::Fetch(format!(
                "HTTP {} from certificate endpoint",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeyError::Fetch(e.to_string()))?;

        let document: CertDocument = serde_json::from_slice(&body)
            .map_err(|e| KeyError::Format(format!("not a JWK document: {e}")))?;

        let jwk = match document {
            CertDocument::Single(jwk) => *jwk,
            CertDocument::Set(set) => set
                .keys
                .into_iter()
                .find(|k| k.common.key_id.as_deref() == Some(kid))
                .ok_or_else(|| KeyError::Format(format!("no key with id {kid} in key set")))?,
        };

        if let Some(published) = jwk.common.key_id.as_deref() {
            if published != kid {
                return Err(KeyError::Format(format!(
                    "endpoint returned key {published} for {kid}"
                )));
            }
        }

        let (decoding_key, algorithm) = jwk_to_decoding_key(&jwk)?;
        Ok(VerificationKey {
            kid: kid.to_string(),
            algorithm,
            decoding_key,
        })
    }
}

/// Build `<base>/oauth/certs/<kid>`, percent-encoding the kid as a single
/// path segment.
fn cert_url(base: &str, kid: &str) -> Result<Url, KeyError> {
    let mut url = Url::parse(base)
        .map_err(|e| KeyError::Fetch(format!("invalid certificate base URL: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(KeyError::Fetch(format!(
            "unsupported certificate URL scheme: {}",
            url.scheme()
        )));
    }
    url.path_segments_mut()
        .map_err(|()| KeyError::Fetch("certificate base URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["oauth", "certs", kid]);
    Ok(url)
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Option<Algorithm>), KeyError> {
    let algorithm = jwk.common.key_algorithm.map(key_algorithm).transpose()?;

    let key = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| KeyError::Format(format!("Failed to create RSA key: {e}")))?,
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y)
            .map_err(|e| KeyError::Format(format!("Failed to create EC key: {e}")))?,
        AlgorithmParameters::OctetKeyPair(okp) => DecodingKey::from_ed_components(&okp.x)
            .map_err(|e| KeyError::Format(format!("Failed to create EdDSA key: {e}")))?,
        // Symmetric keys are never published on a certificate endpoint
        _ => {
            return Err(KeyError::Format(
                "symmetric key on certificate endpoint".to_string(),
            ))
        }
    };

    Ok((key, algorithm))
}

fn key_algorithm(alg: KeyAlgorithm) -> Result<Algorithm, KeyError> {
    match alg {
        KeyAlgorithm::RS256 => Ok(Algorithm::RS256),
        KeyAlgorithm::RS384 => Ok(Algorithm::RS384),
        KeyAlgorithm::RS512 => Ok(Algorithm::RS512),
        KeyAlgorithm::PS256 => Ok(Algorithm::PS256),
        KeyAlgorithm::PS384 => Ok(Algorithm::PS384),
        KeyAlgorithm::PS512 => Ok(Algorithm::PS512),
        KeyAlgorithm::ES256 => Ok(Algorithm::ES256),
        KeyAlgorithm::ES384 => Ok(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Ok(Algorithm::EdDSA),
        other => Err(KeyError::Format(format!(
            "unsupported key algorithm {other:?}"
        ))),
    }
}
