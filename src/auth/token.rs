// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! 1. Decode header and claims without trust
//! 2. Check the header `alg` against the allow-list (`none` never passes)
//! 3. Pick the certificate base (API URL, `iss` or `aud`) and resolve `kid`
//! 4. Verify signature, `exp`/`nbf`, and issuer/audience when configured
//!
//! Any failure ends verification; a caller only ever sees a fully verified
//! [`DecodedToken`] or an error.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Validation};

use super::claims::{Audience, DecodedToken, TokenClaims};
use super::error::{AuthError, InvalidReason};
use super::jwks::KeyResolver;
use super::policy::{KeySource, VerificationPolicy};

/// Verifies bearer tokens against keys from a [`KeyResolver`].
pub struct TokenVerifier {
    policy: Arc<VerificationPolicy>,
    resolver: Arc<KeyResolver>,
}

impl TokenVerifier {
    pub fn new(policy: Arc<VerificationPolicy>, resolver: Arc<KeyResolver>) -> Self {
        Self { policy, resolver }
    }

    /// Verify `token` and return its trusted header and claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CredentialMalformed`]: not a JWT, bad JSON, no `kid`
    /// - [`AuthError::KeyResolution`]: key could not be fetched or converted
    /// - [`AuthError::CredentialInvalid`]: signature, algorithm or claim check
    ///   failed
    pub async fn verify(&self, token: &str) -> Result<DecodedToken, AuthError> {
        let untrusted = DecodedToken::decode_untrusted(token)?;

        let algorithm = self
            .policy
            .allowed_algorithm(&untrusted.header.alg)
            .ok_or(AuthError::CredentialInvalid(InvalidReason::DisallowedAlgorithm))?;

        let kid = untrusted
            .header
            .kid
            .as_deref()
            .ok_or(AuthError::CredentialMalformed("token header has no key id"))?;

        let base = self.key_base(&untrusted.claims)?;
        let key = self.resolver.resolve(base, kid).await?;

        // A key published for one algorithm must not verify another
        if key.algorithm.is_some_and(|pinned| pinned != algorithm) {
            return Err(AuthError::CredentialInvalid(
                InvalidReason::DisallowedAlgorithm,
            ));
        }

        // Signature and algorithm only; registered claims go through `check_claims`
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &key.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidAlgorithm => {
                    AuthError::CredentialInvalid(InvalidReason::DisallowedAlgorithm)
                }
                ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    AuthError::CredentialMalformed("token is not a JWT")
                }
                _ => AuthError::CredentialInvalid(InvalidReason::TokenSignature),
            }
        })?;

        self.check_claims(&data.claims, chrono::Utc::now().timestamp())?;

        Ok(DecodedToken {
            header: untrusted.header,
            claims: data.claims,
        })
    }

    /// Time window, issuer and audience of a token whose signature verified.
    ///
    /// `exp` is required; `iss`/`aud` are required whenever the policy
    /// expects a value for them.
    fn check_claims(&self, claims: &TokenClaims, now: i64) -> Result<(), AuthError> {
        let leeway = i64::try_from(self.policy.leeway_secs).unwrap_or(i64::MAX);

        let exp = claims
            .exp
            .ok_or(AuthError::CredentialMalformed("token is missing a required claim"))?;
        if exp.saturating_add(leeway) < now {
            return Err(AuthError::CredentialInvalid(InvalidReason::Expired));
        }
        if claims.nbf.is_some_and(|nbf| nbf > now.saturating_add(leeway)) {
            return Err(AuthError::CredentialInvalid(InvalidReason::NotYetValid));
        }

        if let Some(ref expected) = self.policy.expected_issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                return Err(AuthError::CredentialInvalid(InvalidReason::IssuerMismatch));
            }
        }
        if let Some(ref expected) = self.policy.expected_audience {
            if !claims.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
                return Err(AuthError::CredentialInvalid(InvalidReason::AudienceMismatch));
            }
        }
        Ok(())
    }

    /// Certificate base URL for a token, per the configured key source.
    ///
    /// Claim-derived bases must equal the configured issuer/audience before
    /// anything is fetched from them.
    fn key_base<'a>(&'a self, claims: &'a TokenClaims) -> Result<&'a str, AuthError> {
        match self.policy.key_source {
            KeySource::Api => Ok(self.policy.api_base_url.as_str()),
            KeySource::Issuer => {
                let iss = claims
                    .iss
                    .as_deref()
                    .ok_or(AuthError::CredentialMalformed("token has no issuer"))?;
                let expected = self.policy.expected_issuer.as_deref().ok_or_else(|| {
                    AuthError::Configuration("issuer key source without an expected issuer".into())
                })?;
                if iss != expected {
                    return Err(AuthError::CredentialInvalid(InvalidReason::IssuerMismatch));
                }
                Ok(iss)
            }
            KeySource::Audience => {
                let aud = claims
                    .aud
                    .as_ref()
                    .and_then(Audience::first)
                    .ok_or(AuthError::CredentialMalformed("token has no audience"))?;
                let expected = self.policy.expected_audience.as_deref().ok_or_else(|| {
                    AuthError::Configuration(
                        "audience key source without an expected audience".into(),
                    )
                })?;
                if aud != expected {
                    return Err(AuthError::CredentialInvalid(InvalidReason::AudienceMismatch));
                }
                Ok(aud)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::auth::key_cache::KeyCache;
    use crate::auth::jwks::DEFAULT_FETCH_TIMEOUT;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn cert_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/certs/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issuer_jwk()))
            .mount(&server)
            .await;
        server
    }

    fn verifier(policy: VerificationPolicy) -> TokenVerifier {
        let resolver =
            KeyResolver::new(Arc::new(KeyCache::default()), DEFAULT_FETCH_TIMEOUT).unwrap();
        TokenVerifier::new(Arc::new(policy), Arc::new(resolver))
    }

    fn claims(iss: &str) -> serde_json::Value {
        json!({
            "sub": "buyer01",
            "usr": "buyer01",
            "cid": "client-1",
            "iss": iss,
            "aud": "https://api.example",
            "exp": now() + 600,
            "nbf": now() - 10,
        })
    }

    fn forged(header: serde_json::Value, claims: serde_json::Value, sig: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string()),
            sig
        )
    }

    #[tokio::test]
    async fn verifies_valid_token() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));

        let decoded = v.verify(&token).await.unwrap();
        assert_eq!(decoded.header.kid.as_deref(), Some("abc123"));
        assert_eq!(decoded.claims.username(), Some("buyer01"));
        assert_eq!(decoded.claims.client_id(), Some("client-1"));
    }

    #[tokio::test]
    async fn rejects_alg_none_without_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issuer_jwk()))
            .expect(0)
            .mount(&server)
            .await;
        let v = verifier(VerificationPolicy::new(server.uri()));

        for sig in ["", "fabricated"] {
            let token = forged(
                json!({"alg": "none", "kid": "abc123"}),
                claims(&server.uri()),
                sig,
            );
            assert!(matches!(
                v.verify(&token).await,
                Err(AuthError::CredentialInvalid(InvalidReason::DisallowedAlgorithm))
            ));
        }
    }

    #[tokio::test]
    async fn rejects_algorithm_outside_allow_list() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));

        // HS256 signed with the public key material is the classic confusion attack
        let token = forged(
            json!({"alg": "HS256", "kid": "abc123"}),
            claims(&server.uri()),
            "AAAA",
        );
        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::DisallowedAlgorithm))
        ));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let mut c = claims(&server.uri());
        c["exp"] = json!(now() - 3600);
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::Expired))
        ));
    }

    #[tokio::test]
    async fn rejects_token_without_exp() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let mut c = claims(&server.uri());
        c.as_object_mut().unwrap().remove("exp");
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialMalformed(_))
        ));
    }

    #[tokio::test]
    async fn rejects_signature_from_other_key() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let token = sign(ROGUE_KEY_PEM, "abc123", &claims(&server.uri()));

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::TokenSignature))
        ));
    }

    #[tokio::test]
    async fn rejects_issuer_mismatch() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()).with_issuer("https://auth.example"));
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims("https://evil.example"));

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::IssuerMismatch))
        ));
    }

    #[tokio::test]
    async fn rejects_audience_mismatch() {
        let server = cert_server().await;
        let v = verifier(
            VerificationPolicy::new(server.uri()).with_audience("https://other-api.example"),
        );
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::AudienceMismatch))
        ));
    }

    #[tokio::test]
    async fn accepts_matching_issuer_and_audience() {
        let server = cert_server().await;
        let v = verifier(
            VerificationPolicy::new(server.uri())
                .with_issuer(server.uri())
                .with_audience("https://api.example"),
        );
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));
        assert!(v.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn issuer_key_source_fetches_from_iss() {
        let server = cert_server().await;
        let v = verifier(
            VerificationPolicy::new("https://unused.example")
                .with_key_source(KeySource::Issuer)
                .with_issuer(server.uri()),
        );
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));
        assert!(v.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn issuer_key_source_checks_issuer_before_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issuer_jwk()))
            .expect(0)
            .mount(&server)
            .await;
        let v = verifier(
            VerificationPolicy::new("https://unused.example")
                .with_key_source(KeySource::Issuer)
                .with_issuer("https://auth.example"),
        );
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));

        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialInvalid(InvalidReason::IssuerMismatch))
        ));
    }

    #[tokio::test]
    async fn audience_key_source_fetches_from_aud() {
        let server = cert_server().await;
        let v = verifier(
            VerificationPolicy::new("https://unused.example")
                .with_key_source(KeySource::Audience)
                .with_audience(server.uri()),
        );
        let mut c = claims("https://auth.example");
        c["aud"] = json!(server.uri());
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);
        assert!(v.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_issuer_when_one_is_expected() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()).with_issuer("https://auth.example"));
        let mut c = claims("unused");
        c.as_object_mut().unwrap().remove("iss");
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);

        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::CredentialInvalid(InvalidReason::IssuerMismatch)
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejects_missing_audience_when_one_is_expected() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()).with_audience("https://api.example"));
        let mut c = claims(&server.uri());
        c.as_object_mut().unwrap().remove("aud");
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);

        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::CredentialInvalid(InvalidReason::AudienceMismatch)
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn audience_list_must_contain_expected() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()).with_audience("https://api.example"));

        let mut c = claims(&server.uri());
        c["aud"] = json!(["https://other.example", "https://api.example"]);
        assert!(v.verify(&sign(ISSUER_KEY_PEM, "abc123", &c)).await.is_ok());

        c["aud"] = json!(["https://other.example"]);
        assert!(matches!(
            v.verify(&sign(ISSUER_KEY_PEM, "abc123", &c)).await,
            Err(AuthError::CredentialInvalid(InvalidReason::AudienceMismatch))
        ));
    }

    #[tokio::test]
    async fn accepts_fractional_numeric_dates() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let issued = now();
        let mut c = claims(&server.uri());
        c["exp"] = json!(issued as f64 + 600.5);
        c["iat"] = json!(issued as f64 - 0.25);

        let decoded = v.verify(&sign(ISSUER_KEY_PEM, "abc123", &c)).await.unwrap();
        assert_eq!(decoded.claims.exp, Some(issued + 600));
        assert_eq!(decoded.claims.iat, Some(issued - 1));
    }

    #[tokio::test]
    async fn rejects_token_not_yet_valid() {
        let server = cert_server().await;
        let v = verifier(VerificationPolicy::new(server.uri()));
        let mut c = claims(&server.uri());
        c["nbf"] = json!(now() + 3600);

        assert!(matches!(
            v.verify(&sign(ISSUER_KEY_PEM, "abc123", &c)).await,
            Err(AuthError::CredentialInvalid(InvalidReason::NotYetValid))
        ));
    }

    #[tokio::test]
    async fn leeway_covers_small_clock_skew() {
        let server = cert_server().await;
        let mut c = claims(&server.uri());
        c["exp"] = json!(now() - 30);
        let token = sign(ISSUER_KEY_PEM, "abc123", &c);

        assert!(verifier(VerificationPolicy::new(server.uri())).verify(&token).await.is_ok());
        assert!(matches!(
            verifier(VerificationPolicy::new(server.uri()).with_leeway(0))
                .verify(&token)
                .await,
            Err(AuthError::CredentialInvalid(InvalidReason::Expired))
        ));
    }

    #[tokio::test]
    async fn claim_key_source_without_expected_value_is_configuration_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(issuer_jwk()))
            .expect(0)
            .mount(&server)
            .await;
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims(&server.uri()));

        for source in [KeySource::Issuer, KeySource::Audience] {
            let v = verifier(VerificationPolicy::new("https://unused.example").with_key_source(source));
            assert!(matches!(
                v.verify(&token).await,
                Err(AuthError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn missing_kid_is_malformed() {
        let v = verifier(VerificationPolicy::new("https://unused.example"));
        let token = forged(json!({"alg": "RS256"}), claims("x"), "sig");
        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::CredentialMalformed("token header has no key id"))
        ));
    }

    #[tokio::test]
    async fn unreachable_key_endpoint_is_key_resolution_error() {
        let v = verifier(VerificationPolicy::new("http://127.0.0.1:9"));
        let token = sign(ISSUER_KEY_PEM, "abc123", &claims("x"));
        assert!(matches!(
            v.verify(&token).await,
            Err(AuthError::KeyResolution(_))
        ));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let v = verifier(VerificationPolicy::new("https://unused.example"));
        assert!(matches!(
            v.verify("definitely not a token").await,
            Err(AuthError::CredentialMalformed(_))
        ));
    }
}
