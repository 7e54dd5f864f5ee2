// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request gate: runs the signature and bearer lanes and returns a verdict.
//!
//! ## Lanes
//!
//! - **Signature** (`require_signature`): `x-oc-hash` absent -> 401,
//!   mismatch -> 403 `signature invalid`
//! - **Bearer** (`require_bearer`): `Authorization` absent -> 403
//!   `bearer required`, token rejected -> 403 (400 when malformed)
//!
//! Webhook deliveries carry the user's token inside the body (`UserToken`)
//! rather than in a header; a rejected user token is answered with 400.
//!
//! A gate owns no per-request state. The verdict is a fresh value returned
//! alongside the untouched request.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::claims::DecodedToken;
use super::error::{AuthError, Credential};
use super::jwks::KeyResolver;
use super::policy::{KeySource, VerificationPolicy};
use super::request::SignedRequest;
use super::signature::SignatureValidator;
use super::token::TokenVerifier;
use crate::models::WebhookEvent;

/// What a request proved about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthContext {
    /// The body matched its `x-oc-hash` signature
    pub body_verified: bool,
    /// Verified bearer or user token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<DecodedToken>,
    /// Raw token string, for calling the platform API on the user's behalf
    #[serde(skip)]
    pub access_token: Option<String>,
    /// Parsed webhook metadata (webhook deliveries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookEvent>,
}

/// A rejected request: status plus a reason safe to show the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub status: StatusCode,
    pub reason: &'static str,
    pub error_code: &'static str,
}

impl From<&AuthError> for Denial {
    fn from(err: &AuthError) -> Self {
        Self {
            status: err.status_code(),
            reason: err.reason(),
            error_code: err.error_code(),
        }
    }
}

#[derive(Serialize)]
struct DenialBody {
    error: &'static str,
    error_code: &'static str,
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let body = Json(DenialBody {
            error: self.reason,
            error_code: self.error_code,
        });
        (self.status, body).into_response()
    }
}

/// Outcome of running a request through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow(AuthContext),
    Deny(Denial),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }

    pub fn into_result(self) -> Result<AuthContext, Denial> {
        match self {
            Verdict::Allow(ctx) => Ok(ctx),
            Verdict::Deny(denial) => Err(denial),
        }
    }
}

/// Authentication gate parameterized by one [`VerificationPolicy`].
pub struct AuthGate {
    policy: Arc<VerificationPolicy>,
    signatures: SignatureValidator,
    tokens: TokenVerifier,
}

impl AuthGate {
    /// Build a gate for `policy`, resolving keys through `resolver`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] if the policy requires signatures but has
    /// no shared secret, requires bearer tokens with an empty allow-list, or
    /// takes keys from a token claim without an expected value for it.
    pub fn new(policy: VerificationPolicy, resolver: Arc<KeyResolver>) -> Result<Self, AuthError> {
        if policy.require_signature && policy.shared_secret.is_none() {
            return Err(AuthError::Configuration(
                "signature lane enabled without a shared secret".to_string(),
            ));
        }
        if policy.require_bearer && policy.allowed_algorithms.is_empty() {
            return Err(AuthError::Configuration(
                "bearer lane enabled with an empty algorithm allow-list".to_string(),
            ));
        }
        let unbound_key_source = match policy.key_source {
            KeySource::Api => false,
            KeySource::Issuer => policy.expected_issuer.is_none(),
            KeySource::Audience => policy.expected_audience.is_none(),
        };
        if unbound_key_source {
            return Err(AuthError::Configuration(format!(
                "{:?} key source without an expected value",
                policy.key_source
            )));
        }

        let policy = Arc::new(policy);
        Ok(Self {
            signatures: SignatureValidator::new(policy.shared_secret.clone()),
            tokens: TokenVerifier::new(Arc::clone(&policy), resolver),
            policy,
        })
    }

    /// Verify a proxied API request: signature lane and `Authorization`
    /// bearer lane, each when the policy enables it.
    pub async fn authorize(&self, request: &SignedRequest) -> Verdict {
        let outcome = async {
            let mut ctx = AuthContext {
                body_verified: self.check_signature(request)?,
                ..AuthContext::default()
            };
            if self.policy.require_bearer {
                let token = request.bearer_token()?;
                ctx.token = Some(self.tokens.verify(token).await?);
                ctx.access_token = Some(token.to_string());
            }
            Ok::<_, AuthError>(ctx)
        }
        .await;

        match outcome {
            Ok(ctx) => Verdict::Allow(ctx),
            Err(err) => deny(&err),
        }
    }

    /// Verify a webhook delivery: signature lane, envelope parsing, then the
    /// envelope's `UserToken` when the bearer lane is enabled.
    pub async fn authorize_webhook(&self, request: &SignedRequest) -> Verdict {
        let body_verified = match self.check_signature(request) {
            Ok(verified) => verified,
            Err(err) => return deny(&err),
        };

        let Some((event, user_token)) = WebhookEvent::parse(request.body()) else {
            return deny(&AuthError::CredentialMalformed("webhook body missing"));
        };

        let mut ctx = AuthContext {
            body_verified,
            webhook: Some(event),
            ..AuthContext::default()
        };

        if self.policy.require_bearer {
            let Some(token) = user_token else {
                return deny(&AuthError::CredentialMissing(Credential::UserToken));
            };
            match self.tokens.verify(&token).await {
                Ok(decoded) => {
                    ctx.token = Some(decoded);
                    ctx.access_token = Some(token);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Webhook user token rejected");
                    return Verdict::Deny(Denial {
                        status: StatusCode::BAD_REQUEST,
                        reason: "invalid user token",
                        error_code: err.error_code(),
                    });
                }
            }
        }

        Verdict::Allow(ctx)
    }

    /// Signature lane. `Ok(false)` when the lane is disabled.
    fn check_signature(&self, request: &SignedRequest) -> Result<bool, AuthError> {
        if !self.policy.require_signature {
            return Ok(false);
        }
        let supplied = request
            .signature()
            .ok_or(AuthError::CredentialMissing(Credential::Signature))?;
        if self.signatures.validate(request.body(), supplied)? {
            Ok(true)
        } else {
            Err(AuthError::CredentialInvalid(
                super::error::InvalidReason::SignatureMismatch,
            ))
        }
    }
}

fn deny(err: &AuthError) -> Verdict {
    match err {
        AuthError::Configuration(_) | AuthError::KeyResolution(_) => {
            tracing::error!(error = %err, "Request denied");
        }
        _ => tracing::warn!(error = %err, code = err.error_code(), "Request denied"),
    }
    Verdict::Deny(Denial::from(err))
}
