// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every failure in the verification pipeline lands in one of five
//! categories. The category decides the HTTP status and the public reason;
//! the attached detail is for logs only and never reaches a response body.

use axum::http::StatusCode;

/// Which credential a request failed to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// The `x-oc-hash` webhook signature header
    Signature,
    /// The `Authorization: Bearer` header
    Bearer,
    /// The `UserToken` field of a webhook envelope
    UserToken,
}

/// Why a presented credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// HMAC over the body does not match the signature header
    SignatureMismatch,
    /// JWT signature does not verify against the resolved key
    TokenSignature,
    /// Token algorithm is `none` or outside the allow-list
    DisallowedAlgorithm,
    /// Token `exp` is in the past
    Expired,
    /// Token `nbf` is in the future
    NotYetValid,
    /// Token issuer differs from the expected issuer
    IssuerMismatch,
    /// Token audience differs from the expected audience
    AudienceMismatch,
}

/// Failure to obtain a verification key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Certificate endpoint unreachable, timed out, or returned non-2xx
    #[error("key fetch failed: {0}")]
    Fetch(String),
    /// Certificate document could not be turned into a verification key
    #[error("key format invalid: {0}")]
    Format(String),
}

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{} missing", credential_name(*.0))]
    CredentialMissing(Credential),

    #[error("credential malformed: {0}")]
    CredentialMalformed(&'static str),

    #[error("credential invalid: {0:?}")]
    CredentialInvalid(InvalidReason),

    #[error(transparent)]
    KeyResolution(#[from] KeyError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn credential_name(credential: Credential) -> &'static str {
    match credential {
        Credential::Signature => "signature header",
        Credential::Bearer => "bearer token",
        Credential::UserToken => "webhook user token",
    }
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::CredentialMissing(_) => "credential_missing",
            AuthError::CredentialMalformed(_) => "credential_malformed",
            AuthError::CredentialInvalid(_) => "credential_invalid",
            AuthError::KeyResolution(_) => "key_resolution_failed",
            AuthError::Configuration(_) => "configuration_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::CredentialMissing(Credential::Signature) => StatusCode::UNAUTHORIZED,
            AuthError::CredentialMissing(Credential::Bearer) => StatusCode::FORBIDDEN,
            AuthError::CredentialMissing(Credential::UserToken) => StatusCode::BAD_REQUEST,
            AuthError::CredentialMalformed(_) => StatusCode::BAD_REQUEST,
            AuthError::CredentialInvalid(_) | AuthError::KeyResolution(_) => StatusCode::FORBIDDEN,
            AuthError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable reason that is safe to return to the caller.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::CredentialMissing(Credential::Signature) => "signature header required",
            AuthError::CredentialMissing(Credential::Bearer) => "bearer required",
            AuthError::CredentialMissing(Credential::UserToken) => "user token required",
            AuthError::CredentialMalformed(reason) => reason,
            AuthError::CredentialInvalid(reason) => match reason {
                InvalidReason::SignatureMismatch => "signature invalid",
                InvalidReason::TokenSignature => "token signature invalid",
                InvalidReason::DisallowedAlgorithm => "token algorithm not allowed",
                InvalidReason::Expired => "token expired",
                InvalidReason::NotYetValid => "token not yet valid",
                InvalidReason::IssuerMismatch => "token issuer invalid",
                InvalidReason::AudienceMismatch => "token audience invalid",
            },
            AuthError::KeyResolution(_) => "verification key unavailable",
            AuthError::Configuration(_) => "authentication unavailable",
        }
    }
}
