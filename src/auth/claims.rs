// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT header and claims.
//!
//! [`DecodedToken::decode_untrusted`] reads a token without checking its
//! signature. It only exists to pick the key and algorithm; nothing it
//! returns is trusted until [`super::token::TokenVerifier`] has verified the
//! same token.

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::error::AuthError;

/// JOSE header fields the verifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenHeader {
    /// Signing algorithm as written in the token (may be `none`)
    pub alg: String,
    /// Key id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// `aud` is either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// First audience entry, used when keys are fetched from the audience.
    pub fn first(&self) -> Option<&str> {
        match self {
            Audience::One(aud) => Some(aud),
            Audience::Many(auds) => auds.first().map(String::as_str),
        }
    }

    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// NumericDate as whole seconds. Fractional values are floored.
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(secs) = number.as_i64() {
        return Ok(Some(secs));
    }
    match number.as_f64() {
        Some(secs) if secs.is_finite() && secs.abs() < i64::MAX as f64 => {
            Ok(Some(secs.floor() as i64))
        }
        _ => Err(de::Error::custom("NumericDate out of range")),
    }
}

/// Claims carried by a platform access token.
///
/// Standard registered claims are typed; everything else (`usr`, `cid`,
/// `role`, `usrtype`, ...) is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenClaims {
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Not before timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,

    /// Issued at timestamp
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Username (`usr` claim).
    pub fn username(&self) -> Option<&str> {
        self.extra.get("usr").and_then(|v| v.as_str())
    }

    /// API client id (`cid` claim).
    pub fn client_id(&self) -> Option<&str> {
        self.extra.get("cid").and_then(|v| v.as_str())
    }

    /// Granted roles (`role` claim, a string or a list of strings).
    pub fn roles(&self) -> Vec<&str> {
        match self.extra.get("role") {
            Some(serde_json::Value::String(role)) => vec![role.as_str()],
            Some(serde_json::Value::Array(roles)) => {
                roles.iter().filter_map(|r| r.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Header and claims of a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub claims: TokenClaims,
}

impl DecodedToken {
    /// Split and decode a token without verifying it.
    ///
    /// Never panics on arbitrary input; anything that is not three base64url
    /// segments with JSON header and claims is `CredentialMalformed`.
    ///
    /// # Errors
    ///
    /// [`AuthError::CredentialMalformed`] for structurally invalid tokens.
    pub fn decode_untrusted(token: &str) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        let (Some(header), Some(claims), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::CredentialMalformed("token is not a JWT"));
        };

        let header: TokenHeader = decode_segment(header)
            .ok_or(AuthError::CredentialMalformed("token header is not valid JSON"))?;
        let claims: TokenClaims = decode_segment(claims)
            .ok_or(AuthError::CredentialMalformed("token claims are not valid JSON"))?;

        Ok(Self { header, claims })
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Option<T> {
    let bytes = Base64UrlUnpadded::decode_vec(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
