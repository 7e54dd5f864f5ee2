// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Immutable view of an inbound request.

use axum::body::Bytes;
use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::error::{AuthError, Credential};
use super::signature::SIGNATURE_HEADER;

/// Raw body, headers and query string of a request awaiting verification.
///
/// The body is kept exactly as received so the webhook signature can be
/// checked over the original bytes.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    headers: HeaderMap,
    body: Bytes,
    query: Option<String>,
}

impl SignedRequest {
    pub fn new(headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// The declared `x-oc-hash` signature, if any.
    pub fn signature(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER).filter(|s| !s.trim().is_empty())
    }

    /// Token from `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// `CredentialMissing(Bearer)` when the header is absent or empty,
    /// `CredentialMalformed` when it uses another scheme.
    pub fn bearer_token(&self) -> Result<&str, AuthError> {
        let value = self
            .header(AUTHORIZATION.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::CredentialMissing(Credential::Bearer))?;

        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
            _ => Err(AuthError::CredentialMalformed(
                "authorization header is not a bearer token",
            )),
        }
    }
}
