// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Webhook body signatures.
//!
//! The platform signs each webhook delivery with
//! `base64(HMAC-SHA256(secret, body))` and sends it in the `x-oc-hash`
//! header. The hash must be computed over the exact bytes received: a body
//! that was parsed and re-serialized (pretty-printed, key-reordered,
//! re-escaped) will not match, and that is an integration bug in the hosting
//! layer rather than a validator failure.

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::AuthError;
use super::policy::SharedSecret;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-oc-hash";

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature the platform would send for `body`.
///
/// # Errors
///
/// [`AuthError::Configuration`] if the secret is rejected as an HMAC key.
pub fn compute_signature(body: &[u8], secret: &str) -> Result<String, AuthError> {
    Ok(Base64::encode_string(&mac_for(body, secret)?.finalize().into_bytes()))
}

fn mac_for(body: &[u8], secret: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Configuration(format!("HMAC key error: {e}")))?;
    mac.update(body);
    Ok(mac)
}

/// Validates `x-oc-hash` signatures against a shared secret.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    secret: Option<SharedSecret>,
}

impl SignatureValidator {
    pub fn new(secret: Option<SharedSecret>) -> Self {
        Self { secret }
    }

    /// Check `supplied` against the HMAC of `body`.
    ///
    /// Returns `Ok(false)` for a mismatch, including a supplied value that is
    /// not valid base64. The digest comparison is constant-time.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] when no shared secret is configured.
    pub fn validate(&self, body: &[u8], supplied: &str) -> Result<bool, AuthError> {
        let secret = self.secret.as_ref().ok_or_else(|| {
            AuthError::Configuration("webhook signature required but no shared secret set".into())
        })?;

        let Ok(supplied_digest) = Base64::decode_vec(supplied.trim()) else {
            return Ok(false);
        };

        Ok(mac_for(body, secret.expose())?
            .verify_slice(&supplied_digest)
            .is_ok())
    }
}
