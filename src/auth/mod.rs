// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies inbound requests before they reach handler code.
//!
//! ## Auth Flow
//!
//! 1. Webhook deliveries carry `x-oc-hash: base64(HMAC-SHA256(secret, body))`
//!    computed over the raw body bytes
//! 2. Proxied API calls carry `Authorization: Bearer <JWT>`; webhook
//!    deliveries carry the same kind of token as the envelope's `UserToken`
//! 3. The gate:
//!    - Checks the signature in constant time
//!    - Rejects tokens whose algorithm is `none` or outside the allow-list
//!    - Fetches the signing key from `<base>/oauth/certs/<kid>` (cached)
//!    - Verifies signature, expiry, not-before, issuer, audience
//!
//! ## Security
//!
//! - The certificate endpoint defaults to the configured API URL, never to a
//!   claim the token controls
//! - Keys are cached for 120 seconds, at most 5 at a time
//! - Clock skew tolerance is 60 seconds
//! - Deny responses never carry key, token or secret detail

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod jwks;
pub mod key_cache;
pub mod policy;
pub mod request;
pub mod signature;
pub mod token;

pub use claims::{DecodedToken, TokenClaims};
pub use error::{AuthError, Credential, InvalidReason, KeyError};
pub use extractor::{Authorized, WebhookAuthorized};
pub use gate::{AuthContext, AuthGate, Denial, Verdict};
pub use jwks::{KeyResolver, VerificationKey};
pub use key_cache::KeyCache;
pub use policy::{KeySource, SharedSecret, VerificationPolicy};
pub use request::SignedRequest;
pub use signature::SignatureValidator;
pub use token::TokenVerifier;
