// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors that run a request through an [`AuthGate`](super::AuthGate).
//!
//! ```rust,ignore
//! async fn client(Authorized(ctx): Authorized) -> impl IntoResponse {
//!     // ctx.token holds the verified bearer token
//! }
//!
//! async fn webhook(WebhookAuthorized(ctx): WebhookAuthorized) -> ProceedEnvelope {
//!     // ctx.webhook holds the parsed delivery
//! }
//! ```
//!
//! Both extractors consume the body, so they must be the last handler
//! argument.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};

use super::error::AuthError;
use super::gate::{AuthContext, Denial, Verdict};
use super::request::SignedRequest;
use crate::state::AppState;

/// Request that passed the API gate (signature and bearer lanes).
pub struct Authorized(pub AuthContext);

impl FromRequest<AppState> for Authorized {
    type Rejection = Denial;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let request = buffer(req, state).await?;
        state.api_gate.authorize(&request).await.into_result().map(Authorized)
    }
}

/// Webhook delivery that passed the webhook gate.
pub struct WebhookAuthorized(pub AuthContext);

impl FromRequest<AppState> for WebhookAuthorized {
    type Rejection = Denial;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let request = buffer(req, state).await?;
        match state.webhook_gate.authorize_webhook(&request).await {
            Verdict::Allow(ctx) => Ok(WebhookAuthorized(ctx)),
            Verdict::Deny(denial) => Err(denial),
        }
    }
}

/// Collect headers, query and the raw body bytes.
async fn buffer(req: Request, state: &AppState) -> Result<SignedRequest, Denial> {
    let headers = req.headers().clone();
    let query = req.uri().query().map(str::to_owned);

    let body = Bytes::from_request(req, state).await.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Failed to read request body");
        Denial::from(&AuthError::CredentialMalformed("request body unreadable"))
    })?;

    let request = SignedRequest::new(headers, body);
    Ok(match query {
        Some(query) => request.with_query(query),
        None => request,
    })
}
