// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;

use crate::auth::{Authorized, TokenClaims};

/// Identity of the verified caller.
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub roles: Vec<String>,
    /// Full verified claim set; absent when the bearer lane is off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
}

/// Sample proxied call: echoes who the bearer token says the caller is.
pub async fn client(Authorized(ctx): Authorized) -> Json<ClientResponse> {
    let claims = ctx.token.map(|t| t.claims);
    Json(ClientResponse {
        username: claims.as_ref().and_then(|c| c.username()).map(str::to_owned),
        client_id: claims.as_ref().and_then(|c| c.client_id()).map(str::to_owned),
        roles: claims
            .as_ref()
            .map(|c| c.roles().into_iter().map(str::to_owned).collect())
            .unwrap_or_default(),
        claims,
    })
}
