// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response with the active verification setup.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: &'static str,
    pub api_url: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub checks: HealthChecks,
}

/// Which lanes are enforced, and the key cache fill level.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub signature_required: bool,
    pub bearer_required: bool,
    pub cached_keys: usize,
    pub key_ttl_secs: u64,
}

/// Liveness and configuration report. Never touches the network.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        status: "ok",
        api_url: config.api_url.clone(),
        api_version: config.api_version.clone(),
        client_id: config.client_id.clone(),
        checks: HealthChecks {
            signature_required: config.require_signature,
            bearer_required: config.require_bearer,
            cached_keys: state.key_cache.len(),
            key_ttl_secs: state.key_cache.ttl().as_secs(),
        },
    })
}
