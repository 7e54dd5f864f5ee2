// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod client;
pub mod health;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/webhook", post(webhook::webhook))
        .route("/api/client", get(client::client).post(client::client))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
