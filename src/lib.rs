// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! oc-auth-gate - request authentication for commerce webhooks and proxied
//! API calls.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - webhook signatures, bearer tokens, key cache, gate
//! - `config` - environment configuration
//! - `models` - webhook envelope and proceed response

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod state;
