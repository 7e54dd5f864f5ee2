// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthError, AuthGate, KeyCache, KeyResolver};
use crate::config::AppConfig;

/// Shared handler state.
///
/// Both gates resolve keys through the same cache.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub api_gate: Arc<AuthGate>,
    pub webhook_gate: Arc<AuthGate>,
    pub key_cache: Arc<KeyCache>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AuthError> {
        let key_cache = Arc::new(KeyCache::new(config.key_cache_capacity, config.key_cache_ttl));
        let resolver = Arc::new(KeyResolver::new(
            Arc::clone(&key_cache),
            config.key_fetch_timeout,
        )?);

        Ok(Self {
            api_gate: Arc::new(AuthGate::new(config.api_policy(), Arc::clone(&resolver))?),
            webhook_gate: Arc::new(AuthGate::new(config.webhook_policy(), resolver)?),
            config: Arc::new(config),
            key_cache,
        })
    }
}
