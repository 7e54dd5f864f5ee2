// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use serde_json::{json, Map, Value};

use crate::auth::WebhookAuthorized;
use crate::models::ProceedEnvelope;

/// Marker set in the payload's `xp` object.
pub const WEBHOOK_MARKER: &str = "webhook-fired";

/// Sample pre-webhook: tags the request payload and lets the operation
/// proceed with it.
pub async fn webhook(WebhookAuthorized(ctx): WebhookAuthorized) -> ProceedEnvelope {
    let Some(event) = ctx.webhook else {
        return ProceedEnvelope::halt("InvalidPayload", "webhook body missing");
    };
    tracing::info!(
        route = event.route.as_deref().unwrap_or("-"),
        log_id = event.log_id.as_deref().unwrap_or("-"),
        user = ctx.token.as_ref().and_then(|t| t.claims.username()).unwrap_or("-"),
        "Webhook received"
    );

    let mut body = event.payload.unwrap_or_else(|| Value::Object(Map::new()));
    let Some(fields) = body.as_object_mut() else {
        return ProceedEnvelope::halt("InvalidPayload", "webhook payload is not an object");
    };
    let xp = fields.entry("xp").or_insert_with(|| json!({}));
    if xp.is_null() {
        *xp = json!({});
    }
    let Some(xp) = xp.as_object_mut() else {
        return ProceedEnvelope::halt("InvalidPayload", "payload xp is not an object");
    };
    xp.insert(WEBHOOK_MARKER.to_string(), json!("yipeee"));

    ProceedEnvelope::proceed(Some(body))
}
