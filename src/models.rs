// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Webhook payload and response shapes.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Webhook delivery body as sent by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebhookEnvelope {
    #[serde(default)]
    route: Option<String>,
    #[serde(default)]
    route_params: Option<Value>,
    #[serde(default)]
    verb: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "LogID")]
    log_id: Option<String>,
    #[serde(default)]
    request: Option<EnvelopeRequest>,
    #[serde(default)]
    config_data: Option<Value>,
    #[serde(default)]
    user_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnvelopeRequest {
    #[serde(default)]
    body: Option<Value>,
}

/// Webhook metadata extracted after the delivery passed verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEvent {
    /// Route that triggered the webhook, e.g. `v1/orders/{direction}/{orderID}/submit`
    pub route: Option<String>,
    pub route_params: Value,
    pub verb: Option<String>,
    /// Delivery time; `None` when absent or not ISO-8601
    pub timestamp: Option<DateTime<Utc>>,
    pub log_id: Option<String>,
    /// Body of the original API request
    pub payload: Option<Value>,
    pub config_data: Option<Value>,
}

impl WebhookEvent {
    /// Parse a raw webhook body into the event plus its `UserToken`.
    ///
    /// Returns `None` when the body is empty or not a JSON object.
    pub fn parse(body: &[u8]) -> Option<(WebhookEvent, Option<String>)> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        let envelope: WebhookEnvelope = serde_json::from_slice(body).ok()?;
        let event = WebhookEvent {
            route: envelope.route,
            route_params: envelope.route_params.unwrap_or(Value::Object(Default::default())),
            verb: envelope.verb,
            timestamp: envelope.date.as_deref().and_then(parse_timestamp),
            log_id: envelope.log_id,
            payload: envelope.request.and_then(|r| r.body),
            config_data: envelope.config_data,
        };
        let user_token = envelope.user_token.filter(|t| !t.trim().is_empty());
        Some((event, user_token))
    }
}

/// Parse an ISO-8601 timestamp; a missing offset is read as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Uniform webhook answer: `{ "proceed": bool, "body": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProceedEnvelope {
    pub proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ProceedEnvelope {
    pub fn proceed(body: Option<Value>) -> Self {
        Self {
            proceed: true,
            body,
        }
    }

    /// Stop the platform operation, reporting `name: message` back to it.
    pub fn halt(name: &str, message: &str) -> Self {
        Self {
            proceed: false,
            body: Some(serde_json::json!({ "name": name, "message": message })),
        }
    }
}

impl IntoResponse for ProceedEnvelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
