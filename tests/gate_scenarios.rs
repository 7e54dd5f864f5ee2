// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end gate scenarios against a mock certificate endpoint.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use oc_auth_gate::auth::{
    jwks::DEFAULT_FETCH_TIMEOUT, signature::compute_signature, AuthGate, KeyCache, KeyResolver,
    KeySource, SignedRequest, Verdict, VerificationPolicy,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUER_KEY_PEM: &str = include_str!("fixtures/issuer_signing_key.pem");
const ISSUER_JWK: &str = include_str!("fixtures/issuer_signing_key.jwk.json");

const CHECKOUT_BODY: &str =
    r#"{"Route":"/checkout","RouteParams":{},"Date":"2023-01-01T00:00:00Z"}"#;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sign(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(ISSUER_KEY_PEM.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

fn resolver() -> Arc<KeyResolver> {
    Arc::new(KeyResolver::new(Arc::new(KeyCache::default()), DEFAULT_FETCH_TIMEOUT).unwrap())
}

fn request(headers: &[(&'static str, String)], body: &str) -> SignedRequest {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    SignedRequest::new(map, body.to_string())
}

async fn cert_server(expected_fetches: u64) -> MockServer {
    let server = MockServer::start().await;
    let jwk: Value = serde_json::from_str(ISSUER_JWK).unwrap();
    Mock::given(method("GET"))
        .and(path("/oauth/certs/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwk))
        .expect(expected_fetches)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn signed_checkout_webhook_is_allowed() {
    let policy = VerificationPolicy::new("https://unused.example")
        .with_signature("s3cret")
        .with_bearer(false);
    let gate = AuthGate::new(policy, resolver()).unwrap();
    let sig = compute_signature(CHECKOUT_BODY.as_bytes(), "s3cret").unwrap();

    let verdict = gate
        .authorize(&request(&[("x-oc-hash", sig)], CHECKOUT_BODY))
        .await;
    assert!(verdict.is_allowed());
}

#[tokio::test]
async fn appended_character_in_signature_is_denied() {
    let policy = VerificationPolicy::new("https://unused.example")
        .with_signature("s3cret")
        .with_bearer(false);
    let gate = AuthGate::new(policy, resolver()).unwrap();
    let sig = format!(
        "{}A",
        compute_signature(CHECKOUT_BODY.as_bytes(), "s3cret").unwrap()
    );

    match gate
        .authorize(&request(&[("x-oc-hash", sig)], CHECKOUT_BODY))
        .await
    {
        Verdict::Deny(denial) => {
            assert_eq!(denial.status, StatusCode::FORBIDDEN);
            assert_eq!(denial.reason, "signature invalid");
        }
        Verdict::Allow(_) => panic!("tampered signature accepted"),
    }
}

#[tokio::test]
async fn uncached_kid_is_fetched_once_from_issuer() {
    let server = cert_server(1).await;
    let issuer = server.uri();
    let policy = VerificationPolicy::new("https://unused.example")
        .with_issuer(issuer.clone())
        .with_key_source(KeySource::Issuer);
    let resolver = resolver();
    let gate = AuthGate::new(policy, Arc::clone(&resolver)).unwrap();

    let token = sign(
        "abc123",
        &json!({"sub": "buyer01", "iss": issuer, "exp": now() + 600}),
    );
    let bearer = request(&[("authorization", format!("Bearer {token}"))], "");

    assert!(gate.authorize(&bearer).await.is_allowed());
    assert!(gate.authorize(&bearer).await.is_allowed());
    assert_eq!(resolver.cache().len(), 1);
    // MockServer verifies `.expect(1)` on drop
}

#[tokio::test]
async fn unsigned_token_never_reaches_the_key_endpoint() {
    let server = cert_server(0).await;
    let gate = AuthGate::new(VerificationPolicy::new(server.uri()), resolver()).unwrap();

    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","kid":"abc123"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"admin","exp":{}}}"#, now() + 600));
    for token in [
        format!("{header}.{claims}."),
        format!("{header}.{claims}.{}", URL_SAFE_NO_PAD.encode("forged")),
    ] {
        let verdict = gate
            .authorize(&request(&[("authorization", format!("Bearer {token}"))], ""))
            .await;
        assert!(!verdict.is_allowed());
    }
}

#[tokio::test]
async fn expired_token_is_denied() {
    let server = cert_server(1).await;
    let gate = AuthGate::new(VerificationPolicy::new(server.uri()), resolver()).unwrap();
    let token = sign("abc123", &json!({"sub": "buyer01", "exp": now() - 3600}));

    match gate
        .authorize(&request(&[("authorization", format!("Bearer {token}"))], ""))
        .await
    {
        Verdict::Deny(denial) => {
            assert_eq!(denial.status, StatusCode::FORBIDDEN);
            assert_eq!(denial.reason, "token expired");
        }
        Verdict::Allow(_) => panic!("expired token accepted"),
    }
}

#[tokio::test]
async fn webhook_with_user_token_passes_both_lanes() {
    let server = cert_server(1).await;
    let policy = VerificationPolicy::new(server.uri()).with_signature("s3cret");
    let gate = AuthGate::new(policy, resolver()).unwrap();

    let body = json!({
        "Route": "/checkout",
        "RouteParams": {},
        "Date": "2023-01-01T00:00:00Z",
        "UserToken": sign("abc123", &json!({"sub": "buyer01", "exp": now() + 600})),
    })
    .to_string();
    let sig = compute_signature(body.as_bytes(), "s3cret").unwrap();

    let ctx = gate
        .authorize_webhook(&request(&[("x-oc-hash", sig)], &body))
        .await
        .into_result()
        .unwrap();
    assert!(ctx.body_verified);
    assert!(ctx.access_token.is_some());
    assert_eq!(ctx.webhook.unwrap().route.as_deref(), Some("/checkout"));
}
