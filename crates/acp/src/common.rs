//! Shared response helpers and the two auth/idempotency primitives every
//! mutating handler is built from.

use crate::state::AcpStateInner;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use std::future::Future;
use std::net::SocketAddr;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Value) {
    (status, json!({ "error": message.into() }))
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(status, json!({ "error": message.into() }))
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    json_bytes_response(status, serde_json::to_vec(&body).unwrap_or_default())
}

fn json_bytes_response(status: StatusCode, bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("static response parts are always valid")
}

/// Wraps a mutating handler body with `X-Idempotency-Key` replay semantics.
/// A cache hit returns the stored bytes verbatim without calling `f`; a miss
/// runs `f`, and a successful result is cached under the key for later replay.
pub async fn idempotent<F, Fut>(state: &AcpStateInner, headers: &HeaderMap, f: F) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = (StatusCode, Value)>,
{
    let key = headers
        .get("X-Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    if let Some(key) = &key {
        if let Some(cached) = state.idempotency.get(key).await {
            let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
            return json_bytes_response(status, cached.body);
        }
    }

    let (status, body) = f().await;
    let bytes = serde_json::to_vec(&body).unwrap_or_default();

    if let Some(key) = &key {
        if status.is_success() {
            state.idempotency.set(key, status.as_u16(), bytes.clone()).await;
        }
    }

    json_bytes_response(status, bytes)
}

/// Checks `Authorization: Bearer <token>` against `expected`, returning the
/// 401 response to send on failure. Comparison is plain equality — tokens
/// are expected to be high-entropy and the attacker must already have
/// network access to present one at all.
pub fn check_bearer(expected: &str, headers: &HeaderMap) -> Result<(), Response> {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "missing bearer token"));
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "missing bearer token"));
    };
    if token != expected {
        return Err(error_response(StatusCode::UNAUTHORIZED, "invalid bearer token"));
    }
    Ok(())
}

/// Built-in gateways (cron, and any in-process producer) always talk to the
/// server over loopback, so loopback callers bypass the bearer check.
pub fn is_loopback(peer: SocketAddr, headers: &HeaderMap) -> bool {
    if peer.ip().is_loopback() {
        return true;
    }
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h) == "localhost")
        .unwrap_or(false)
}
