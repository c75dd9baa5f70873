//! `/events/{source}` ingress: source validation against the active config,
//! dispatch by gateway type, and the two distinct auth regimes (bearer with
//! a loopback bypass, and raw-body HMAC-SHA256 for webhooks).

use crate::common::{check_bearer, error_response, is_loopback};
use crate::state::AcpState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use futures::StreamExt;
use gosuto_config::{Config, Gateway};
use gosuto_core::Event;
use gosuto_security::{validate_hmac_sha256, wrap_raw_webhook_body};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Inbound event bodies are capped at 1 MiB, enforced by reading the body
/// ourselves rather than relying on axum's router-wide `DefaultBodyLimit`
/// (which rejects an oversized body with a hard `413` before any handler
/// runs). A body over the cap is truncated, not rejected, and fails JSON
/// decoding with a `400` downstream like any other malformed body.
const MAX_EVENT_BODY_BYTES: usize = 1024 * 1024;

pub async fn events_handler(
    State(state): State<AcpState>,
    Path(source): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    body: axum::body::Body,
) -> Response {
    let body = match read_capped_body(body, MAX_EVENT_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("failed to read request body: {e}"));
        }
    };

    let active_config = state.active_config();

    let gateway = match &active_config {
        Some(cfg) => match find_gateway(cfg, &source) {
            Some(g) => Some(g),
            None => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    format!("unknown gateway source {source:?}"),
                );
            }
        },
        None => None,
    };

    let is_webhook = gateway.as_ref().map(|g| g.kind == "webhook").unwrap_or(false);

    if is_webhook {
        handle_webhook(&state, &source, gateway.as_ref().unwrap(), peer, &headers, &body, active_config.as_ref()).await
    } else {
        handle_plain(&state, &source, peer, &headers, &body, active_config.as_ref()).await
    }
}

/// Reads `body` into memory, stopping (and truncating) once `limit` bytes
/// have been accumulated rather than buffering the whole thing first.
async fn read_capped_body(body: axum::body::Body, limit: usize) -> Result<Vec<u8>, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
        if buf.len() > limit {
            buf.truncate(limit);
            break;
        }
    }
    Ok(buf)
}

fn find_gateway(config: &Config, source: &str) -> Option<Gateway> {
    config.gateways.iter().find(|g| g.name == source).cloned()
}

async fn handle_plain(
    state: &AcpState,
    source: &str,
    peer: SocketAddr,
    headers: &axum::http::HeaderMap,
    body: &[u8],
    active_config: Option<&Config>,
) -> Response {
    if !state.bearer_token.is_empty() && !is_loopback(peer, headers) {
        if let Err(resp) = check_bearer(&state.bearer_token, headers) {
            return resp;
        }
    }

    let event = match Event::parse(body) {
        Ok(e) => e,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("malformed event: {e}")),
    };

    if event.source != source {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "event source {:?} does not match url source {:?}",
                event.source, source
            ),
        );
    }

    if let Some(cfg) = active_config {
        if !state.rate_limiter.allow(source, cfg.limits.max_events_per_minute).await {
            warn!(source, "event rate limit exceeded");
            return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
        }
    }

    dispatch(state, event).await
}

async fn handle_webhook(
    state: &AcpState,
    source: &str,
    gateway: &Gateway,
    peer: SocketAddr,
    headers: &axum::http::HeaderMap,
    body: &[u8],
    active_config: Option<&Config>,
) -> Response {
    let auth_type = gateway.config.get("authType").map(String::as_str).unwrap_or("bearer");

    match auth_type {
        "bearer" => {
            if !state.bearer_token.is_empty() && !is_loopback(peer, headers) {
                if let Err(resp) = check_bearer(&state.bearer_token, headers) {
                    return resp;
                }
            }
        }
        "hmac-sha256" => {
            let Some(signature) = headers
                .get("X-Hub-Signature-256")
                .and_then(|v| v.to_str().ok())
            else {
                return error_response(StatusCode::UNAUTHORIZED, "missing webhook signature");
            };

            let secret_ref = gateway.config.get("hmacSecretRef").cloned().unwrap_or_default();
            if secret_ref.trim().is_empty() {
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "webhook gateway misconfigured: missing hmacSecretRef",
                );
            }

            let Some(get_secret) = state.callbacks.get_secret.clone() else {
                return error_response(StatusCode::SERVICE_UNAVAILABLE, "secret lookup is not available");
            };

            let Some(secret_bytes) = get_secret(secret_ref).await else {
                return error_response(StatusCode::UNAUTHORIZED, "webhook authentication failed");
            };
            let secret = String::from_utf8_lossy(&secret_bytes);

            if !validate_hmac_sha256(&secret, body, signature) {
                return error_response(StatusCode::UNAUTHORIZED, "webhook authentication failed");
            }
        }
        other => {
            return error_response(StatusCode::BAD_REQUEST, format!("unknown authType {other:?}"));
        }
    }

    if let Some(cfg) = active_config {
        if !state.rate_limiter.allow(source, cfg.limits.max_events_per_minute).await {
            warn!(source, "event rate limit exceeded");
            return error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
        }
    }

    let event = wrap_raw_webhook_body(source, body);
    dispatch(state, event).await
}

async fn dispatch(state: &AcpState, event: Event) -> Response {
    let Some(cb) = state.callbacks.handle_event.clone() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "event handling is not available");
    };
    info!(source = %event.source, event_type = %event.event_type, "event queued");
    cb(event).await;
    Response::builder()
        .status(StatusCode::ACCEPTED)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&json!({ "status": "queued" })).unwrap_or_default(),
        ))
        .expect("static response parts are always valid")
}
