//! Handlers for every ACP route other than `/events/{source}` (see [`crate::events`]).

use crate::common::{error_response, idempotent, json_error};
use crate::state::AcpState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Json, Response};
use base64::Engine;
use gosuto_config::Config;
use gosuto_security::{SecretLease, redeem};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{info, warn};

pub async fn health_handler(State(state): State<AcpState>) -> Json<Value> {
    Json(json!({ "status": "ok", "agent_id": state.agent_id }))
}

pub async fn status_handler(State(state): State<AcpState>) -> Json<Value> {
    let uptime_seconds = (chrono::Utc::now() - state.started_at).num_seconds().max(0);
    let mcps = state.callbacks.mcp_names.as_ref().map(|f| f()).unwrap_or_default();
    let gosuto_hash = state.callbacks.gosuto_hash.as_ref().map(|f| f()).unwrap_or_default();

    let mut body = json!({
        "agent_id": state.agent_id,
        "version": env!("CARGO_PKG_VERSION"),
        "gosuto_hash": gosuto_hash,
        "uptime_seconds": uptime_seconds,
        "started_at": state.started_at,
        "mcps": mcps,
    });

    if let Some(cb) = &state.callbacks.messages_outbound {
        body["messages_outbound"] = json!(cb());
    }

    Json(body)
}

#[derive(Deserialize)]
struct ConfigApplyRequest {
    yaml: String,
    #[allow(dead_code)]
    hash: Option<String>,
}

pub async fn config_apply_handler(State(state): State<AcpState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    idempotent(&state, &headers, || async {
        let req: ConfigApplyRequest = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "malformed request body"),
        };

        let config = match Config::parse(req.yaml.as_bytes()) {
            Ok(c) => c,
            Err(e) => return json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        };

        let Some(cb) = state.callbacks.apply_config.clone() else {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "config apply is not available");
        };

        match cb(config).await {
            Ok(()) => {
                info!("config applied");
                (StatusCode::OK, json!({ "status": "applied" }))
            }
            Err(message) => json_error(StatusCode::UNPROCESSABLE_ENTITY, message),
        }
    })
    .await
}

#[derive(Deserialize)]
struct SecretsApplyRequest {
    secrets: HashMap<String, String>,
}

pub async fn secrets_apply_handler(State(state): State<AcpState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    if !state.direct_secret_push_enabled {
        return error_response(
            StatusCode::GONE,
            "direct secret push is deprecated and disabled; use /secrets/token",
        );
    }

    idempotent(&state, &headers, || async {
        let req: SecretsApplyRequest = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "malformed request body"),
        };

        let mut decoded = HashMap::with_capacity(req.secrets.len());
        for (secret_ref, value) in req.secrets {
            match base64::engine::general_purpose::STANDARD.decode(&value) {
                Ok(bytes) => {
                    decoded.insert(secret_ref, bytes);
                }
                Err(_) => {
                    return json_error(
                        StatusCode::BAD_REQUEST,
                        format!("secret {secret_ref:?} is not valid base64"),
                    );
                }
            }
        }

        let Some(cb) = state.callbacks.apply_secrets.clone() else {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "secret apply is not available");
        };

        match cb(decoded).await {
            Ok(()) => {
                info!("secrets applied via deprecated direct push");
                (StatusCode::OK, json!({ "status": "applied" }))
            }
            Err(message) => json_error(StatusCode::UNPROCESSABLE_ENTITY, message),
        }
    })
    .await
}

#[derive(Deserialize)]
struct SecretsTokenRequest {
    leases: Vec<SecretLease>,
}

pub async fn secrets_token_handler(State(state): State<AcpState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    idempotent(&state, &headers, || async {
        let req: SecretsTokenRequest = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(_) => return json_error(StatusCode::BAD_REQUEST, "malformed request body"),
        };

        if req.leases.is_empty() {
            return (StatusCode::OK, json!({ "status": "applied", "redeemed": 0 }));
        }

        let total = req.leases.len();
        let mut redeemed = HashMap::new();
        for lease in &req.leases {
            match redeem(&state.http, &state.agent_id, lease, state.redeemer_timeout).await {
                Ok(value) => {
                    redeemed.insert(lease.secret_ref.clone(), value);
                }
                Err(e) => {
                    warn!(secret_ref = %lease.secret_ref, error = %e, "secret redemption failed");
                }
            }
        }

        if redeemed.is_empty() {
            return json_error(
                StatusCode::BAD_GATEWAY,
                format!("all {total} secret redemption(s) failed"),
            );
        }

        let Some(cb) = state.callbacks.apply_secrets.clone() else {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "secret apply is not available");
        };

        match cb(redeemed).await {
            Ok(()) => {
                info!(redeemed = total, "secrets applied via redemption");
                (StatusCode::OK, json!({ "status": "applied" }))
            }
            Err(message) => json_error(StatusCode::UNPROCESSABLE_ENTITY, message),
        }
    })
    .await
}

pub async fn process_restart_handler(State(state): State<AcpState>, headers: HeaderMap) -> Response {
    idempotent(&state, &headers, || async {
        let Some(cb) = state.callbacks.request_restart.clone() else {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "restart is not available");
        };
        info!("restart requested");
        tokio::spawn(async move { cb().await });
        (StatusCode::ACCEPTED, json!({ "status": "restarting" }))
    })
    .await
}

pub async fn tasks_cancel_handler(State(state): State<AcpState>, headers: HeaderMap) -> Response {
    idempotent(&state, &headers, || async {
        let Some(cb) = state.callbacks.request_cancel.clone() else {
            return json_error(StatusCode::SERVICE_UNAVAILABLE, "cancel is not available");
        };
        info!("cancellation requested");
        tokio::spawn(async move { cb().await });
        (StatusCode::ACCEPTED, json!({ "status": "cancelling" }))
    })
    .await
}
