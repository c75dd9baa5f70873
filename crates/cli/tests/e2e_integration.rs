//! End-to-end tests against the ACP HTTP surface, driven through the full
//! router with [`tower::ServiceExt::oneshot`] rather than a bound socket.

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use futures::future::FutureExt;
use gosuto_acp::{AcpStateInner, Callbacks};
use gosuto_config::Config;
use gosuto_core::Event;
use gosuto_security::compute_hmac_sha256;
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn config_yaml(gateways_yaml: &str) -> String {
    format!(
        r#"
apiVersion: gosuto/v1
metadata:
  name: e2e
trust:
  allowedRooms: ["*"]
  allowedSenders: ["*"]
gateways:
{gateways_yaml}
"#
    )
}

struct Harness {
    state: gosuto_acp::AcpState,
    handled: Arc<Mutex<Vec<Event>>>,
}

fn build_harness(config: Option<Config>, bearer_token: &str) -> Harness {
    let handled: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let active_config = Arc::new(Mutex::new(config));
    let secrets: Arc<Mutex<std::collections::HashMap<String, Vec<u8>>>> =
        Arc::new(Mutex::new(std::collections::HashMap::new()));
    secrets
        .lock()
        .unwrap()
        .insert("webhook.secret".to_string(), b"sssh".to_vec());

    let callbacks = Callbacks {
        handle_event: Some({
            let handled = handled.clone();
            Arc::new(move |event: Event| {
                let handled = handled.clone();
                async move { handled.lock().unwrap().push(event) }.boxed()
            })
        }),
        active_config: Some({
            let active_config = active_config.clone();
            Arc::new(move || active_config.lock().unwrap().clone())
        }),
        get_secret: Some({
            let secrets = secrets.clone();
            Arc::new(move |secret_ref: String| {
                let secrets = secrets.clone();
                async move { secrets.lock().unwrap().get(&secret_ref).cloned() }.boxed()
            })
        }),
        apply_config: Some({
            let active_config = active_config.clone();
            Arc::new(move |config: Config| {
                let active_config = active_config.clone();
                async move {
                    *active_config.lock().unwrap() = Some(config);
                    Ok(())
                }
                .boxed()
            })
        }),
        ..Default::default()
    };

    let state = Arc::new(AcpStateInner::new("agent-1", bearer_token).with_callbacks(callbacks));

    Harness { state, handled }
}

/// Inserts the `ConnectInfo` extension the real server's make-service would
/// attach, so `/events/{source}` can tell loopback callers apart without a
/// bound socket.
fn with_loopback_peer(mut req: Request<Body>) -> Request<Body> {
    let peer: SocketAddr = "127.0.0.1:12345".parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    req
}

async fn send(
    state: gosuto_acp::AcpState,
    req: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let router = gosuto_acp::build_router(state);
    let response = router.oneshot(with_loopback_peer(req)).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_check_requires_no_auth_setup() {
    let harness = build_harness(None, "");
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(harness.state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn inner_routes_reject_wrong_bearer_token() {
    let harness = build_harness(None, "s3cret");
    let req = Request::builder()
        .method("POST")
        .uri("/tasks/cancel")
        .header("Authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(harness.state, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plain_event_is_dispatched_and_queued() {
    let config: Config = serde_yaml::from_str(&config_yaml(
        "  - name: scheduler\n    type: cron\n    config:\n      expression: \"* * * * *\"\n",
    ))
    .unwrap();
    let harness = build_harness(Some(config), "");

    let body = serde_json::json!({
        "source": "scheduler",
        "type": "cron.tick",
        "ts": chrono::Utc::now(),
        "payload": { "message": "tick" }
    });
    let req = Request::builder()
        .method("POST")
        .uri("/events/scheduler")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let (status, resp) = send(harness.state, req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(resp["status"], "queued");
    assert_eq!(harness.handled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn event_source_mismatch_is_rejected() {
    let config: Config = serde_yaml::from_str(&config_yaml(
        "  - name: scheduler\n    type: cron\n    config:\n      expression: \"* * * * *\"\n",
    ))
    .unwrap();
    let harness = build_harness(Some(config), "");

    let body = serde_json::json!({
        "source": "other",
        "type": "cron.tick",
        "ts": chrono::Utc::now(),
        "payload": { "message": "tick" }
    });
    let req = Request::builder()
        .method("POST")
        .uri("/events/scheduler")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let (status, _) = send(harness.state, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_event_requires_valid_hmac_signature() {
    let config: Config = serde_yaml::from_str(&config_yaml(concat!(
        "  - name: gh\n",
        "    type: webhook\n",
        "    config:\n",
        "      authType: hmac-sha256\n",
        "      hmacSecretRef: webhook.secret\n",
    )))
    .unwrap();
    let harness = build_harness(Some(config), "");

    let raw_body = br#"{"action":"opened","repository":{"full_name":"acme/repo"}}"#;
    let bad_sig = compute_hmac_sha256("wrong-secret", raw_body);

    let bad_req = Request::builder()
        .method("POST")
        .uri("/events/gh")
        .header("X-Hub-Signature-256", bad_sig)
        .body(Body::from(raw_body.to_vec()))
        .unwrap();
    let (status, _) = send(harness.state.clone(), bad_req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good_sig = compute_hmac_sha256("sssh", raw_body);
    let good_req = Request::builder()
        .method("POST")
        .uri("/events/gh")
        .header("X-Hub-Signature-256", good_sig)
        .body(Body::from(raw_body.to_vec()))
        .unwrap();
    let (status, resp) = send(harness.state.clone(), good_req).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(resp["status"], "queued");
    assert_eq!(harness.handled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn config_apply_is_idempotent_on_repeated_key() {
    let harness = build_harness(None, "");
    let yaml =
        config_yaml("  - name: scheduler\n    type: cron\n    config:\n      expression: \"* * * * *\"\n");
    let body = serde_json::json!({ "yaml": yaml, "hash": null });

    for _ in 0..2 {
        let req = Request::builder()
            .method("POST")
            .uri("/config/apply")
            .header("X-Idempotency-Key", "apply-1")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let (status, resp) = send(harness.state.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["status"], "applied");
    }
}

#[tokio::test]
async fn secrets_apply_is_gone_when_direct_push_disabled() {
    let harness = build_harness(None, "");
    let body = serde_json::json!({ "secrets": {} });
    let req = Request::builder()
        .method("POST")
        .uri("/secrets/apply")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let (status, _) = send(harness.state, req).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn event_rate_limit_blocks_after_configured_ceiling() {
    let mut config: Config = serde_yaml::from_str(&config_yaml(
        "  - name: scheduler\n    type: cron\n    config:\n      expression: \"* * * * *\"\n",
    ))
    .unwrap();
    config.limits.max_events_per_minute = 1;
    let harness = build_harness(Some(config), "");

    let make_body = || {
        serde_json::json!({
            "source": "scheduler",
            "type": "cron.tick",
            "ts": chrono::Utc::now(),
            "payload": { "message": "tick" }
        })
    };

    let first = Request::builder()
        .method("POST")
        .uri("/events/scheduler")
        .body(Body::from(serde_json::to_vec(&make_body()).unwrap()))
        .unwrap();
    let (status, _) = send(harness.state.clone(), first).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let second = Request::builder()
        .method("POST")
        .uri("/events/scheduler")
        .body(Body::from(serde_json::to_vec(&make_body()).unwrap()))
        .unwrap();
    let (status, _) = send(harness.state.clone(), second).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
