//! Router assembly: an outer route for `/events/{source}` plus an inner
//! router (everything else) behind the bearer middleware, wrapped in CORS
//! and HTTP trace logging. `/events/{source}` opts out of the router-wide
//! `DefaultBodyLimit` — it enforces its own 1 MiB cap by reading (and
//! truncating) the body itself in [`crate::events`], per the spec's
//! "truncate, then fail JSON parsing" semantics rather than a hard `413`.

use crate::events::events_handler;
use crate::handlers::{
    config_apply_handler, health_handler, process_restart_handler, secrets_apply_handler,
    secrets_token_handler, status_handler, tasks_cancel_handler,
};
use crate::middleware::bearer_middleware;
use crate::state::AcpState;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AcpState) -> Router {
    let inner = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/config/apply", post(config_apply_handler))
        .route("/secrets/apply", post(secrets_apply_handler))
        .route("/secrets/token", post(secrets_token_handler))
        .route("/process/restart", post(process_restart_handler))
        .route("/tasks/cancel", post(tasks_cancel_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_middleware));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    let events = Router::new()
        .route("/events/{source}", post(events_handler))
        // Overrides the router-wide `DefaultBodyLimit` below: this route
        // reads and caps the body itself instead of letting axum reject
        // an oversized one with a hard 413.
        .route_layer(DefaultBodyLimit::disable());

    Router::new()
        .merge(events)
        .merge(inner)
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
