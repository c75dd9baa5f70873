//! Shared ACP server state: the active config, the outer runtime's
//! injected callbacks, and the request-scoped security primitives.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use gosuto_config::Config;
use gosuto_core::Event;
use gosuto_security::{EventRateLimiter, IdempotencyCache};
use std::collections::HashMap;
use std::sync::Arc;

pub type ApplyConfigFn = Arc<dyn Fn(Config) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;
pub type ApplySecretsFn =
    Arc<dyn Fn(HashMap<String, Vec<u8>>) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;
pub type HandleEventFn = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;
pub type GetSecretFn = Arc<dyn Fn(String) -> BoxFuture<'static, Option<Vec<u8>>> + Send + Sync>;
pub type RequestRestartFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub type RequestCancelFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub type ActiveConfigFn = Arc<dyn Fn() -> Option<Config> + Send + Sync>;
pub type GosutoHashFn = Arc<dyn Fn() -> String + Send + Sync>;
pub type McpNamesFn = Arc<dyn Fn() -> Vec<String> + Send + Sync>;
pub type MessagesOutboundFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The outer runtime's capabilities, each independently optional. A `None`
/// field means that capability is unavailable and surfaces as a `503`.
#[derive(Default, Clone)]
pub struct Callbacks {
    pub apply_config: Option<ApplyConfigFn>,
    pub apply_secrets: Option<ApplySecretsFn>,
    pub handle_event: Option<HandleEventFn>,
    pub get_secret: Option<GetSecretFn>,
    pub request_restart: Option<RequestRestartFn>,
    pub request_cancel: Option<RequestCancelFn>,
    pub active_config: Option<ActiveConfigFn>,
    pub gosuto_hash: Option<GosutoHashFn>,
    pub mcp_names: Option<McpNamesFn>,
    pub messages_outbound: Option<MessagesOutboundFn>,
}

pub struct AcpStateInner {
    pub agent_id: String,
    pub bearer_token: String,
    pub direct_secret_push_enabled: bool,
    pub redeemer_timeout: std::time::Duration,
    pub started_at: DateTime<Utc>,
    pub callbacks: Callbacks,
    pub idempotency: IdempotencyCache,
    pub rate_limiter: EventRateLimiter,
    pub http: reqwest::Client,
}

pub type AcpState = Arc<AcpStateInner>;

impl AcpStateInner {
    pub fn new(agent_id: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            bearer_token: bearer_token.into(),
            direct_secret_push_enabled: false,
            redeemer_timeout: std::time::Duration::from_secs(10),
            started_at: Utc::now(),
            callbacks: Callbacks::default(),
            idempotency: IdempotencyCache::new(),
            rate_limiter: EventRateLimiter::new(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_direct_secret_push(mut self, enabled: bool) -> Self {
        self.direct_secret_push_enabled = enabled;
        self
    }

    pub fn with_redeemer_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.redeemer_timeout = timeout;
        self
    }

    /// Config for a named gateway, if an active config is wired and knows it.
    pub fn gateway(&self, source: &str) -> Option<gosuto_config::Gateway> {
        let cb = self.callbacks.active_config.as_ref()?;
        let config = cb()?;
        config.gateways.into_iter().find(|g| g.name == source)
    }

    pub fn active_config(&self) -> Option<Config> {
        self.callbacks.active_config.as_ref().and_then(|cb| cb())
    }
}
