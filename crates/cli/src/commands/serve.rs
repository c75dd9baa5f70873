//! `gosuto serve` — binds the ACP HTTP surface and the built-in Gateway
//! Manager for local/standalone operation.
//!
//! This wires a minimal in-process "outer runtime": config application
//! replaces a shared `Config` slot and re-reconciles the Gateway Manager;
//! secret application stores redeemed/pushed values in memory; event
//! handling just logs. A real orchestrator deployment would replace these
//! callbacks with calls into its own chat/session runtime — the ACP core
//! does not care which.

use futures::future::FutureExt;
use gosuto_acp::{AcpServer, AcpStateInner, Callbacks};
use gosuto_config::{Config, RuntimeSettings};
use gosuto_core::{Event, SystemClock};
use gosuto_gateway::GatewayManager;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct ServeArgs {
    pub bind_addr: Option<String>,
    pub bearer_token: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

pub async fn run(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = args
        .settings_path
        .unwrap_or_else(RuntimeSettings::default_path);
    let mut settings = RuntimeSettings::load_from(&settings_path)?;
    if let Some(bind_addr) = args.bind_addr {
        settings.bind_addr = bind_addr;
    }
    if let Some(bearer_token) = args.bearer_token {
        settings.bearer_token = bearer_token;
    }

    let initial_config = match &args.config_path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            Some(Config::parse(&bytes)?)
        }
        None => None,
    };

    let agent_id =
        std::env::var("GOSUTO_AGENT_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

    let active_config: Arc<Mutex<Option<Config>>> = Arc::new(Mutex::new(initial_config.clone()));
    let secrets: Arc<Mutex<HashMap<String, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));

    let gateway_manager = Arc::new(GatewayManager::new_with_clock(
        GatewayManager::acp_base_url_from_bind_addr(&settings.bind_addr),
        Arc::new(SystemClock),
    ));

    let callbacks = Callbacks {
        apply_config: Some({
            let active_config = active_config.clone();
            let gateway_manager = gateway_manager.clone();
            Arc::new(move |config: Config| {
                let active_config = active_config.clone();
                let gateway_manager = gateway_manager.clone();
                async move {
                    gateway_manager.reconcile(&config.gateways).await;
                    *active_config.lock().unwrap() = Some(config);
                    Ok(())
                }
                .boxed()
            })
        }),
        apply_secrets: Some({
            let secrets = secrets.clone();
            Arc::new(move |incoming: HashMap<String, Vec<u8>>| {
                let secrets = secrets.clone();
                async move {
                    secrets.lock().unwrap().extend(incoming);
                    Ok(())
                }
                .boxed()
            })
        }),
        handle_event: Some(Arc::new(|event: Event| {
            async move {
                info!(
                    source = %event.source,
                    event_type = %event.event_type,
                    message = %event.payload.message,
                    "event handled"
                );
            }
            .boxed()
        })),
        get_secret: Some({
            let secrets = secrets.clone();
            Arc::new(move |secret_ref: String| {
                let secrets = secrets.clone();
                async move { secrets.lock().unwrap().get(&secret_ref).cloned() }.boxed()
            })
        }),
        request_restart: Some(Arc::new(|| {
            async move { info!("restart requested; standalone binary ignores it") }.boxed()
        })),
        request_cancel: Some(Arc::new(|| {
            async move { info!("cancellation requested; standalone binary ignores it") }.boxed()
        })),
        active_config: Some({
            let active_config = active_config.clone();
            Arc::new(move || active_config.lock().unwrap().clone())
        }),
        gosuto_hash: Some(Arc::new(|| {
            std::env::var("GOSUTO_HASH").unwrap_or_else(|_| "dev".to_string())
        })),
        mcp_names: Some({
            let active_config = active_config.clone();
            Arc::new(move || {
                active_config
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map(|c| c.mcps.iter().map(|m| m.name.clone()).collect())
                    .unwrap_or_default()
            })
        }),
        messages_outbound: None,
    };

    let state = Arc::new(
        AcpStateInner::new(agent_id, settings.bearer_token.clone())
            .with_callbacks(callbacks)
            .with_direct_secret_push(settings.direct_secret_push_enabled)
            .with_redeemer_timeout(std::time::Duration::from_secs(
                settings.redeemer_timeout_secs,
            )),
    );

    if let Some(config) = &initial_config {
        gateway_manager.reconcile(&config.gateways).await;
    }

    let server = AcpServer::bind(state, &settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "gosuto agent ready");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    gateway_manager.stop().await;
    server.stop().await;
    Ok(())
}
