//! The Agent Control Protocol (ACP): the HTTP surface an orchestrator uses
//! to push config and secrets, drive lifecycle, and receive events from
//! gateways.
//!
//! Two handler layers. An outer router owns `/events/{source}`, whose auth
//! is per-request and depends on the matched gateway's declared type. Every
//! other route passes through [`middleware::bearer_middleware`] before
//! reaching the inner router. See [`router::build_router`] for assembly.

pub mod common;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::{AcpState, AcpStateInner, Callbacks};

use std::time::Duration;
use tracing::info;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Owns the bound listener and a graceful-shutdown handle for the ACP HTTP
/// surface. `stop()` is cooperative and bounded: it signals shutdown and
/// waits up to [`SHUTDOWN_GRACE`] for in-flight requests to finish.
pub struct AcpServer {
    local_addr: std::net::SocketAddr,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl AcpServer {
    /// Binds `bind_addr` and starts serving in the background. Pass port
    /// `0` (e.g. `"127.0.0.1:0"`) to let the OS pick a free port; the
    /// actual bound address is available via [`Self::local_addr`].
    pub async fn bind(state: AcpState, bind_addr: &str) -> std::io::Result<Self> {
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "ACP server listening");

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
        });

        Ok(Self { local_addr, shutdown_tx, handle })
    }

    /// The actual address the listener is bound to.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Signals graceful shutdown and waits up to [`SHUTDOWN_GRACE`] for it
    /// to complete.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.handle).await;
    }
}
