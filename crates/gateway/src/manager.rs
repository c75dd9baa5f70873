//! Reconciles running cron jobs against the gateway list in a [`Config`],
//! posting ticks back into the local ACP event endpoint.

use crate::cron::CronSchedule;
use gosuto_config::Gateway;
use gosuto_core::{Clock, SystemClock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const POST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct TickPayload<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct TickEvent<'a> {
    source: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    ts: chrono::DateTime<chrono::Utc>,
    payload: TickPayload<'a>,
}

struct RunningJob {
    expression: String,
    payload: String,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Owns the set of currently-running cron jobs and reconciles it against a
/// desired gateway list on every `reconcile` call.
pub struct GatewayManager {
    acp_base_url: String,
    clock: Arc<dyn Clock>,
    jobs: Mutex<HashMap<String, RunningJob>>,
    http: reqwest::Client,
}

impl GatewayManager {
    pub fn new(acp_base_url: impl Into<String>) -> Self {
        Self::new_with_clock(acp_base_url, Arc::new(SystemClock))
    }

    pub fn new_with_clock(acp_base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            acp_base_url: acp_base_url.into(),
            clock,
            jobs: Mutex::new(HashMap::new()),
            http: reqwest::Client::new(),
        }
    }

    /// Converts a bind address like `":8765"`, `"0.0.0.0:8765"`, or
    /// `"127.0.0.1:8765"` into a loopback base URL. Built-in gateways always
    /// post over loopback so they benefit from the ACP bearer-token bypass.
    pub fn acp_base_url_from_bind_addr(addr: &str) -> String {
        let port = addr.rsplit(':').next().unwrap_or("8765");
        format!("http://127.0.0.1:{port}")
    }

    /// Diffs `gateways` (filtered to `type == "cron"`) against the running
    /// set: cancels jobs that are no longer wanted or whose expression/
    /// payload changed, and starts jobs that are newly wanted.
    pub async fn reconcile(&self, gateways: &[Gateway]) {
        let wanted: HashMap<&str, &Gateway> = gateways
            .iter()
            .filter(|g| g.kind == "cron")
            .map(|g| (g.name.as_str(), g))
            .collect();

        let mut jobs = self.jobs.lock().await;

        let stale: Vec<String> = jobs
            .iter()
            .filter(|(name, running)| match wanted.get(name.as_str()) {
                None => true,
                Some(g) => {
                    let expr = g.config.get("expression").cloned().unwrap_or_default();
                    let payload = g.config.get("payload").cloned().unwrap_or_default();
                    expr != running.expression || payload != running.payload
                }
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in stale {
            if let Some(job) = jobs.remove(&name) {
                info!(gateway = %name, "stopping cron job for reconcile");
                job.cancel.cancel();
                let _ = job.handle.await;
            }
        }

        for (name, gateway) in &wanted {
            if jobs.contains_key(*name) {
                continue;
            }
            let expression = gateway.config.get("expression").cloned().unwrap_or_default();
            let schedule = match CronSchedule::parse(&expression) {
                Ok(s) => s,
                Err(e) => {
                    warn!(gateway = %name, error = %e, "invalid cron expression, skipping");
                    continue;
                }
            };
            let payload = gateway.config.get("payload").cloned().unwrap_or_default();
            let cancel = CancellationToken::new();

            let handle = self.spawn_job(name.to_string(), schedule, payload.clone(), cancel.clone());
            jobs.insert(
                name.to_string(),
                RunningJob {
                    expression,
                    payload,
                    cancel,
                    handle,
                },
            );
            info!(gateway = %name, "started cron job");
        }
    }

    fn spawn_job(
        &self,
        name: String,
        schedule: CronSchedule,
        payload: String,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let clock = self.clock.clone();
        let http = self.http.clone();
        let base_url = self.acp_base_url.clone();

        tokio::spawn(async move {
            loop {
                let now = clock.now();
                let next = match schedule.next(now) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(gateway = %name, error = %e, "cron schedule has no next occurrence, stopping job");
                        return;
                    }
                };
                let wait = (next - clock.now()).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = clock.after(wait) => {}
                    _ = cancel.cancelled() => {
                        info!(gateway = %name, "cron job cancelled");
                        return;
                    }
                }

                let event = TickEvent {
                    source: &name,
                    event_type: "cron.tick",
                    ts: clock.now(),
                    payload: TickPayload { message: &payload },
                };

                let url = format!("{base_url}/events/{name}");
                let post = http.post(&url).json(&event).timeout(POST_TIMEOUT).send();

                tokio::select! {
                    result = post => {
                        match result {
                            Ok(resp) if resp.status().as_u16() == 202 => {}
                            Ok(resp) => {
                                warn!(gateway = %name, status = resp.status().as_u16(), "cron tick dropped (non-202)");
                            }
                            Err(e) => {
                                warn!(gateway = %name, error = %e, "cron tick POST failed");
                            }
                        }
                    }
                    _ = cancel.cancelled() => {
                        info!(gateway = %name, "cron job cancelled mid-post");
                        return;
                    }
                }
            }
        })
    }

    /// Cancels every running job and waits for them to exit.
    pub async fn stop(&self) {
        let mut jobs = self.jobs.lock().await;
        for (name, job) in jobs.drain() {
            job.cancel.cancel();
            if job.handle.await.is_err() {
                warn!(gateway = %name, "cron job task panicked during shutdown");
            }
        }
    }

    /// Names of jobs currently running, for diagnostics.
    pub async fn running_jobs(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }
}
