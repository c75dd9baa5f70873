//! Fixed-window event rate limiting, dual-level: one window per gateway
//! source plus one window shared across all sources.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    count: u32,
    started_at: Instant,
}

impl Window {
    fn new() -> Self {
        Self {
            count: 0,
            started_at: Instant::now(),
        }
    }

    /// Resets the window if it has aged out, relative to its own start —
    /// windows are not aligned to wall-clock minute boundaries.
    fn reset_if_stale(&mut self) {
        if self.started_at.elapsed() >= WINDOW {
            self.count = 0;
            self.started_at = Instant::now();
        }
    }
}

/// Dual-level fixed-window limiter. `limit == 0` always allows.
pub struct EventRateLimiter {
    global: Mutex<Window>,
    per_source: Mutex<HashMap<String, Window>>,
}

impl EventRateLimiter {
    pub fn new() -> Self {
        Self {
            global: Mutex::new(Window::new()),
            per_source: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if an event from `source` may proceed under `limit`,
    /// consuming one slot from both the global and per-source windows.
    pub async fn allow(&self, source: &str, limit: u32) -> bool {
        if limit == 0 {
            return true;
        }

        let mut global = self.global.lock().await;
        global.reset_if_stale();
        if global.count >= limit {
            return false;
        }

        let mut per_source = self.per_source.lock().await;
        let window = per_source.entry(source.to_string()).or_insert_with(Window::new);
        window.reset_if_stale();
        if window.count >= limit {
            return false;
        }

        global.count += 1;
        window.count += 1;
        true
    }
}

impl Default for EventRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
