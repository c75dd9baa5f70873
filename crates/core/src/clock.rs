//! Clock abstraction so schedulers can be driven by a real or a fake clock.
//!
//! Production code uses [`SystemClock`], which just delegates to `tokio::time`.
//! Tests use [`FakeClock`], which can be advanced manually and exposes a count
//! of outstanding `after` registrations so a test can wait for a job to
//! re-arm its timer before advancing time past it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

/// A source of time, injectable for deterministic tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Resolves once `duration` has elapsed according to this clock.
    async fn after(&self, duration: Duration);
}

/// The real clock, backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct Waiter {
    deadline: DateTime<Utc>,
    seq: u64,
    tx: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for Waiter {}
impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so BinaryHeap (a max-heap) pops the earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    now: DateTime<Utc>,
    waiters: BinaryHeap<Waiter>,
}

/// A manually-advanced clock for tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<Inner>>,
    now_micros: Arc<AtomicI64>,
    after_calls: Arc<AtomicU64>,
    seq: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                now: start,
                waiters: BinaryHeap::new(),
            })),
            now_micros: Arc::new(AtomicI64::new(start.timestamp_micros())),
            after_calls: Arc::new(AtomicU64::new(0)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total number of times `after` has been called, including ones that
    /// have already resolved. Tests poll this to know a scheduler loop has
    /// re-armed its timer before calling `advance`.
    pub fn after_call_count(&self) -> u64 {
        self.after_calls.load(Ordering::SeqCst)
    }

    /// Moves the clock forward, firing every waiter whose deadline has
    /// passed (in deadline order).
    pub async fn advance(&self, duration: Duration) {
        let target = {
            let mut guard = self.inner.lock().await;
            guard.now += duration;
            guard.now
        };
        self.now_micros.store(target.timestamp_micros(), Ordering::SeqCst);

        loop {
            let fired = {
                let mut guard = self.inner.lock().await;
                match guard.waiters.peek() {
                    Some(w) if w.deadline <= target => guard.waiters.pop(),
                    _ => None,
                }
            };
            match fired {
                Some(w) => {
                    let _ = w.tx.send(());
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        // Mirrors `inner.now` in a lock-free atomic so sync callers never
        // block on (or race) `advance`'s lock, and never fall back to real
        // wall-clock time.
        let micros = self.now_micros.load(Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }

    async fn after(&self, duration: Duration) {
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut guard = self.inner.lock().await;
            let deadline = guard.now + duration;
            guard.waiters.push(Waiter { deadline, seq, tx });
        }
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        let _ = rx.await;
    }
}
