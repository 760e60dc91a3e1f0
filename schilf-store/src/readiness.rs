use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::TimeSeriesBackend;

/// Lifecycle of the connection to the time-series backend.
///
/// Moves `Uninitialized -> Connecting -> Ready`; a failed initialization attempt
/// stays in `Connecting` and is retried. There is no terminal failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Uninitialized,
    Connecting,
    Ready,
}

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Fixed delay between two initialization attempts.
    pub retry_delay: Duration,
    /// Upper bound on how long a waiting operation sleeps before re-checking the state.
    pub poll_interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// ReadinessGate owns the process-wide readiness state of the time-series backend.
///
/// Clones share the same state. Only the gate mutates it; the write path and the
/// export path just wait on it.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    backend: Arc<dyn TimeSeriesBackend>,
    cfg: ReadinessConfig,
    state: watch::Sender<ReadinessState>,
    failed_attempts: AtomicU64,
    // serializes initialization so only one task talks to the backend at a time
    init_lock: Mutex<()>,
}

impl ReadinessGate {
    pub fn new(backend: Arc<dyn TimeSeriesBackend>, cfg: ReadinessConfig) -> Self {
        let (state, _) = watch::channel(ReadinessState::Uninitialized);
        Self {
            inner: Arc::new(GateInner {
                backend,
                cfg,
                state,
                failed_attempts: AtomicU64::new(0),
                init_lock: Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> ReadinessState {
        *self.inner.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadinessState::Ready
    }

    /// Number of initialization attempts that failed so far.
    pub fn failed_attempts(&self) -> u64 {
        self.inner.failed_attempts.load(Ordering::Acquire)
    }

    /// Initialize the backend, retrying forever with a fixed delay.
    ///
    /// Idempotent: returns immediately once the backend is ready. Failures are
    /// logged and never returned.
    pub async fn ensure_ready(&self) {
        if self.is_ready() {
            return;
        }
        let _guard = self.inner.init_lock.lock().await;
        // another caller may have finished initialization while we waited
        if self.is_ready() {
            return;
        }

        loop {
            self.inner.state.send_replace(ReadinessState::Connecting);
            match self.inner.backend.initialize().await {
                Ok(()) => {
                    self.inner.state.send_replace(ReadinessState::Ready);
                    info!(
                        target: "readiness",
                        failed_attempts = self.failed_attempts(),
                        "time-series store is ready"
                    );
                    return;
                }
                Err(e) => {
                    let attempts = self.inner.failed_attempts.fetch_add(1, Ordering::AcqRel) + 1;
                    warn!(
                        target: "readiness",
                        attempt = attempts,
                        retry_in_secs = self.inner.cfg.retry_delay.as_secs(),
                        error = %e,
                        "time-series store not ready, retrying"
                    );
                    tokio::time::sleep(self.inner.cfg.retry_delay).await;
                }
            }
        }
    }

    /// Drive `ensure_ready` on a background task.
    pub fn spawn(&self) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move { gate.ensure_ready().await })
    }

    /// Suspend until the gate reports `Ready`. Does not trigger initialization.
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.state.subscribe();
        loop {
            if *rx.borrow_and_update() == ReadinessState::Ready {
                return;
            }
            // the sender lives as long as self, so `changed` only returns on a transition
            let _ = tokio::time::timeout(self.inner.cfg.poll_interval, rx.changed()).await;
        }
    }
}
