use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::coordinator::ExportCoordinator;

/// Runs an export pass at startup and then once per interval.
///
/// A single task runs the passes and awaits each one before waiting for the
/// next tick, so two passes never overlap. A pass that outlasts the interval
/// delays the following one.
#[derive(Debug, Clone)]
pub struct ExportScheduler {
    coordinator: Arc<ExportCoordinator>,
    interval: Duration,
}

impl ExportScheduler {
    pub fn new(coordinator: Arc<ExportCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Spawn the scheduling loop. Cancellation is observed between passes only.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                target: "scheduler",
                interval_secs = self.interval.as_secs(),
                "export scheduler started"
            );
            self.run_pass().await;

            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(target: "scheduler", "export scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => self.run_pass().await,
                }
            }
        })
    }

    async fn run_pass(&self) {
        info!(target: "scheduler", "running data export");
        if let Err(e) = self.coordinator.run_export_pass().await {
            error!(target: "scheduler", error = %e, "export pass aborted");
        }
    }
}
