use chrono::{DateTime, SubsecRound, Utc};
use schilf_core::{Measurement, SensorReading, StoreError};
use std::sync::Arc;
use tracing::debug;

use crate::backend::TimeSeriesBackend;
use crate::readiness::{ReadinessConfig, ReadinessGate};

/// TimeSeriesStore is the entry point for reading and writing sensor history.
///
/// Every operation first waits for the [`ReadinessGate`]; the backend never sees
/// a call before initialization succeeded. Errors after that point are returned
/// as-is, without retry.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    backend: Arc<dyn TimeSeriesBackend>,
    gate: ReadinessGate,
}

impl TimeSeriesStore {
    pub fn new(backend: Arc<dyn TimeSeriesBackend>, readiness: ReadinessConfig) -> Self {
        let gate = ReadinessGate::new(Arc::clone(&backend), readiness);
        Self { backend, gate }
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    /// Store `fields` for `tag` at the current time, truncated to whole seconds.
    pub async fn write(&self, tag: &str, fields: Measurement) -> Result<(), StoreError> {
        self.gate.wait_ready().await;
        let time = Utc::now().trunc_subsecs(0);
        self.backend.write_point(tag, &fields, time).await?;
        debug!(target: "timeseries", tag = %tag, time = %time, "point written");
        Ok(())
    }

    /// Timestamp of the oldest stored reading, `None` when the store is empty.
    pub async fn earliest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.gate.wait_ready().await;
        self.backend.first_timestamp().await
    }

    /// Readings with `start <= time < end`, ordered by time.
    pub async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError> {
        self.gate.wait_ready().await;
        let readings = self.backend.select_range(start, end).await?;
        debug!(
            target: "timeseries",
            start = %start,
            end = %end,
            count = readings.len(),
            "range queried"
        );
        Ok(readings)
    }
}
