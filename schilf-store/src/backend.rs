use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schilf_core::{Measurement, SensorReading, StoreError};

mod in_memory;
pub use in_memory::MemoryBackend;

mod influx;
pub use influx::{InfluxBackend, InfluxConfig};

/// Connection to a time-series database holding sensor readings.
///
/// Implementations are not expected to retry: [`crate::ReadinessGate`] retries
/// `initialize` and [`crate::TimeSeriesStore`] never calls the other methods
/// before it succeeded.
#[async_trait]
pub trait TimeSeriesBackend: std::fmt::Debug + Send + Sync + 'static {
    /// Connect and make sure the target database exists, creating it if absent.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Store a single point for `tag` at `time`.
    async fn write_point(
        &self,
        tag: &str,
        fields: &Measurement,
        time: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Timestamp of the oldest stored reading, `None` if nothing is stored.
    async fn first_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Readings with `start <= time < end`, ordered by time.
    async fn select_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError>;
}
