use schilf_core::{Measurement, PayloadError, StoreError};
use schilf_store::TimeSeriesStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::service_configuration::SensorEntry;

/// Maps the identity a sensor authenticated with to the tag its readings are stored under.
pub trait TagResolver: Send + Sync {
    fn resolve_tag(&self, sensor_identity: &str) -> Option<String>;
}

/// Sensor registry built from the configured `sensors` list.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    tags: HashMap<String, String>,
}

impl SensorRegistry {
    pub fn new(sensors: Vec<SensorEntry>) -> Self {
        Self {
            tags: sensors.into_iter().map(|s| (s.id, s.tag)).collect(),
        }
    }
}

impl TagResolver for SensorRegistry {
    fn resolve_tag(&self, sensor_identity: &str) -> Option<String> {
        self.tags.get(sensor_identity).cloned()
    }
}

/// A publish that already passed transport authentication and topic checks.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    pub sensor_identity: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown sensor {0}")]
    UnknownSensor(String),
    #[error("malformed payload from {sensor}: {source}")]
    Payload {
        sensor: String,
        #[source]
        source: PayloadError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("ingestion queue is closed")]
    Closed,
}

/// Sending side of the ingestion queue, handed to transport adapters.
///
/// The worker stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<TelemetryEvent>,
}

impl IngestHandle {
    /// Queue an event; waits while the queue is full.
    pub async fn publish(
        &self,
        sensor_identity: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), IngestError> {
        self.tx
            .send(TelemetryEvent {
                sensor_identity: sensor_identity.into(),
                payload: payload.into(),
            })
            .await
            .map_err(|_| IngestError::Closed)
    }
}

/// Bounded ingestion queue feeding one [`Ingestor`] worker.
pub fn channel(capacity: usize) -> (IngestHandle, mpsc::Receiver<TelemetryEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (IngestHandle { tx }, rx)
}

/// Turns telemetry events into stored readings.
#[derive(Clone)]
pub struct Ingestor {
    resolver: Arc<dyn TagResolver>,
    store: TimeSeriesStore,
}

impl Ingestor {
    pub fn new(resolver: Arc<dyn TagResolver>, store: TimeSeriesStore) -> Self {
        Self { resolver, store }
    }

    /// Resolve the tag, parse the payload and write it. Waits while the store is not ready.
    pub async fn handle(&self, event: TelemetryEvent) -> Result<(), IngestError> {
        let tag = self
            .resolver
            .resolve_tag(&event.sensor_identity)
            .ok_or_else(|| IngestError::UnknownSensor(event.sensor_identity.clone()))?;
        let fields =
            Measurement::from_payload(&event.payload).map_err(|source| IngestError::Payload {
                sensor: event.sensor_identity.clone(),
                source,
            })?;
        self.store.write(&tag, fields).await?;
        debug!(target: "ingest", sensor = %event.sensor_identity, tag = %tag, "reading stored");
        Ok(())
    }

    /// Drain the queue until every sender is dropped. Failed events are logged and dropped.
    pub fn spawn(self, mut rx: mpsc::Receiver<TelemetryEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "ingest", "ingestion worker started");
            while let Some(event) = rx.recv().await {
                match self.handle(event).await {
                    Ok(()) => {}
                    Err(e @ IngestError::Store(_)) => {
                        error!(target: "ingest", error = %e, "error saving reading to the store");
                    }
                    Err(e) => {
                        warn!(target: "ingest", error = %e, "dropping telemetry event");
                    }
                }
            }
            info!(target: "ingest", "ingestion worker stopped");
        })
    }
}
