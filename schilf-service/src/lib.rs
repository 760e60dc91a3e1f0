//! Schilf telemetry service: readiness-gated ingestion and scheduled day-partition export.
//!
//! Transport adapters (e.g. an MQTT broker hook) authenticate sensors on their side and hand
//! validated events to [`SchilfService::ingest_handle`].

pub mod ingest;
pub mod service_configuration;

mod schilf_service;
pub use schilf_service::{connect_sink, export_once, open_backend, SchilfService};

pub use ingest::{IngestError, IngestHandle, Ingestor, SensorRegistry, TagResolver, TelemetryEvent};
pub use service_configuration::{LoadConfiguration, ServiceConfiguration};
