use anyhow::{Context, Result};
use schilf_export::{
    ColdObjectStoreSink, ExportCoordinator, ExportReport, ExportScheduler, LocalFileSink,
    PartitionSequencer, Sink,
};
use schilf_store::{InfluxBackend, MemoryBackend, TimeSeriesBackend, TimeSeriesStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest::{self, IngestHandle, Ingestor, SensorRegistry};
use crate::service_configuration::{ServiceConfiguration, SinkSettings, StoreSettings};

// how long queued readings and a running export pass get on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

// SchilfService owns the long running tasks of the process
//
// Readiness:
// Store initialization runs in the background and is retried until it succeeds.
// Writes and queries wait for it instead of failing.
//
// Ingestion:
// Transport adapters push validated sensor events through an `IngestHandle`.
// One worker resolves the sensor tag, parses the payload and writes the reading.
//
// Export:
// The scheduler runs an export pass at start and then once per interval,
// each pass walking every elapsed day and handing it to the configured sink.
pub struct SchilfService {
    store: TimeSeriesStore,
    ingest: IngestHandle,
    ingest_worker: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    readiness: JoinHandle<()>,
    cancel: CancellationToken,
}

impl SchilfService {
    /// Open the configured store and sink, then start every task.
    ///
    /// Fails only when the sink cannot be bootstrapped, an unreachable store is retried.
    pub async fn start(config: ServiceConfiguration) -> Result<Self> {
        let backend = open_backend(&config.store)?;
        let sink = connect_sink(&config.sink).await?;
        Ok(Self::start_with(config, backend, sink))
    }

    /// Start the tasks on an already opened backend and sink.
    ///
    /// `config.store` and `config.sink` are not used here.
    pub fn start_with(
        config: ServiceConfiguration,
        backend: Arc<dyn TimeSeriesBackend>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        let store = TimeSeriesStore::new(backend, config.readiness);
        let readiness = store.gate().spawn();

        let (ingest, ingest_rx) = ingest::channel(config.queue_capacity);
        let registry = Arc::new(SensorRegistry::new(config.sensors));
        let ingest_worker = Ingestor::new(registry, store.clone()).spawn(ingest_rx);

        let sequencer = PartitionSequencer::new(store.clone(), config.key_scheme);
        let coordinator = Arc::new(ExportCoordinator::new(sequencer, store.clone(), sink));
        let cancel = CancellationToken::new();
        let scheduler = ExportScheduler::new(coordinator, config.export_interval).start(cancel.clone());

        info!(
            interval_secs = config.export_interval.as_secs(),
            queue_capacity = config.queue_capacity,
            "Schilf service tasks started"
        );

        SchilfService {
            store,
            ingest,
            ingest_worker,
            scheduler,
            readiness,
            cancel,
        }
    }

    /// Sending side of the ingestion queue, one clone per transport adapter.
    pub fn ingest_handle(&self) -> IngestHandle {
        self.ingest.clone()
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Stop the scheduler between passes and drain the ingestion queue.
    ///
    /// Adapters must drop their handles first, otherwise the drain waits out the grace period.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.ingest);
        if timeout(SHUTDOWN_GRACE, self.ingest_worker).await.is_err() {
            warn!("Ingestion queue did not drain in time, pending readings are dropped");
        }
        self.readiness.abort();
        if timeout(SHUTDOWN_GRACE, self.scheduler).await.is_err() {
            warn!("Export pass still running at shutdown, it will be repeated on next start");
        }
        info!("Schilf service stopped");
    }
}

/// Build the time-series backend named by the configuration.
pub fn open_backend(settings: &StoreSettings) -> Result<Arc<dyn TimeSeriesBackend>> {
    Ok(match settings {
        StoreSettings::Influx(cfg) => {
            info!(host = %cfg.host, database = %cfg.database, "Using InfluxDB time-series store");
            Arc::new(InfluxBackend::new(cfg.clone())?)
        }
        StoreSettings::Memory => {
            warn!("Using in-memory time-series store, readings are lost on restart");
            Arc::new(MemoryBackend::new())
        }
    })
}

/// Connect the export sink. A sink that cannot be bootstrapped stops the process.
pub async fn connect_sink(settings: &SinkSettings) -> Result<Arc<dyn Sink>> {
    Ok(match settings {
        SinkSettings::S3(cfg) => {
            info!(bucket = %cfg.bucket, "Initializing cold object store sink");
            Arc::new(
                ColdObjectStoreSink::connect(cfg.clone())
                    .await
                    .context("cold object store bootstrap failed")?,
            )
        }
        SinkSettings::Local(cfg) => {
            info!(dir = %cfg.dir.display(), "Initializing local file sink");
            Arc::new(LocalFileSink::new(cfg.clone()))
        }
    })
}

/// Run a single export pass without starting ingestion or the scheduler.
pub async fn export_once(config: ServiceConfiguration) -> Result<ExportReport> {
    let backend = open_backend(&config.store)?;
    let sink = connect_sink(&config.sink).await?;
    let store = TimeSeriesStore::new(backend, config.readiness);
    let readiness = store.gate().spawn();

    let sequencer = PartitionSequencer::new(store.clone(), config.key_scheme);
    let report = ExportCoordinator::new(sequencer, store, sink)
        .run_export_pass()
        .await;
    readiness.abort();
    Ok(report?)
}
