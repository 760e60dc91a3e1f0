use schilf_core::{Partition, StoreError};
use schilf_store::TimeSeriesStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::ExportError;
use crate::sequencer::PartitionSequencer;
use crate::sink::Sink;

/// Outcome of one export pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Partitions produced by the sequencer
    pub visited: usize,
    pub exported: usize,
    /// Partitions the sink reported as already exported
    pub skipped: usize,
    /// Keys whose check, query or export failed in this pass
    pub failed: Vec<i64>,
}

enum PartitionOutcome {
    Skipped,
    Exported(usize),
}

/// Moves stored history into a sink, one day partition at a time.
///
/// Partitions are handled strictly one after another. A failing partition is
/// logged and left for the next pass; it never stops the current one.
#[derive(Debug, Clone)]
pub struct ExportCoordinator {
    sequencer: PartitionSequencer,
    store: TimeSeriesStore,
    sink: Arc<dyn Sink>,
}

impl ExportCoordinator {
    pub fn new(sequencer: PartitionSequencer, store: TimeSeriesStore, sink: Arc<dyn Sink>) -> Self {
        Self {
            sequencer,
            store,
            sink,
        }
    }

    /// Walk every elapsed day partition and export those the sink does not have yet.
    ///
    /// Only a failure to read the earliest timestamp aborts the pass.
    pub async fn run_export_pass(&self) -> Result<ExportReport, StoreError> {
        let mut report = ExportReport::default();
        for partition in self.sequencer.sequence().await? {
            report.visited += 1;
            match self.export_partition(&partition).await {
                Ok(PartitionOutcome::Skipped) => report.skipped += 1,
                Ok(PartitionOutcome::Exported(readings)) => {
                    debug!(target: "export", key = partition.key, readings, "partition exported");
                    report.exported += 1;
                }
                Err(e) => {
                    warn!(
                        target: "export",
                        key = partition.key,
                        range_start = %partition.range_start,
                        operation = e.operation(),
                        sink = self.sink.name(),
                        error = %e,
                        "partition export failed, continuing with next partition"
                    );
                    report.failed.push(partition.key);
                }
            }
        }

        info!(
            target: "export",
            sink = self.sink.name(),
            visited = report.visited,
            exported = report.exported,
            skipped = report.skipped,
            failed = report.failed.len(),
            "export pass finished"
        );
        Ok(report)
    }

    async fn export_partition(&self, partition: &Partition) -> Result<PartitionOutcome, ExportError> {
        if self.sink.has(partition.key).await.map_err(ExportError::Has)? {
            debug!(target: "export", key = partition.key, "partition already exported, skipping");
            return Ok(PartitionOutcome::Skipped);
        }

        let readings = self
            .store
            .query(partition.range_start, partition.range_end)
            .await
            .map_err(ExportError::Query)?;
        self.sink
            .export(partition.key, &readings)
            .await
            .map_err(ExportError::Export)?;
        Ok(PartitionOutcome::Exported(readings.len()))
    }
}
