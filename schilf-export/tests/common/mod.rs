#![allow(dead_code)]

pub mod http_stub;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use schilf_core::{KeyScheme, Measurement, SensorReading, SinkError};
use schilf_export::{ExportCoordinator, PartitionSequencer, Sink};
use schilf_store::{MemoryBackend, ReadinessConfig, TimeSeriesStore};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

pub fn fields() -> Measurement {
    Measurement {
        temperature: 23.5,
        humidity: 41.0,
        carbon_dioxide: 612,
        pressure: 1013,
    }
}

pub fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, 0, 0).unwrap()
}

/// Now used by every test: 2024-03-06 08:00 UTC, so Mar 5 is the last elapsed day.
pub fn now() -> DateTime<Utc> {
    at(3, 6, 8)
}

/// Sink double recording every call, optionally deduplicating like a durable store.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub dedup: bool,
    state: Mutex<SinkState>,
}

#[derive(Debug, Default)]
struct SinkState {
    has_calls: Vec<i64>,
    export_calls: Vec<i64>,
    exported: BTreeMap<i64, Vec<SensorReading>>,
    failing_exports: HashSet<i64>,
    failing_checks: HashSet<i64>,
}

impl RecordingSink {
    pub fn deduplicating() -> Self {
        Self {
            dedup: true,
            ..Default::default()
        }
    }

    pub fn fail_export(&self, key: i64) {
        self.state.lock().unwrap().failing_exports.insert(key);
    }

    pub fn fail_has(&self, key: i64) {
        self.state.lock().unwrap().failing_checks.insert(key);
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_exports.clear();
        state.failing_checks.clear();
    }

    pub fn has_calls(&self) -> Vec<i64> {
        self.state.lock().unwrap().has_calls.clone()
    }

    pub fn export_calls(&self) -> Vec<i64> {
        self.state.lock().unwrap().export_calls.clone()
    }

    pub fn exported(&self) -> BTreeMap<i64, Vec<SensorReading>> {
        self.state.lock().unwrap().exported.clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn has(&self, key: i64) -> Result<bool, SinkError> {
        let mut state = self.state.lock().unwrap();
        state.has_calls.push(key);
        if state.failing_checks.contains(&key) {
            return Err(SinkError::ObjectStore {
                op: "head_object",
                name: key.to_string(),
                reason: "injected".to_string(),
            });
        }
        Ok(self.dedup && state.exported.contains_key(&key))
    }

    async fn export(&self, key: i64, readings: &[SensorReading]) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        state.export_calls.push(key);
        if state.failing_exports.contains(&key) {
            return Err(SinkError::Io(std::io::Error::other("injected failure")));
        }
        state.exported.insert(key, readings.to_vec());
        Ok(())
    }
}

pub struct Harness {
    pub backend: MemoryBackend,
    pub store: TimeSeriesStore,
    pub sink: Arc<RecordingSink>,
    pub coordinator: ExportCoordinator,
}

pub async fn harness(sink: RecordingSink) -> Harness {
    let backend = MemoryBackend::new();
    let store = TimeSeriesStore::new(Arc::new(backend.clone()), ReadinessConfig::default());
    store.gate().ensure_ready().await;

    let sink = Arc::new(sink);
    let sequencer = PartitionSequencer::new(store.clone(), KeyScheme::DayOfYear).with_clock(now);
    let coordinator = ExportCoordinator::new(sequencer, store.clone(), sink.clone());
    Harness {
        backend,
        store,
        sink,
        coordinator,
    }
}
