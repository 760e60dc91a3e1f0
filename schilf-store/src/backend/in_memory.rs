use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schilf_core::{Measurement, SensorReading, StoreError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::TimeSeriesBackend;

/// MemoryBackend keeps readings in process, ordered by time.
/// Intended for tests and local runs; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    initialized: bool,
    init_attempts: u64,
    init_failures_left: u64,
    fail_writes: bool,
    // first_timestamp and select_range calls, including rejected ones
    query_calls: u64,
    // range starts whose select_range call fails
    failing_ranges: HashSet<DateTime<Utc>>,
    readings: Vec<SensorReading>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // a panicking test thread must not hide the data from the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `attempts` calls to `initialize` fail.
    pub fn fail_initialize(&self, attempts: u64) {
        self.state().init_failures_left = attempts;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Make `select_range` fail whenever it is asked for a range starting at `start`.
    pub fn fail_range(&self, start: DateTime<Utc>) {
        self.state().failing_ranges.insert(start);
    }

    /// Store a reading with an explicit timestamp, bypassing initialization checks.
    pub fn insert(&self, reading: SensorReading) {
        let mut state = self.state();
        let at = state.readings.partition_point(|r| r.time <= reading.time);
        state.readings.insert(at, reading);
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        self.state().readings.clone()
    }

    pub fn len(&self) -> usize {
        self.state().readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn init_attempts(&self) -> u64 {
        self.state().init_attempts
    }

    pub fn query_calls(&self) -> u64 {
        self.state().query_calls
    }
}

#[async_trait]
impl TimeSeriesBackend for MemoryBackend {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.init_attempts += 1;
        if state.init_failures_left > 0 {
            state.init_failures_left -= 1;
            return Err(StoreError::Initialize("memory backend unavailable".to_string()));
        }
        state.initialized = true;
        Ok(())
    }

    async fn write_point(
        &self,
        tag: &str,
        fields: &Measurement,
        time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        {
            let state = self.state();
            if !state.initialized {
                return Err(StoreError::Write("memory backend not initialized".to_string()));
            }
            if state.fail_writes {
                return Err(StoreError::Write("memory backend rejected write".to_string()));
            }
        }
        self.insert(SensorReading::new(time, tag, *fields));
        Ok(())
    }

    async fn first_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let mut state = self.state();
        state.query_calls += 1;
        if !state.initialized {
            return Err(StoreError::Query("memory backend not initialized".to_string()));
        }
        Ok(state.readings.first().map(|r| r.time))
    }

    async fn select_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let mut state = self.state();
        state.query_calls += 1;
        if !state.initialized {
            return Err(StoreError::Query("memory backend not initialized".to_string()));
        }
        if state.failing_ranges.contains(&start) {
            return Err(StoreError::Query(format!("memory backend refused range {}", start)));
        }
        Ok(state
            .readings
            .iter()
            .filter(|r| start <= r.time && r.time < end)
            .cloned()
            .collect())
    }
}
