use chrono::{DateTime, Utc};
use schilf_core::{day_partitions, KeyScheme, Partition, StoreError};
use schilf_store::TimeSeriesStore;
use std::fmt;
use std::sync::Arc;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Produces the day partitions spanning the stored history.
///
/// Nothing is remembered between calls: each `sequence` asks the store for its
/// earliest reading again and starts from that day.
#[derive(Clone)]
pub struct PartitionSequencer {
    store: TimeSeriesStore,
    scheme: KeyScheme,
    clock: Clock,
}

impl PartitionSequencer {
    pub fn new(store: TimeSeriesStore, scheme: KeyScheme) -> Self {
        Self {
            store,
            scheme,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used to decide which days have fully elapsed.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    /// Lazily yields every elapsed day from the earliest stored reading to yesterday,
    /// in increasing order. Empty when the store holds no readings.
    pub async fn sequence(&self) -> Result<impl Iterator<Item = Partition>, StoreError> {
        let earliest = self.store.earliest_timestamp().await?;
        let now = (self.clock)();
        let scheme = self.scheme;
        Ok(earliest
            .map(move |earliest| day_partitions(earliest, now, scheme))
            .into_iter()
            .flatten())
    }
}

impl fmt::Debug for PartitionSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionSequencer")
            .field("store", &self.store)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}
