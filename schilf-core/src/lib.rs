pub mod errors;
pub use errors::{PayloadError, SinkError, StoreError};

pub mod reading;
pub use reading::{Measurement, SensorReading};

pub mod partition;
pub use partition::{day_partitions, DayPartitions, KeyScheme, Partition};
