pub mod backend;
pub use backend::{InfluxBackend, InfluxConfig, MemoryBackend, TimeSeriesBackend};

mod readiness;
pub use readiness::{ReadinessConfig, ReadinessGate, ReadinessState};

mod store;
pub use store::TimeSeriesStore;

pub use schilf_core::StoreError;
