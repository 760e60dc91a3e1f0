mod errors;
pub use errors::ExportError;

pub mod sink;
pub use sink::{
    encode_ndjson, ColdObjectConfig, ColdObjectStoreSink, LocalFileConfig, LocalFileSink,
    NamingPattern, Sink,
};

mod sequencer;
pub use sequencer::PartitionSequencer;

mod coordinator;
pub use coordinator::{ExportCoordinator, ExportReport};

mod scheduler;
pub use scheduler::ExportScheduler;

pub use schilf_core::SinkError;
