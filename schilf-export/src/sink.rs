use async_trait::async_trait;
use schilf_core::{SensorReading, SinkError};

mod cold_object;
pub use cold_object::{ColdObjectConfig, ColdObjectStoreSink};

mod local_file;
pub use local_file::{LocalFileConfig, LocalFileSink};

/// Placeholder substituted with the partition key in a [`NamingPattern`].
pub const KEY_PLACEHOLDER: &str = "%d";

/// Cold-storage destination for exported day partitions.
///
/// A sink owns deduplication: `has` reports whether a partition key was already
/// exported to its backing storage, the coordinator only consults it.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// True iff an export for `key` already exists. A missing export is `Ok(false)`.
    async fn has(&self, key: i64) -> Result<bool, SinkError>;

    /// Durably store `readings` as newline-delimited JSON under the name derived from `key`.
    async fn export(&self, key: i64, readings: &[SensorReading]) -> Result<(), SinkError>;
}

/// Literal object/file name template where every `%d` is replaced by the partition key,
/// e.g. `dayOfYear=%d.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPattern(String);

impl NamingPattern {
    pub fn new(template: impl Into<String>) -> Result<Self, SinkError> {
        let template = template.into();
        if !template.contains(KEY_PLACEHOLDER) {
            return Err(SinkError::InvalidPattern(template));
        }
        Ok(Self(template))
    }

    pub fn name_for(&self, key: i64) -> String {
        self.0.replace(KEY_PLACEHOLDER, &key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One JSON object per reading, each terminated by `\n`.
pub fn encode_ndjson(readings: &[SensorReading]) -> Result<Vec<u8>, SinkError> {
    let mut body = Vec::with_capacity(readings.len() * 128);
    for reading in readings {
        serde_json::to_writer(&mut body, reading)?;
        body.push(b'\n');
    }
    Ok(body)
}
