use thiserror::Error;

/// Failure to turn a raw sensor payload into a [`crate::Measurement`].
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,
    #[error("payload is missing field {name} at position {position}")]
    MissingField { position: usize, name: &'static str },
    #[error("invalid value {value:?} for field {name}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Errors raised by the time-series store once it has reached readiness.
///
/// Failures before readiness never surface here, they only delay the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store initialization failed: {0}")]
    Initialize(String),
    #[error("store write failed: {0}")]
    Write(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("unable to decode store response: {0}")]
    Decode(String),
}

/// Errors raised by export sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to encode readings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("object store {op} failed for {name}: {reason}")]
    ObjectStore {
        op: &'static str,
        name: String,
        reason: String,
    },
    #[error("bucket bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("invalid naming pattern {0:?}: expected a %d placeholder")]
    InvalidPattern(String),
}
