use schilf_core::{SinkError, StoreError};
use thiserror::Error;

/// Failure of one partition during an export pass, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("sink existence check failed: {0}")]
    Has(#[source] SinkError),
    #[error("store query failed: {0}")]
    Query(#[source] StoreError),
    #[error("sink export failed: {0}")]
    Export(#[source] SinkError),
}

impl ExportError {
    /// Short name of the failed operation, used as a log field.
    pub fn operation(&self) -> &'static str {
        match self {
            ExportError::Has(_) => "has",
            ExportError::Query(_) => "query",
            ExportError::Export(_) => "export",
        }
    }
}
