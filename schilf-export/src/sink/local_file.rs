use async_trait::async_trait;
use schilf_core::{SensorReading, SinkError};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{encode_ndjson, NamingPattern, Sink};

#[derive(Debug, Clone)]
pub struct LocalFileConfig {
    /// Directory receiving one file per partition key
    pub dir: PathBuf,
    pub naming: NamingPattern,
}

impl Default for LocalFileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("export"),
            naming: NamingPattern(String::from("dayOfYear=%d.json")),
        }
    }
}

// LocalFileSink writes every partition to its own file:
// export/
//     dayOfYear=60.json
//     dayOfYear=61.json
//
// Files are rewritten on each export; `has` never reports a prior export, so a
// restarted process exports every elapsed day again.
#[derive(Debug, Clone)]
pub struct LocalFileSink {
    cfg: LocalFileConfig,
}

impl LocalFileSink {
    pub fn new(cfg: LocalFileConfig) -> Self {
        Self { cfg }
    }

    pub fn path_for(&self, key: i64) -> PathBuf {
        self.cfg.dir.join(self.cfg.naming.name_for(key))
    }
}

#[async_trait]
impl Sink for LocalFileSink {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn has(&self, _key: i64) -> Result<bool, SinkError> {
        Ok(false)
    }

    async fn export(&self, key: i64, readings: &[SensorReading]) -> Result<(), SinkError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = encode_ndjson(readings)?;

        // the handle is closed when `file` drops, on success and on every error path
        let mut file = fs::File::create(&path).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        file.sync_all().await?;

        info!(
            target: "sink",
            sink = "local",
            key,
            path = %path.display(),
            readings = readings.len(),
            "exported partition"
        );
        Ok(())
    }
}
