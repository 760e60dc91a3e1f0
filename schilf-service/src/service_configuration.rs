use anyhow::{anyhow, Context, Result};
use schilf_core::KeyScheme;
use schilf_export::{ColdObjectConfig, LocalFileConfig, NamingPattern};
use schilf_store::{InfluxConfig, ReadinessConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

// the scheduler adds the interval to the current instant
const MAX_EXPORT_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

/// configuration settings loaded from the config file
#[derive(Debug, Serialize, Deserialize)]
pub struct LoadConfiguration {
    /// Time-series store holding the ingested readings
    pub store: StoreConfig,
    /// Store readiness retry settings
    #[serde(default)]
    pub readiness: ReadinessNode,
    /// Export scheduling and partition keys
    #[serde(default)]
    pub export: ExportNode,
    /// Cold storage destination for exported partitions
    pub sink: SinkConfig,
    /// Known sensors and the tag their readings are stored under
    pub sensors: Vec<SensorEntry>,
    /// Ingestion queue settings
    #[serde(default)]
    pub ingest: IngestNode,
}

/// Time-series store configuration (tagged by `backend`)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Influx {
        /// e.g. http://localhost:8086
        host: String,
        database: String,
        username: Option<String>,
        password: Option<String>,
        timeout_secs: Option<u64>,
    },
    /// In-process store, readings are lost on restart
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReadinessNode {
    pub retry_delay_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ReadinessNode {
    fn default() -> Self {
        Self {
            retry_delay_secs: 10,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExportNode {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default)]
    pub key_scheme: KeyScheme,
}

fn default_interval_hours() -> u64 {
    24
}

impl Default for ExportNode {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            key_scheme: KeyScheme::DayOfYear,
        }
    }
}

/// Sink configuration (tagged by `backend`)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SinkConfig {
    S3 {
        endpoint: Option<String>,
        region: String,
        access_key: Option<String>,
        secret_key: Option<String>,
        bucket: String,
        location_constraint: Option<String>,
        naming_pattern: String,
        #[serde(default)]
        force_path_style: bool,
    },
    Local {
        dir: Option<String>,
        naming_pattern: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SensorEntry {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngestNode {
    pub queue_capacity: usize,
}

impl Default for IngestNode {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Validated settings the service is wired from
#[derive(Debug)]
pub struct ServiceConfiguration {
    pub store: StoreSettings,
    pub readiness: ReadinessConfig,
    pub export_interval: Duration,
    pub key_scheme: KeyScheme,
    pub sink: SinkSettings,
    pub sensors: Vec<SensorEntry>,
    pub queue_capacity: usize,
}

#[derive(Debug)]
pub enum StoreSettings {
    Influx(InfluxConfig),
    Memory,
}

#[derive(Debug)]
pub enum SinkSettings {
    S3(ColdObjectConfig),
    Local(LocalFileConfig),
}

/// Implementing the TryFrom trait to transform LoadConfiguration into ServiceConfiguration
impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let store = match config.store {
            StoreConfig::Influx {
                host,
                database,
                username,
                password,
                timeout_secs,
            } => {
                if !host.starts_with("http://") && !host.starts_with("https://") {
                    return Err(anyhow!("store.host must be an http(s) URL, got {}", host));
                }
                StoreSettings::Influx(InfluxConfig {
                    host,
                    database,
                    username,
                    password,
                    timeout: timeout_secs
                        .map(Duration::from_secs)
                        .unwrap_or(InfluxConfig::default().timeout),
                })
            }
            StoreConfig::Memory => StoreSettings::Memory,
        };

        if config.readiness.retry_delay_secs == 0 || config.readiness.poll_interval_secs == 0 {
            return Err(anyhow!("readiness delays must be at least one second"));
        }
        let readiness = ReadinessConfig {
            retry_delay: Duration::from_secs(config.readiness.retry_delay_secs),
            poll_interval: Duration::from_secs(config.readiness.poll_interval_secs),
        };

        if config.export.interval_hours == 0 {
            return Err(anyhow!("export.interval_hours must be greater than zero"));
        }
        let export_secs = config
            .export
            .interval_hours
            .checked_mul(60 * 60)
            .filter(|secs| *secs <= MAX_EXPORT_INTERVAL_SECS)
            .ok_or_else(|| {
                anyhow!(
                    "export.interval_hours {} is too large, at most one year is supported",
                    config.export.interval_hours
                )
            })?;

        let sink = match config.sink {
            SinkConfig::S3 {
                endpoint,
                region,
                access_key,
                secret_key,
                bucket,
                location_constraint,
                naming_pattern,
                force_path_style,
            } => SinkSettings::S3(ColdObjectConfig {
                endpoint,
                region,
                access_key,
                secret_key,
                bucket,
                location_constraint,
                naming: NamingPattern::new(naming_pattern).context("invalid sink.naming_pattern")?,
                force_path_style,
            }),
            SinkConfig::Local {
                dir,
                naming_pattern,
            } => {
                let defaults = LocalFileConfig::default();
                SinkSettings::Local(LocalFileConfig {
                    dir: dir.map(PathBuf::from).unwrap_or(defaults.dir),
                    naming: match naming_pattern {
                        Some(p) => NamingPattern::new(p).context("invalid sink.naming_pattern")?,
                        None => defaults.naming,
                    },
                })
            }
        };

        let mut seen = HashSet::new();
        for sensor in &config.sensors {
            if !seen.insert(sensor.id.as_str()) {
                return Err(anyhow!("sensor id {} is configured twice", sensor.id));
            }
        }

        if config.ingest.queue_capacity == 0 {
            return Err(anyhow!("ingest.queue_capacity must be greater than zero"));
        }

        Ok(ServiceConfiguration {
            store,
            readiness,
            export_interval: Duration::from_secs(export_secs),
            key_scheme: config.export.key_scheme,
            sink,
            sensors: config.sensors,
            queue_capacity: config.ingest.queue_capacity,
        })
    }
}
