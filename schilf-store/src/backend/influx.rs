use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use schilf_core::{Measurement, SensorReading, StoreError};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use super::TimeSeriesBackend;

// Measurement and tag key used for every sensor point.
const MEASUREMENT: &str = "schilf";
const TAG_KEY: &str = "name";

static NULL: Value = Value::Null;

/// Connection settings for an InfluxDB 1.x HTTP endpoint.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL, e.g. http://localhost:8086
    pub host: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8086".to_string(),
            database: "schilf".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// InfluxDB backend speaking the 1.x `/query` and `/write` HTTP API.
#[derive(Debug, Clone)]
pub struct InfluxBackend {
    cfg: InfluxConfig,
    http: reqwest::Client,
}

impl InfluxBackend {
    pub fn new(cfg: InfluxConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| StoreError::Initialize(format!("http client: {}", e)))?;
        Ok(Self { cfg, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.host.trim_end_matches('/'), path)
    }

    fn credentials(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(u) = &self.cfg.username {
            params.push(("u", u.clone()));
        }
        if let Some(p) = &self.cfg.password {
            params.push(("p", p.clone()));
        }
        params
    }

    /// Run an InfluxQL read statement against the configured database.
    async fn select(&self, statement: &str) -> Result<String, reqwest::Error> {
        self.http
            .get(self.url("query"))
            .query(&self.credentials())
            .query(&[
                ("db", self.cfg.database.as_str()),
                ("epoch", "s"),
                ("q", statement),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl TimeSeriesBackend for InfluxBackend {
    async fn initialize(&self) -> Result<(), StoreError> {
        let body = self
            .http
            .get(self.url("query"))
            .query(&self.credentials())
            .query(&[("q", "SHOW DATABASES")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::Initialize(format!("show databases: {}", e)))?
            .text()
            .await
            .map_err(|e| StoreError::Initialize(format!("show databases: {}", e)))?;

        if parse_database_names(&body)?.contains(&self.cfg.database) {
            return Ok(());
        }

        let statement = format!("CREATE DATABASE {}", quote_identifier(&self.cfg.database));
        self.http
            .post(self.url("query"))
            .query(&self.credentials())
            .form(&[("q", statement.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::Initialize(format!("create database: {}", e)))?;
        info!(target: "timeseries", database = %self.cfg.database, "created database");
        Ok(())
    }

    async fn write_point(
        &self,
        tag: &str,
        fields: &Measurement,
        time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.http
            .post(self.url("write"))
            .query(&self.credentials())
            .query(&[("db", self.cfg.database.as_str()), ("precision", "s")])
            .body(line_protocol(tag, fields, time))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn first_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let statement = format!("SELECT * FROM {} ORDER BY time ASC LIMIT 1", MEASUREMENT);
        let body = self
            .select(&statement)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        parse_first_time(&body)
    }

    async fn select_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, StoreError> {
        let statement = format!(
            "SELECT * FROM {} WHERE time >= '{}' AND time < '{}' ORDER BY time ASC",
            MEASUREMENT,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let body = self
            .select(&statement)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        parse_readings(&body)
    }
}

/// Encode one point in line protocol with second precision.
pub(crate) fn line_protocol(tag: &str, fields: &Measurement, time: DateTime<Utc>) -> String {
    format!(
        "{},{}={} temperature={},humidity={},carbonDioxide={}i,pressure={}i {}",
        MEASUREMENT,
        TAG_KEY,
        escape_tag(tag),
        fields.temperature,
        fields.humidity,
        fields.carbon_dioxide,
        fields.pressure,
        time.timestamp()
    )
}

fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn parse_series(body: &str) -> Result<Vec<Series>, StoreError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    if let Some(err) = response.error {
        return Err(StoreError::Query(err));
    }
    let mut series = Vec::new();
    for result in response.results {
        if let Some(err) = result.error {
            return Err(StoreError::Query(err));
        }
        series.extend(result.series);
    }
    Ok(series)
}

pub(crate) fn parse_database_names(body: &str) -> Result<Vec<String>, StoreError> {
    Ok(parse_series(body)?
        .into_iter()
        .flat_map(|s| s.values)
        .filter_map(|row| row.first().and_then(Value::as_str).map(str::to_string))
        .collect())
}

fn column_index(series: &Series, name: &str) -> Result<usize, StoreError> {
    series
        .columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| StoreError::Decode(format!("missing column {}", name)))
}

fn time_cell(value: &Value) -> Result<DateTime<Utc>, StoreError> {
    let secs = value
        .as_i64()
        .ok_or_else(|| StoreError::Decode(format!("invalid time {}", value)))?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| StoreError::Decode(format!("time out of range {}", secs)))
}

/// Time of the first row of a `SELECT` response made with `epoch=s`.
///
/// Only the time column is decoded, field values of that row may be anything.
pub(crate) fn parse_first_time(body: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    for series in parse_series(body)? {
        let time_col = column_index(&series, "time")?;
        if let Some(row) = series.values.first() {
            return time_cell(row.get(time_col).unwrap_or(&NULL)).map(Some);
        }
    }
    Ok(None)
}

/// Decode a `SELECT *` response made with `epoch=s` into readings.
///
/// Rows with a null tag or field (points written by another producer) are skipped
/// with a warning, values of the wrong type fail the whole decode.
pub(crate) fn parse_readings(body: &str) -> Result<Vec<SensorReading>, StoreError> {
    let mut readings = Vec::new();
    for series in parse_series(body)? {
        let time_col = column_index(&series, "time")?;
        let tag_col = column_index(&series, TAG_KEY)?;
        let temperature_col = column_index(&series, "temperature")?;
        let humidity_col = column_index(&series, "humidity")?;
        let co2_col = column_index(&series, "carbonDioxide")?;
        let pressure_col = column_index(&series, "pressure")?;

        for row in &series.values {
            let cell = |idx: usize| row.get(idx).unwrap_or(&NULL);
            let time = time_cell(cell(time_col))?;
            let incomplete = [tag_col, temperature_col, humidity_col, co2_col, pressure_col]
                .into_iter()
                .any(|idx| cell(idx).is_null());
            if incomplete {
                warn!(target: "timeseries", time = %time, "skipping point with missing values");
                continue;
            }
            let tag = cell(tag_col).as_str().ok_or_else(|| {
                StoreError::Decode(format!("invalid {} value {}", TAG_KEY, cell(tag_col)))
            })?;
            let fields = Measurement {
                temperature: float_cell(cell(temperature_col), "temperature")?,
                humidity: float_cell(cell(humidity_col), "humidity")?,
                carbon_dioxide: int_cell(cell(co2_col), "carbonDioxide")?,
                pressure: int_cell(cell(pressure_col), "pressure")?,
            };
            readings.push(SensorReading::new(time, tag, fields));
        }
    }
    Ok(readings)
}

fn float_cell(value: &Value, name: &str) -> Result<f64, StoreError> {
    value
        .as_f64()
        .ok_or_else(|| StoreError::Decode(format!("invalid {} value {}", name, value)))
}

fn int_cell(value: &Value, name: &str) -> Result<i64, StoreError> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| StoreError::Decode(format!("invalid {} value {}", name, value)))
}
