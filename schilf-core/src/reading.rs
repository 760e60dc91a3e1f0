use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

// Positional order of the values carried by a sensor payload.
const FIELD_NAMES: [&str; 4] = ["temperature", "humidity", "carbonDioxide", "pressure"];

/// The field set reported by one sensor publish.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    pub carbon_dioxide: i64,
    pub pressure: i64,
}

impl Measurement {
    /// Parse an ampersand-delimited payload.
    ///
    /// Entries are either bare values (`23.5&41.0&612&1013`) or `key=value`
    /// pairs, in which case only the value is used. Values are positional:
    /// temperature, humidity, carbon dioxide, pressure. Extra entries are ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
        let mut values = text.trim().split('&').map(|entry| match entry.split_once('=') {
            Some((_, value)) => value.trim(),
            None => entry.trim(),
        });

        Ok(Measurement {
            temperature: parse_float(next_value(&mut values, 0)?, FIELD_NAMES[0])?,
            humidity: parse_float(next_value(&mut values, 1)?, FIELD_NAMES[1])?,
            carbon_dioxide: parse_int(next_value(&mut values, 2)?, FIELD_NAMES[2])?,
            pressure: parse_int(next_value(&mut values, 3)?, FIELD_NAMES[3])?,
        })
    }
}

fn next_value<'a>(
    values: &mut impl Iterator<Item = &'a str>,
    position: usize,
) -> Result<&'a str, PayloadError> {
    values
        .next()
        .filter(|v| !v.is_empty())
        .ok_or(PayloadError::MissingField {
            position,
            name: FIELD_NAMES[position],
        })
}

fn parse_float(value: &str, name: &'static str) -> Result<f64, PayloadError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PayloadError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

fn parse_int(value: &str, name: &'static str) -> Result<i64, PayloadError> {
    value.parse::<i64>().map_err(|_| PayloadError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

/// One stored sample: a measurement taken by the sensor identified by `tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // Write time, whole-second precision
    pub time: DateTime<Utc>,
    pub tag: String,
    pub fields: Measurement,
}

impl SensorReading {
    pub fn new(time: DateTime<Utc>, tag: impl Into<String>, fields: Measurement) -> Self {
        SensorReading {
            time,
            tag: tag.into(),
            fields,
        }
    }
}
