//! Domain types shared across the sensor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pollutant name of the PM2.5 reading in `current.values`.
pub const PM25: &str = "PM25";
/// Pollutant name of the PM10 reading in `current.values`.
pub const PM10: &str = "PM10";

// ── Airly measurement types ───────────────────────────────────────────

/// Body of `GET /v2/measurements/point`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementResponse {
    #[serde(default)]
    pub current: CurrentMeasurement,
    #[serde(default)]
    pub history: serde_json::Value,
    #[serde(default)]
    pub forecast: serde_json::Value,
}

/// The `current` block of a measurement response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentMeasurement {
    /// Raw RFC 3339 timestamp; see [`CurrentMeasurement::from_time`].
    #[serde(rename = "fromDateTime", default)]
    pub from_date_time: Option<String>,
    #[serde(rename = "tillDateTime", default)]
    pub till_date_time: Option<String>,
    #[serde(default)]
    pub values: Vec<MeasurementValue>,
    #[serde(default)]
    pub indexes: Vec<AirIndex>,
    #[serde(default)]
    pub standards: Vec<AirStandard>,
}

/// A single named pollutant or weather reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementValue {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// An air-quality index computed by Airly (e.g. `AIRLY_CAQI`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirIndex {
    #[serde(default)]
    pub name: Option<String>,
    /// `null` when the installation has no recent data.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// A pollutant limit from a regulatory standard (WHO, EU).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirStandard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pollutant: Option<String>,
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub averaging: Option<String>,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl CurrentMeasurement {
    /// Value of the reading with exactly this name, if present.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value)
    }

    /// Start of the measurement window, if present and well-formed.
    pub fn from_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.from_date_time.as_deref())
    }

    /// End of the measurement window, if present and well-formed.
    pub fn till_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.till_date_time.as_deref())
    }

    /// Value of the first index. Only the first entry is consulted.
    pub fn index_value(&self) -> Option<f64> {
        self.indexes.first().and_then(|idx| idx.value)
    }
}

impl MeasurementResponse {
    /// Extract the values published to the host.
    pub fn reading(&self) -> AirReading {
        let index = self.current.index_value();
        AirReading {
            pm25: self.current.value(PM25),
            pm10: self.current.value(PM10),
            index,
            category: transform_aqi(index),
        }
    }
}

// ── Sensor values ─────────────────────────────────────────────────────

/// Air quality levels understood by the host's AirQuality characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum QualityCategory {
    Unknown = 0,
    Excellent = 1,
    Good = 2,
    Fair = 3,
    Inferior = 4,
    Poor = 5,
}

impl QualityCategory {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<QualityCategory> for u8 {
    fn from(category: QualityCategory) -> Self {
        category.as_u8()
    }
}

impl fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityCategory::Unknown => "unknown",
            QualityCategory::Excellent => "excellent",
            QualityCategory::Good => "good",
            QualityCategory::Fair => "fair",
            QualityCategory::Inferior => "inferior",
            QualityCategory::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Map an Airly index value onto the host's five-level scale.
///
/// Bucket upper bounds are inclusive. Missing, zero, negative, and NaN
/// values are `Unknown`; everything above 100 collapses into `Poor`.
pub fn transform_aqi(value: Option<f64>) -> QualityCategory {
    match value {
        Some(v) if v > 0.0 && v <= 25.0 => QualityCategory::Excellent,
        Some(v) if v > 25.0 && v <= 50.0 => QualityCategory::Good,
        Some(v) if v > 50.0 && v <= 75.0 => QualityCategory::Fair,
        Some(v) if v > 75.0 && v <= 100.0 => QualityCategory::Inferior,
        Some(v) if v > 100.0 => QualityCategory::Poor,
        _ => QualityCategory::Unknown,
    }
}

/// Values extracted from one measurement response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirReading {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub index: Option<f64>,
    pub category: QualityCategory,
}
