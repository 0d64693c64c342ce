//! Core data models for the ocean pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rectangular lon/lat box defining the scope of one analysis session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.lon_min, b.lon_max, b.lat_min, b.lat_max]
    }
}

/// Named coastal zone inside a region, used by downstream advisory layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishingZone {
    pub lat: [f64; 2],
    pub lon: [f64; 2],
}

/// Static description of one analysable region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    #[serde(default)]
    pub key: String,
    pub name: String,
    pub bounds: BoundingBox,
    #[serde(default)]
    pub fishing_zones: std::collections::BTreeMap<String, FishingZone>,
}

/// One cleaned sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub float_id: String,
    pub cycle_number: i64,
    pub date: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub month: u32,
    pub year: i32,
    pub profile_id: String,
}

impl ObservationRecord {
    pub fn profile_id_for(float_id: &str, cycle_number: i64) -> String {
        format!("{}_{}", float_id, cycle_number)
    }

    pub fn target(&self, parameter: TargetParameter) -> f64 {
        match parameter {
            TargetParameter::Temperature => self.temperature,
            TargetParameter::Salinity => self.salinity,
        }
    }
}

/// Ordered, immutable collection of cleaned observations for one region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanedDataset {
    records: Vec<ObservationRecord>,
}

impl CleanedDataset {
    pub fn new(records: Vec<ObservationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest observation timestamps
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.records.iter().map(|r| r.date).min()?;
        let end = self.records.iter().map(|r| r.date).max()?;
        Some((start, end))
    }
}

/// Parameters the predictor learns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetParameter {
    Temperature,
    Salinity,
}

impl TargetParameter {
    pub const ALL: [TargetParameter; 2] = [TargetParameter::Temperature, TargetParameter::Salinity];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetParameter::Temperature => "temperature",
            TargetParameter::Salinity => "salinity",
        }
    }
}

impl fmt::Display for TargetParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(TargetParameter::Temperature),
            "salinity" | "psal" => Ok(TargetParameter::Salinity),
            other => Err(format!("unknown parameter '{}'", other)),
        }
    }
}

/// Fixed 7-dimensional encoding of a query point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub lat_sin: f64,
    pub lat_cos: f64,
    pub lon_sin: f64,
    pub lon_cos: f64,
    pub depth_log: f64,
    pub month_sin: f64,
    pub month_cos: f64,
}

impl FeatureVector {
    pub const LEN: usize = 7;

    pub const NAMES: [&'static str; FeatureVector::LEN] = [
        "lat_sin",
        "lat_cos",
        "lon_sin",
        "lon_cos",
        "depth_log",
        "month_sin",
        "month_cos",
    ];

    pub fn to_array(&self) -> [f64; FeatureVector::LEN] {
        [
            self.lat_sin,
            self.lat_cos,
            self.lon_sin,
            self.lon_cos,
            self.depth_log,
            self.month_sin,
            self.month_cos,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Held-out evaluation of one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub r2: f64,
    pub model_type: String,
}
