//! Cleaning: the pipeline's quality gate
//!
//! Upstream column names are mapped onto canonical fields through an
//! explicit schema resolved once per table. A record survives only if every
//! required scientific field and its timestamp parse to finite values.

use super::RawTable;
use crate::models::{CleanedDataset, ObservationRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Upstream column → canonical field
pub const COLUMN_MAP: [(&str, &str); 8] = [
    ("platform_number", "float_id"),
    ("cycle_number", "cycle_number"),
    ("time", "date"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("pres", "depth"),
    ("temp", "temperature"),
    ("psal", "salinity"),
];

/// Canonical fields that must be present and finite in every record
pub const REQUIRED_FIELDS: [&str; 5] = ["latitude", "longitude", "depth", "temperature", "salinity"];

/// Column positions of one table, resolved against `COLUMN_MAP`
struct Schema {
    float_id: Option<usize>,
    cycle_number: Option<usize>,
    date: usize,
    latitude: usize,
    longitude: usize,
    depth: usize,
    temperature: usize,
    salinity: usize,
}

impl Schema {
    fn resolve(table: &RawTable) -> Result<Self, String> {
        let find = |canonical: &str| -> Option<usize> {
            COLUMN_MAP
                .iter()
                .find(|(_, c)| *c == canonical)
                .and_then(|(source, _)| table.column_index(source))
        };
        let require = |canonical: &str| -> Result<usize, String> {
            find(canonical).ok_or_else(|| format!("missing column for '{}'", canonical))
        };

        Ok(Self {
            float_id: find("float_id"),
            cycle_number: find("cycle_number"),
            date: require("date")?,
            latitude: require(REQUIRED_FIELDS[0])?,
            longitude: require(REQUIRED_FIELDS[1])?,
            depth: require(REQUIRED_FIELDS[2])?,
            temperature: require(REQUIRED_FIELDS[3])?,
            salinity: require(REQUIRED_FIELDS[4])?,
        })
    }

    fn record(&self, row: &[Value]) -> Option<ObservationRecord> {
        let cell = |i: usize| row.get(i).unwrap_or(&Value::Null);

        let latitude = as_f64(cell(self.latitude))?;
        let longitude = as_f64(cell(self.longitude))?;
        let depth = as_f64(cell(self.depth))?;
        let temperature = as_f64(cell(self.temperature))?;
        let salinity = as_f64(cell(self.salinity))?;
        let date = as_time(cell(self.date))?;

        let float_id = self
            .float_id
            .and_then(|i| as_text(cell(i)))
            .unwrap_or_else(|| "unknown".to_string());
        let cycle_number = self
            .cycle_number
            .and_then(|i| as_f64(cell(i)))
            .map(|c| c as i64)
            .unwrap_or(0);

        Some(ObservationRecord {
            profile_id: ObservationRecord::profile_id_for(&float_id, cycle_number),
            float_id,
            cycle_number,
            month: date.month(),
            year: date.year(),
            date,
            latitude,
            longitude,
            depth,
            temperature,
            salinity,
        })
    }
}

/// Map a raw upstream table to a cleaned dataset. A table whose columns
/// do not satisfy the schema yields an empty dataset.
pub fn clean(table: &RawTable) -> CleanedDataset {
    if table.is_empty() {
        return CleanedDataset::default();
    }

    let schema = match Schema::resolve(table) {
        Ok(schema) => schema,
        Err(reason) => {
            warn!(reason = %reason, columns = ?table.columns(), "Raw table does not match schema");
            return CleanedDataset::default();
        }
    };

    let records: Vec<ObservationRecord> = table
        .rows()
        .iter()
        .filter_map(|row| schema.record(row))
        .collect();

    debug!(
        raw_rows = table.len(),
        clean_rows = records.len(),
        dropped = table.len() - records.len(),
        "Cleaned observation table"
    );
    CleanedDataset::new(records)
}

fn as_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339, naive date-times, plain dates or epoch seconds
fn as_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => {
            let secs = n.as_f64().filter(|s| s.is_finite())?;
            Utc.timestamp_opt(secs.floor() as i64, 0).single()
        }
        _ => None,
    }
}
