//! Dataset summary handed to downstream consumers

use crate::models::CleanedDataset;
use crate::predictor::round_to;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Readings at or above this depth count as surface readings (metres)
pub const SURFACE_DEPTH_M: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub region: String,
    pub num_profiles: usize,
    pub num_floats: usize,
    /// `"YYYY-MM-DD to YYYY-MM-DD"`
    pub date_range: String,
    /// Mean surface temperature, 2 decimals; `None` without surface readings
    #[serde(rename = "avg_surface_temp_C")]
    pub avg_surface_temp_c: Option<f64>,
    #[serde(rename = "avg_surface_salinity_PSU")]
    pub avg_surface_salinity_psu: Option<f64>,
    /// Deepest reading, whole metres
    pub deepest_point_m: f64,
}

impl DatasetSummary {
    /// Summarise a non-empty dataset. Returns `None` for an empty one.
    pub fn from_dataset(region_name: &str, dataset: &CleanedDataset) -> Option<Self> {
        let (start, end) = dataset.date_range()?;
        let records = dataset.records();

        let profiles: HashSet<&str> = records.iter().map(|r| r.profile_id.as_str()).collect();
        let floats: HashSet<&str> = records.iter().map(|r| r.float_id.as_str()).collect();

        let surface: Vec<_> = records
            .iter()
            .filter(|r| r.depth <= SURFACE_DEPTH_M)
            .collect();
        let mean = |values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                None
            } else {
                Some(round_to(values.iter().sum::<f64>() / values.len() as f64, 2))
            }
        };

        let deepest = records
            .iter()
            .map(|r| r.depth)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            region: region_name.to_string(),
            num_profiles: profiles.len(),
            num_floats: floats.len(),
            date_range: format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            avg_surface_temp_c: mean(surface.iter().map(|r| r.temperature).collect()),
            avg_surface_salinity_psu: mean(surface.iter().map(|r| r.salinity).collect()),
            deepest_point_m: deepest.round(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationRecord;
    use chrono::{TimeZone, Utc};

    fn record(float_id: &str, cycle: i64, day: u32, depth: f64, temperature: f64) -> ObservationRecord {
        ObservationRecord {
            float_id: float_id.to_string(),
            cycle_number: cycle,
            date: Utc.with_ymd_and_hms(2023, 7, day, 0, 0, 0).unwrap(),
            latitude: 15.0,
            longitude: 65.0,
            depth,
            temperature,
            salinity: 35.0,
            month: 7,
            year: 2023,
            profile_id: ObservationRecord::profile_id_for(float_id, cycle),
        }
    }

    #[test]
    fn test_summary_fields() {
        let dataset = CleanedDataset::new(vec![
            record("A", 1, 3, 0.0, 28.0),
            record("A", 1, 3, 10.0, 27.0),
            record("A", 1, 3, 1200.4, 5.0),
            record("A", 2, 9, 5.0, 28.5),
            record("B", 1, 20, 500.0, 12.0),
        ]);
        let summary = DatasetSummary::from_dataset("Arabian Sea", &dataset).unwrap();

        assert_eq!(summary.region, "Arabian Sea");
        assert_eq!(summary.num_profiles, 3);
        assert_eq!(summary.num_floats, 2);
        assert_eq!(summary.date_range, "2023-07-03 to 2023-07-20");
        assert_eq!(summary.avg_surface_temp_c, Some(27.83));
        assert_eq!(summary.avg_surface_salinity_psu, Some(35.0));
        assert_eq!(summary.deepest_point_m, 1200.0);
    }

    #[test]
    fn test_no_surface_readings() {
        let dataset = CleanedDataset::new(vec![record("A", 1, 3, 200.0, 15.0)]);
        let summary = DatasetSummary::from_dataset("Deep", &dataset).unwrap();
        assert_eq!(summary.avg_surface_temp_c, None);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["avg_surface_temp_C"].is_null());
    }

    #[test]
    fn test_empty_dataset_has_no_summary() {
        assert!(DatasetSummary::from_dataset("Empty", &CleanedDataset::default()).is_none());
    }
}
