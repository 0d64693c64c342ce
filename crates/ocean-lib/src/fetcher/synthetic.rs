//! Synthetic profile generator
//!
//! Last-resort data source when no real observation is available for a
//! year. Profiles follow a two-regime thermocline with Gaussian noise and
//! are emitted with the upstream column names so they pass through the
//! same cleaning step as real data.

use super::{RawTable, SOURCE_COLUMNS};
use crate::models::BoundingBox;
use chrono::{NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use statrs::distribution::Normal;
use std::sync::Mutex;
use tracing::debug;

/// Canonical depth levels of every synthetic profile (metres)
pub const DEPTH_LEVELS: [f64; 10] = [
    0.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 1500.0, 2000.0,
];

/// Profile count is drawn from `[MIN_PROFILES, MAX_PROFILES)`
pub const MIN_PROFILES: usize = 20;
pub const MAX_PROFILES: usize = 50;

/// Physical floors applied after noise
pub const MIN_TEMPERATURE: f64 = 2.0;
pub const MIN_SALINITY: f64 = 30.0;

const BASELINE_SALINITY: f64 = 34.5;

pub struct SyntheticGenerator {
    rng: Mutex<StdRng>,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generate profiles inside `bounds` for `year`. An empty month list
    /// draws from the whole year.
    pub fn generate(&self, bounds: &BoundingBox, year: i32, months: &[u32]) -> RawTable {
        let all_months: Vec<u32> = (1..=12).collect();
        let months = if months.is_empty() { &all_months[..] } else { months };

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let n_profiles = rng.gen_range(MIN_PROFILES..MAX_PROFILES);
        let mut rows = Vec::with_capacity(n_profiles * DEPTH_LEVELS.len());

        for i in 0..n_profiles {
            let latitude = uniform(&mut *rng, bounds.lat_min, bounds.lat_max);
            let longitude = uniform(&mut *rng, bounds.lon_min, bounds.lon_max);
            let month = months.choose(&mut *rng).copied().unwrap_or(1);
            let day = rng.gen_range(1..28);

            let Some(time) = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt).to_rfc3339())
            else {
                continue;
            };
            let platform = format!("SAMPLE_{:04}", i);

            for &depth in &DEPTH_LEVELS {
                let temperature = if depth <= 100.0 {
                    28.0 - depth * 0.05 + gaussian(&mut *rng, 1.0)
                } else {
                    23.0 - (depth - 100.0) * 0.005 + gaussian(&mut *rng, 0.5)
                };
                let salinity = BASELINE_SALINITY + gaussian(&mut *rng, 0.3);

                rows.push(vec![
                    Value::from(platform.clone()),
                    json!(1),
                    Value::from(time.clone()),
                    json!(latitude),
                    json!(longitude),
                    json!(depth),
                    json!(temperature.max(MIN_TEMPERATURE)),
                    json!(salinity.max(MIN_SALINITY)),
                ]);
            }
        }

        debug!(year = year, profiles = n_profiles, rows = rows.len(), "Generated synthetic profiles");
        RawTable::new(SOURCE_COLUMNS.iter().map(|c| c.to_string()).collect(), rows)
    }
}

fn uniform(rng: &mut StdRng, low: f64, high: f64) -> f64 {
    if low < high {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Zero-mean Gaussian noise
fn gaussian(rng: &mut StdRng, std_dev: f64) -> f64 {
    use rand::distributions::Distribution;
    Normal::new(0.0, std_dev)
        .map(|n| n.sample(rng))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::cleaning::clean;

    fn bounds() -> BoundingBox {
        BoundingBox::new(50.0, 80.0, 5.0, 25.0)
    }

    #[test]
    fn test_profile_shape() {
        let generator = SyntheticGenerator::seeded(7);
        let table = generator.generate(&bounds(), 2023, &[6, 7, 8]);

        assert_eq!(table.len() % DEPTH_LEVELS.len(), 0);
        let profiles = table.len() / DEPTH_LEVELS.len();
        assert!((MIN_PROFILES..MAX_PROFILES).contains(&profiles));
    }

    #[test]
    fn test_physical_floors_and_bounds() {
        let generator = SyntheticGenerator::seeded(11);
        let dataset = clean(&generator.generate(&bounds(), 2022, &[7]));
        assert!(!dataset.is_empty());

        for record in dataset.records() {
            assert!(record.temperature >= MIN_TEMPERATURE);
            assert!(record.salinity >= MIN_SALINITY);
            assert!(bounds().contains(record.latitude, record.longitude));
            assert_eq!(record.month, 7);
            assert_eq!(record.year, 2022);
            assert!(record.float_id.starts_with("SAMPLE_"));
            assert_eq!(record.cycle_number, 1);
        }
    }

    #[test]
    fn test_temperature_decreases_with_depth_on_average() {
        let generator = SyntheticGenerator::seeded(3);
        let dataset = clean(&generator.generate(&bounds(), 2023, &[6]));

        let mean_at = |depth: f64| {
            let values: Vec<f64> = dataset
                .records()
                .iter()
                .filter(|r| r.depth == depth)
                .map(|r| r.temperature)
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        };
        assert!(mean_at(0.0) > mean_at(100.0));
        assert!(mean_at(100.0) > mean_at(2000.0));
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let a = SyntheticGenerator::seeded(42).generate(&bounds(), 2024, &[6]);
        let b = SyntheticGenerator::seeded(42).generate(&bounds(), 2024, &[6]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_bounds() {
        let point = BoundingBox::new(65.0, 65.0, 15.0, 15.0);
        let dataset = clean(&SyntheticGenerator::seeded(1).generate(&point, 2023, &[]));
        assert!(dataset
            .records()
            .iter()
            .all(|r| r.latitude == 15.0 && r.longitude == 65.0));
    }
}
