//! Per-feature standardisation fitted on the training set

use crate::models::FeatureVector;
use serde::{Deserialize, Serialize};

const N: usize = FeatureVector::LEN;

/// Zero-mean, unit-variance scaler (population standard deviation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    mean: [f64; N],
    scale: [f64; N],
}

impl FeatureScaler {
    /// Fit on the given rows. Constant columns get a scale of 1.
    pub fn fit(rows: &[[f64; N]]) -> Self {
        let mut mean = [0.0; N];
        let mut scale = [1.0; N];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        let n = rows.len() as f64;
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        for j in 0..N {
            let var = rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            scale[j] = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &[f64; N]) -> [f64; N] {
        let mut out = [0.0; N];
        for j in 0..N {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; N]]) -> Vec<[f64; N]> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardises_columns() {
        let rows: Vec<[f64; N]> = (0..10)
            .map(|i| {
                let x = i as f64;
                [x, 2.0 * x + 1.0, -x, 5.0, x * x, 0.5, 1.0]
            })
            .collect();
        let scaler = FeatureScaler::fit(&rows);
        let scaled = scaler.transform_all(&rows);

        for j in 0..N {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / scaled.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
        }
        let var0: f64 = scaled.iter().map(|r| r[0].powi(2)).sum::<f64>() / scaled.len() as f64;
        assert!((var0 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let rows = vec![[3.0; N], [3.0; N]];
        let scaler = FeatureScaler::fit(&rows);
        assert_eq!(scaler.transform(&[3.0; N]), [0.0; N]);
    }

    #[test]
    fn test_empty_fit_is_identity() {
        let scaler = FeatureScaler::fit(&[]);
        let row = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(scaler.transform(&row), row);
    }
}
