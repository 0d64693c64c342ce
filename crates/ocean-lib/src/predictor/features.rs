//! Feature encoding for the regression models
//!
//! Maps a raw point (latitude, longitude, depth, month) to a fixed
//! 7-dimensional vector. Angles are encoded as (sin, cos) pairs so the
//! model sees no discontinuity at the ±180° meridian or the
//! December→January wrap; depth is compressed with `log1p`.

use crate::models::{FeatureVector, ObservationRecord};
use std::f64::consts::PI;

/// Stateless point encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode one point. Non-finite input propagates unchanged.
    pub fn encode(&self, latitude: f64, longitude: f64, depth: f64, month: f64) -> FeatureVector {
        let lat = latitude.to_radians();
        let lon = longitude.to_radians();
        let month_angle = 2.0 * PI * month / 12.0;

        FeatureVector {
            lat_sin: lat.sin(),
            lat_cos: lat.cos(),
            lon_sin: lon.sin(),
            lon_cos: lon.cos(),
            depth_log: depth.ln_1p(),
            month_sin: month_angle.sin(),
            month_cos: month_angle.cos(),
        }
    }

    pub fn encode_record(&self, record: &ObservationRecord) -> FeatureVector {
        self.encode(
            record.latitude,
            record.longitude,
            record.depth,
            record.month as f64,
        )
    }
}
