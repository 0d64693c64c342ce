//! Prediction output
//!
//! A prediction carries one estimate per parameter that has a loaded model.
//! It is handed downstream as a flat mapping of `predicted_<param>` and
//! `<param>_confidence` entries.

use crate::models::TargetParameter;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Below this confidence a prediction is flagged as unreliable
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Estimate for one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterEstimate {
    /// Point estimate rounded to 2 decimals
    pub value: f64,
    /// Held-out R² of the model that produced the estimate
    pub confidence: f64,
}

/// Point prediction for one query location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    estimates: BTreeMap<TargetParameter, ParameterEstimate>,
}

impl Prediction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parameter: TargetParameter, estimate: ParameterEstimate) {
        self.estimates.insert(parameter, estimate);
    }

    pub fn get(&self, parameter: TargetParameter) -> Option<&ParameterEstimate> {
        self.estimates.get(&parameter)
    }

    pub fn value(&self, parameter: TargetParameter) -> Option<f64> {
        self.get(parameter).map(|e| e.value)
    }

    pub fn confidence(&self, parameter: TargetParameter) -> Option<f64> {
        self.get(parameter).map(|e| e.confidence)
    }

    pub fn parameters(&self) -> impl Iterator<Item = TargetParameter> + '_ {
        self.estimates.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Flat `predicted_<param>` / `<param>_confidence` mapping
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for (parameter, estimate) in &self.estimates {
            map.insert(format!("predicted_{}", parameter), estimate.value);
            map.insert(format!("{}_confidence", parameter), estimate.confidence);
        }
        map
    }

    /// Check if any estimate has low confidence
    pub fn is_low_confidence(&self) -> bool {
        self.estimates
            .values()
            .any(|e| e.confidence < LOW_CONFIDENCE_THRESHOLD)
    }

    /// Get the reason for low confidence (if applicable)
    pub fn low_confidence_reason(&self) -> Option<String> {
        let worst = self
            .estimates
            .iter()
            .min_by(|a, b| {
                a.1.confidence
                    .partial_cmp(&b.1.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;

        let (parameter, estimate) = worst;
        if estimate.confidence < 0.0 {
            Some(format!(
                "{} model performs worse than the mean on held-out data",
                parameter
            ))
        } else if estimate.confidence < LOW_CONFIDENCE_THRESHOLD {
            Some(format!(
                "{} model explains only {:.0}% of held-out variance",
                parameter,
                estimate.confidence * 100.0
            ))
        } else {
            None
        }
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map = self.to_map();
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in &map {
            out.serialize_entry(k, v)?;
        }
        out.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Prediction {
        let mut prediction = Prediction::new();
        prediction.insert(
            TargetParameter::Temperature,
            ParameterEstimate {
                value: 24.31,
                confidence: 0.912,
            },
        );
        prediction.insert(
            TargetParameter::Salinity,
            ParameterEstimate {
                value: 35.02,
                confidence: 0.41,
            },
        );
        prediction
    }

    #[test]
    fn test_flat_mapping_keys() {
        let map = sample().to_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map["predicted_temperature"], 24.31);
        assert_eq!(map["temperature_confidence"], 0.912);
        assert_eq!(map["predicted_salinity"], 35.02);
        assert_eq!(map["salinity_confidence"], 0.41);
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["predicted_temperature"], 24.31);
        assert_eq!(json["salinity_confidence"], 0.41);
    }

    #[test]
    fn test_low_confidence_reason_names_weakest_parameter() {
        let prediction = sample();
        assert!(prediction.is_low_confidence());
        let reason = prediction.low_confidence_reason().unwrap();
        assert!(reason.starts_with("salinity"));
    }

    #[test]
    fn test_confident_prediction_has_no_reason() {
        let mut prediction = Prediction::new();
        prediction.insert(
            TargetParameter::Temperature,
            ParameterEstimate {
                value: 10.0,
                confidence: 0.95,
            },
        );
        assert!(!prediction.is_low_confidence());
        assert!(prediction.low_confidence_reason().is_none());
    }
}
