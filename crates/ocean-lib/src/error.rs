//! Error kinds surfaced across the pipeline boundary
//!
//! Only conditions a caller must act on get a variant here. Empty fetches,
//! cache misses, insufficient data and persistence failures are reported
//! through return values and logs instead.

use thiserror::Error;

/// Errors from point prediction
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictError {
    /// No model has been trained or loaded yet
    #[error("models for region '{region}' are not trained or loaded yet")]
    NotReady { region: String },

    /// Query point could not be encoded into finite features
    #[error("invalid query point: {0}")]
    InvalidInput(String),

    /// A loaded model failed to produce an estimate
    #[error("model for {parameter} failed to predict: {message}")]
    Model { parameter: String, message: String },
}

/// Errors from running a region pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Region key is not present in the configured region table
    #[error("region '{0}' not found in configuration")]
    UnknownRegion(String),

    /// Every fetch strategy for every year produced nothing usable
    #[error("no usable observations for region '{0}' after all fallbacks")]
    NoUsableData(String),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

impl PipelineError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PipelineError::Predict(PredictError::NotReady { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message_names_region() {
        let err = PredictError::NotReady {
            region: "arabian_sea".to_string(),
        };
        assert!(err.to_string().contains("arabian_sea"));

        let wrapped: PipelineError = err.into();
        assert!(wrapped.is_not_ready());
        assert!(!PipelineError::UnknownRegion("x".into()).is_not_ready());
    }
}
