//! Regression model families
//!
//! The family set is closed. `RandomForest` is always compiled in and is the
//! fallback; the other families sit behind cargo features and are probed
//! once when a predictor is constructed.

#[cfg(feature = "boosting")]
use super::boosting::{BoostedTrees, BoostingParams};
use super::evaluation::mean_absolute_error;
use crate::models::FeatureVector;
use crate::settings::ModelSettings;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;
#[cfg(feature = "linear")]
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
#[cfg(feature = "boosting")]
use smartcore::tree::decision_tree_regressor::DecisionTreeRegressor;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

const N: usize = FeatureVector::LEN;

pub(crate) type Matrix = DenseMatrix<f64>;
#[cfg(feature = "boosting")]
pub(crate) type TreeModel = DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>;
type ForestModel = RandomForestRegressor<f64, f64, Matrix, Vec<f64>>;
#[cfg(feature = "linear")]
type LinearModel = LinearRegression<f64, f64, Matrix, Vec<f64>>;

/// Supported regression model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Gradient-boosted regression trees
    Boosting,
    /// Ordinary least squares
    Linear,
    /// Bagged regression trees
    #[default]
    RandomForest,
}

impl ModelFamily {
    /// Whether this family was compiled into the current build
    pub fn is_available(self) -> bool {
        match self {
            ModelFamily::Boosting => cfg!(feature = "boosting"),
            ModelFamily::Linear => cfg!(feature = "linear"),
            ModelFamily::RandomForest => true,
        }
    }

    /// Resolve a preference to an available family, warning on fallback
    pub fn resolve(preference: &str) -> ModelFamily {
        let requested = match preference.parse::<ModelFamily>() {
            Ok(family) => family,
            Err(e) => {
                warn!(preference = %preference, error = %e, "Unknown model preference, falling back to random forest");
                return ModelFamily::default();
            }
        };

        if requested.is_available() {
            debug!(family = %requested, "Model family selected");
            requested
        } else {
            warn!(
                requested = %requested,
                fallback = %ModelFamily::default(),
                "Model family not available in this build, falling back"
            );
            ModelFamily::default()
        }
    }

    /// Estimator label recorded in model metrics
    pub fn label(self) -> &'static str {
        match self {
            ModelFamily::Boosting => "GradientBoostingRegressor",
            ModelFamily::Linear => "LinearRegression",
            ModelFamily::RandomForest => "RandomForestRegressor",
        }
    }

    /// Whether the family reports per-feature importance scores
    pub fn exposes_importance(self) -> bool {
        !matches!(self, ModelFamily::Linear)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::Boosting => "boosting",
            ModelFamily::Linear => "linear",
            ModelFamily::RandomForest => "random_forest",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "boosting" | "gradient_boosting" | "gbdt" | "lightgbm" | "xgboost" => {
                Ok(ModelFamily::Boosting)
            }
            "linear" | "linear_regression" => Ok(ModelFamily::Linear),
            "random_forest" | "randomforest" | "forest" => Ok(ModelFamily::RandomForest),
            other => Err(format!("unsupported model family '{}'", other)),
        }
    }
}

/// A fitted estimator of one family
#[derive(Serialize, Deserialize)]
#[serde(tag = "family", content = "estimator", rename_all = "snake_case")]
pub enum FittedModel {
    #[cfg(feature = "boosting")]
    Boosting(BoostedTrees),
    #[cfg(feature = "linear")]
    Linear(LinearModel),
    RandomForest(ForestModel),
}

impl FittedModel {
    /// Fit `family` on already-scaled rows
    pub fn fit(
        family: ModelFamily,
        x: &[[f64; N]],
        y: &[f64],
        settings: &ModelSettings,
    ) -> Result<Self, Failed> {
        let matrix = to_matrix(x);
        let targets = y.to_vec();

        match family {
            #[cfg(feature = "boosting")]
            ModelFamily::Boosting => {
                let params = BoostingParams {
                    n_estimators: settings.n_estimators,
                    ..Default::default()
                };
                Ok(FittedModel::Boosting(BoostedTrees::fit(&matrix, y, &params)?))
            }
            #[cfg(feature = "linear")]
            ModelFamily::Linear => {
                let model: LinearModel =
                    LinearRegression::fit(&matrix, &targets, LinearRegressionParameters::default())?;
                Ok(FittedModel::Linear(model))
            }
            _ => {
                let model: ForestModel = RandomForestRegressor::fit(
                    &matrix,
                    &targets,
                    RandomForestRegressorParameters {
                        n_trees: settings.n_estimators.max(1),
                        seed: settings.random_state,
                        ..Default::default()
                    },
                )?;
                Ok(FittedModel::RandomForest(model))
            }
        }
    }

    pub fn predict(&self, x: &[[f64; N]]) -> Result<Vec<f64>, Failed> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(x);
        match self {
            #[cfg(feature = "boosting")]
            FittedModel::Boosting(model) => model.predict(&matrix),
            #[cfg(feature = "linear")]
            FittedModel::Linear(model) => model.predict(&matrix),
            FittedModel::RandomForest(model) => model.predict(&matrix),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            #[cfg(feature = "boosting")]
            FittedModel::Boosting(_) => ModelFamily::Boosting,
            #[cfg(feature = "linear")]
            FittedModel::Linear(_) => ModelFamily::Linear,
            FittedModel::RandomForest(_) => ModelFamily::RandomForest,
        }
    }
}

/// Importance score of one input feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Permutation importance on held-out rows: the increase in MAE when one
/// feature column is shuffled. Sorted ascending by importance.
pub fn permutation_importance(
    model: &FittedModel,
    x: &[[f64; N]],
    y: &[f64],
    seed: u64,
) -> Result<Vec<FeatureImportance>, Failed> {
    let baseline = mean_absolute_error(y, &model.predict(x)?);
    let mut scores = Vec::with_capacity(N);

    for (j, name) in FeatureVector::NAMES.iter().enumerate() {
        let mut column: Vec<f64> = x.iter().map(|r| r[j]).collect();
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(j as u64));
        column.shuffle(&mut rng);

        let permuted: Vec<[f64; N]> = x
            .iter()
            .zip(&column)
            .map(|(row, v)| {
                let mut r = *row;
                r[j] = *v;
                r
            })
            .collect();

        let score = mean_absolute_error(y, &model.predict(&permuted)?) - baseline;
        scores.push(FeatureImportance {
            feature: name.to_string(),
            importance: score,
        });
    }

    scores.sort_by(|a, b| {
        a.importance
            .partial_cmp(&b.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(scores)
}

pub(crate) fn to_matrix(rows: &[[f64; N]]) -> Matrix {
    let values: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
    DenseMatrix::from_2d_vec(&values)
}
