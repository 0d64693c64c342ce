//! Gradient-boosted regression trees
//!
//! Squared-error boosting over shallow smartcore decision trees: start from
//! the target mean, then repeatedly fit a tree to the current residuals and
//! add a shrunken copy of its output.

use super::family::{Matrix, TreeModel};
use serde::{Deserialize, Serialize};
use smartcore::error::Failed;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

#[derive(Debug, Clone)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 5,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct BoostedTrees {
    base: f64,
    learning_rate: f64,
    trees: Vec<TreeModel>,
}

impl BoostedTrees {
    pub fn fit(x: &Matrix, y: &[f64], params: &BoostingParams) -> Result<Self, Failed> {
        let base = if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };
        let mut current = vec![base; y.len()];
        let n_estimators = params.n_estimators.max(1);
        let mut trees = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            let residual: Vec<f64> = y.iter().zip(&current).map(|(t, p)| t - p).collect();
            let tree: TreeModel = DecisionTreeRegressor::fit(
                x,
                &residual,
                DecisionTreeRegressorParameters {
                    max_depth: Some(params.max_depth),
                    min_samples_leaf: params.min_samples_leaf,
                    ..Default::default()
                },
            )?;
            let update = tree.predict(x)?;
            for (c, u) in current.iter_mut().zip(&update) {
                *c += params.learning_rate * u;
            }
            trees.push(tree);
        }

        Ok(Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<f64>, Failed> {
        let mut out: Option<Vec<f64>> = None;
        for tree in &self.trees {
            let update = tree.predict(x)?;
            let acc = out.get_or_insert_with(|| vec![self.base; update.len()]);
            for (o, u) in acc.iter_mut().zip(&update) {
                *o += self.learning_rate * u;
            }
        }
        Ok(out.unwrap_or_default())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::family::to_matrix;

    #[test]
    fn test_boosting_fits_step_function() {
        let rows: Vec<[f64; 7]> = (0..120)
            .map(|i| {
                let x = i as f64 / 10.0;
                [x, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            })
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| if r[0] < 6.0 { 1.0 } else { 5.0 }).collect();
        let x = to_matrix(&rows);

        let model = BoostedTrees::fit(
            &x,
            &y,
            &BoostingParams {
                n_estimators: 50,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(model.n_trees(), 50);

        let pred = model.predict(&x).unwrap();
        assert!((pred[0] - 1.0).abs() < 0.1, "low side predicted {}", pred[0]);
        assert!((pred[119] - 5.0).abs() < 0.1, "high side predicted {}", pred[119]);
    }
}
