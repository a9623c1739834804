// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Gradient-boosted trees for binary log-loss
//!
//! Starts from the log-odds of the training prior and adds one
//! second-order regression tree per round, each grown on a seeded row and
//! column subsample.

use crate::elastic_net::sigmoid;
use crate::error::{EvalError, Result};
use crate::grid::{HyperparameterGrid, ParamSet};
use crate::trainers::{check_shapes, FittedState, ModelKind, ModelTrainer};
use crate::tree::{RegressionTree, TreeParams};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub const N_TREES: &str = "n_trees";
pub const MAX_DEPTH: &str = "max_depth";
pub const LEARNING_RATE: &str = "learning_rate";
pub const MIN_SPLIT_GAIN: &str = "min_split_gain";
pub const COLSAMPLE: &str = "colsample";
pub const SUBSAMPLE: &str = "subsample";
pub const L2_LEAF: &str = "l2_leaf";
pub const MIN_CHILD_WEIGHT: &str = "min_child_weight";

const KNOWN_PARAMS: [&str; 8] = [
    N_TREES,
    MAX_DEPTH,
    LEARNING_RATE,
    MIN_SPLIT_GAIN,
    COLSAMPLE,
    SUBSAMPLE,
    L2_LEAF,
    MIN_CHILD_WEIGHT,
];

/// Prior probabilities are clipped away from 0 and 1 before taking log-odds
const PRIOR_CLIP: f64 = 1e-6;

/// Validated boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_split_gain: f64,
    pub colsample: f64,
    pub subsample: f64,
    pub l2_leaf: f64,
    pub min_child_weight: f64,
}

impl BoostingParams {
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let parsed = Self {
            n_trees: params.usize_or(N_TREES, 100)?,
            max_depth: params.usize_or(MAX_DEPTH, 3)?,
            learning_rate: params.f64_or(LEARNING_RATE, 0.1),
            min_split_gain: params.f64_or(MIN_SPLIT_GAIN, 0.0),
            colsample: params.f64_or(COLSAMPLE, 1.0),
            subsample: params.f64_or(SUBSAMPLE, 1.0),
            l2_leaf: params.f64_or(L2_LEAF, 1.0),
            min_child_weight: params.f64_or(MIN_CHILD_WEIGHT, 1.0),
        };

        if parsed.n_trees == 0 {
            return Err(EvalError::invalid_parameter(N_TREES, 0, "must be at least 1"));
        }
        if parsed.max_depth == 0 {
            return Err(EvalError::invalid_parameter(MAX_DEPTH, 0, "must be at least 1"));
        }
        if !(parsed.learning_rate > 0.0 && parsed.learning_rate.is_finite()) {
            return Err(EvalError::invalid_parameter(
                LEARNING_RATE,
                parsed.learning_rate,
                "must be positive",
            ));
        }
        for (name, value) in [(COLSAMPLE, parsed.colsample), (SUBSAMPLE, parsed.subsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EvalError::invalid_parameter(name, value, "must lie in (0, 1]"));
            }
        }
        for (name, value) in [
            (MIN_SPLIT_GAIN, parsed.min_split_gain),
            (L2_LEAF, parsed.l2_leaf),
            (MIN_CHILD_WEIGHT, parsed.min_child_weight),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(EvalError::invalid_parameter(name, value, "must be finite and non-negative"));
            }
        }

        Ok(parsed)
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_split_gain: self.min_split_gain,
            l2_leaf: self.l2_leaf,
            min_child_weight: self.min_child_weight,
        }
    }
}

/// Fitted additive tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedEnsemble {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
    /// Accumulated split gain per feature
    pub gains: Vec<f64>,
}

impl BoostedEnsemble {
    /// Raw additive score (log-odds) per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        self.decision_function(x).into_iter().map(sigmoid).collect()
    }

    /// Split gains normalised to sum to one (all zeros without splits)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.gains.iter().sum();
        if total > 0.0 {
            self.gains.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; self.gains.len()]
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradientBoostingTrainer;

impl GradientBoostingTrainer {
    pub fn new() -> Self {
        Self
    }

    pub fn fit_ensemble(&self, x: &Array2<f64>, y: &[bool], params: BoostingParams, seed: u64) -> Result<BoostedEnsemble> {
        check_shapes(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let target: Vec<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

        let prior = (target.iter().sum::<f64>() / n_samples as f64).clamp(PRIOR_CLIP, 1.0 - PRIOR_CLIP);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut scores = vec![base_score; n_samples];
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_trees);
        let tree_params = params.tree_params();

        for _ in 0..params.n_trees {
            let mut grad = Vec::with_capacity(n_samples);
            let mut hess = Vec::with_capacity(n_samples);
            for (score, t) in scores.iter().zip(&target) {
                let p = sigmoid(*score);
                grad.push(p - t);
                hess.push(p * (1.0 - p));
            }

            let rows = sample_indices(n_samples, params.subsample, &mut rng);
            let columns = sample_indices(n_features, params.colsample, &mut rng);

            let tree = RegressionTree::fit(x, &grad, &hess, &rows, &columns, tree_params, &mut gains);

            for (score, row) in scores.iter_mut().zip(x.rows()) {
                *score += params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        tracing::debug!(
            "Boosted {} trees (depth {}, lr {}) on {} rows",
            trees.len(),
            params.max_depth,
            params.learning_rate,
            n_samples
        );

        Ok(BoostedEnsemble {
            base_score,
            learning_rate: params.learning_rate,
            trees,
            gains,
        })
    }
}

impl ModelTrainer for GradientBoostingTrainer {
    fn name(&self) -> &str {
        "Gradient-Boosted Trees"
    }

    fn description(&self) -> &str {
        "Second-order gradient-boosted regression trees on log-loss with row and column subsampling"
    }

    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn default_grid(&self) -> HyperparameterGrid {
        HyperparameterGrid::new()
            .int_axis(N_TREES, &[50, 150])
            .int_axis(MAX_DEPTH, &[2, 4])
            .float_axis(LEARNING_RATE, &[0.05, 0.2])
            .float_axis(MIN_SPLIT_GAIN, &[0.0])
            .float_axis(COLSAMPLE, &[0.8])
            .float_axis(SUBSAMPLE, &[0.8])
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        if let Some((name, _)) = params.iter().find(|(name, _)| !KNOWN_PARAMS.contains(name)) {
            return Err(EvalError::invalid_parameter(name, "?", "unknown gradient-boosting parameter"));
        }
        BoostingParams::from_params(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &[bool], params: &ParamSet, seed: u64) -> Result<FittedState> {
        let params = BoostingParams::from_params(params)?;
        self.fit_ensemble(x, y, params, seed).map(FittedState::Boosted)
    }
}

/// `ceil(n * fraction)` distinct indices, ascending
fn sample_indices(n: usize, fraction: f64, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if fraction < 1.0 {
        let keep = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
        indices.shuffle(rng);
        indices.truncate(keep);
        indices.sort_unstable();
    }
    indices
}
