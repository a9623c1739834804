// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Elastic-net regularized logistic regression
//!
//! Minimizes
//!
//! ```text
//! mean log-loss(w, b) + λ · (α‖w‖₁ + (1 − α)/2 · ‖w‖²)
//! ```
//!
//! with an unpenalized intercept, using accelerated proximal gradient
//! descent (FISTA) with gradient-based adaptive restart. The L1 part is
//! handled exactly by soft thresholding, so pure-lasso fits produce true
//! zeros.

use crate::error::{EvalError, Result};
use crate::grid::{log_space, HyperparameterGrid, ParamSet};
use crate::trainers::{check_shapes, FittedState, ModelKind, ModelTrainer};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub const MIXING: &str = "mixing";
pub const PENALTY_STRENGTH: &str = "penalty_strength";

/// Validated elastic-net hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticNetParams {
    /// 0 = pure L2, 1 = pure L1
    pub mixing: f64,
    /// Overall penalty weight λ
    pub penalty_strength: f64,
}

impl ElasticNetParams {
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let mixing = params.f64_or(MIXING, 0.5);
        let penalty_strength = params.f64_or(PENALTY_STRENGTH, 1.0);

        if !(0.0..=1.0).contains(&mixing) {
            return Err(EvalError::invalid_parameter(MIXING, mixing, "must lie in [0, 1]"));
        }
        if !(penalty_strength >= 0.0 && penalty_strength.is_finite()) {
            return Err(EvalError::invalid_parameter(
                PENALTY_STRENGTH,
                penalty_strength,
                "must be finite and non-negative",
            ));
        }

        Ok(Self {
            mixing,
            penalty_strength,
        })
    }
}

/// Fitted logistic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Iterations the optimizer needed
    pub iterations: usize,
}

impl LogisticModel {
    /// Linear score `x·w + b` per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Array1<f64> {
        let w = Array1::from_vec(self.coefficients.clone());
        x.dot(&w) + self.intercept
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        self.decision_function(x).iter().map(|&z| sigmoid(z)).collect()
    }
}

/// Trainer for [`LogisticModel`]
#[derive(Debug, Clone)]
pub struct ElasticNetTrainer {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for ElasticNetTrainer {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            tol: 1e-6,
        }
    }
}

impl ElasticNetTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Run FISTA until the iterates settle or the budget runs out
    pub fn fit_logistic(&self, x: &Array2<f64>, y: &[bool], params: ElasticNetParams) -> Result<LogisticModel> {
        check_shapes(x, y)?;

        let n = x.nrows() as f64;
        let n_features = x.ncols();
        let target: Array1<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();

        let l1 = params.penalty_strength * params.mixing;
        let l2 = params.penalty_strength * (1.0 - params.mixing);

        // Lipschitz bound of the smooth part, intercept column included
        let frobenius_sq = x.iter().map(|v| v * v).sum::<f64>();
        let lipschitz = (frobenius_sq + n) / (4.0 * n) + l2;
        let step = 1.0 / lipschitz;

        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;
        let mut w_look = w.clone();
        let mut b_look = b;
        let mut momentum = 1.0f64;

        for iteration in 1..=self.max_iter {
            let scores = x.dot(&w_look) + b_look;
            let residual = scores.mapv(sigmoid) - &target;

            let grad_w = x.t().dot(&residual) / n + &w_look * l2;
            let grad_b = residual.sum() / n;

            let w_next = (&w_look - &(grad_w * step)).mapv(|v| soft_threshold(v, step * l1));
            let b_next = b_look - step * grad_b;

            if !b_next.is_finite() || w_next.iter().any(|v| !v.is_finite()) {
                return Err(EvalError::Convergence {
                    iterations: iteration,
                    detail: format!(
                        "coefficients diverged (mixing={}, penalty_strength={})",
                        params.mixing, params.penalty_strength
                    ),
                });
            }

            let delta_w = &w_next - &w;
            let delta_b = b_next - b;
            let change = delta_w.iter().fold(delta_b.abs(), |m, v| m.max(v.abs()));
            let size = w_next.iter().fold(b_next.abs().max(1.0), |m, v| m.max(v.abs()));

            if change <= self.tol * size {
                return Ok(LogisticModel {
                    coefficients: w_next.to_vec(),
                    intercept: b_next,
                    iterations: iteration,
                });
            }

            // Restart momentum when it points against the last step
            let against = (&w_look - &w_next).dot(&delta_w) + (b_look - b_next) * delta_b;
            if against > 0.0 {
                momentum = 1.0;
            }

            let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
            let beta = (momentum - 1.0) / next_momentum;
            w_look = &w_next + &(&delta_w * beta);
            b_look = b_next + beta * delta_b;

            w = w_next;
            b = b_next;
            momentum = next_momentum;
        }

        Err(EvalError::Convergence {
            iterations: self.max_iter,
            detail: format!(
                "mixing={}, penalty_strength={}",
                params.mixing, params.penalty_strength
            ),
        })
    }
}

impl ModelTrainer for ElasticNetTrainer {
    fn name(&self) -> &str {
        "Elastic-Net LR"
    }

    fn description(&self) -> &str {
        "Logistic regression with a combined L1/L2 penalty (accelerated proximal gradient)"
    }

    fn kind(&self) -> ModelKind {
        ModelKind::ElasticNet
    }

    fn default_grid(&self) -> HyperparameterGrid {
        HyperparameterGrid::new()
            .float_axis(MIXING, &[0.0, 0.5, 1.0])
            .float_axis(PENALTY_STRENGTH, &log_space(1e-4, 1.0, 20))
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        for (name, _) in params.iter() {
            if name != MIXING && name != PENALTY_STRENGTH {
                return Err(EvalError::invalid_parameter(name, "?", "unknown elastic-net parameter"));
            }
        }
        ElasticNetParams::from_params(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &[bool], params: &ParamSet, _seed: u64) -> Result<FittedState> {
        let params = ElasticNetParams::from_params(params)?;
        self.fit_logistic(x, y, params).map(FittedState::Linear)
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Overlapping classes along the first feature; second feature is noise
    fn noisy_data() -> (Array2<f64>, Vec<bool>) {
        let n = 80;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64 / n as f64;
            if j == 0 {
                (t - 0.5) * 4.0 + ((i * 7) % 5) as f64 * 0.3
            } else {
                ((i * 13) % 11) as f64 / 11.0 - 0.5
            }
        });
        let y = (0..n).map(|i| i >= n / 2).collect();
        (x, y)
    }

    fn params(mixing: f64, penalty_strength: f64) -> ElasticNetParams {
        ElasticNetParams {
            mixing,
            penalty_strength,
        }
    }

    #[test]
    fn test_fit_learns_signal_direction() {
        let (x, y) = noisy_data();
        let model = ElasticNetTrainer::new().fit_logistic(&x, &y, params(0.0, 0.01)).unwrap();

        assert!(model.coefficients[0] > 0.0);
        assert!(model.coefficients[0].abs() > model.coefficients[1].abs());

        let probs = model.predict_proba(&x);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        let correct = probs.iter().zip(&y).filter(|(&p, &l)| (p > 0.5) == l).count();
        assert!(correct as f64 / y.len() as f64 > 0.8);
    }

    #[test]
    fn test_strong_lasso_zeroes_coefficients() {
        let (x, y) = noisy_data();
        let model = ElasticNetTrainer::new().fit_logistic(&x, &y, params(1.0, 10.0)).unwrap();
        assert!(model.coefficients.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_unpenalized_separable_fit_does_not_converge() {
        // Duplicated column and perfectly separated classes: no finite minimizer
        let x = Array2::from_shape_fn((20, 2), |(i, _)| if i < 10 { -1.0 - i as f64 * 0.1 } else { 1.0 + i as f64 * 0.1 });
        let y: Vec<bool> = (0..20).map(|i| i >= 10).collect();

        let result = ElasticNetTrainer::new().fit_logistic(&x, &y, params(0.0, 0.0));
        assert!(matches!(result, Err(EvalError::Convergence { .. })));

        // Same data with a ridge penalty has a unique solution
        assert!(ElasticNetTrainer::new().fit_logistic(&x, &y, params(0.0, 1.0)).is_ok());
    }

    #[test]
    fn test_parameter_validation() {
        let trainer = ElasticNetTrainer::new();
        let bad_mixing = ParamSet::new(vec![(MIXING.to_string(), crate::grid::ParamValue::Float(1.5))]);
        assert!(matches!(trainer.validate(&bad_mixing), Err(EvalError::InvalidParameter { .. })));

        let unknown = ParamSet::new(vec![("depth".to_string(), crate::grid::ParamValue::Int(3))]);
        assert!(trainer.validate(&unknown).is_err());
    }

    #[test]
    fn test_default_grid_size() {
        assert_eq!(ElasticNetTrainer::new().default_grid().len(), 60);
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert_eq!(sigmoid(1000.0), 1.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
    }
}
