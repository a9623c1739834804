// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Uniform training contract for the classifier families
//!
//! The search and the pipeline only ever see [`ModelTrainer`] and
//! [`FittedState`]; which family backs them is the caller's explicit
//! [`ModelKind`] choice.

use crate::boosting::{BoostedEnsemble, GradientBoostingTrainer};
use crate::datasets::Dataset;
use crate::elastic_net::{ElasticNetTrainer, LogisticModel};
use crate::error::{EvalError, Result};
use crate::grid::{HyperparameterGrid, ParamSet};
use crate::scaling::{FeatureScaler, ScalingParameters};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common interface for classifier families
pub trait ModelTrainer: Send + Sync {
    /// Display name used in reports
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> ModelKind;

    /// Grid searched when the caller supplies none
    fn default_grid(&self) -> HyperparameterGrid;

    /// Reject unknown or out-of-range hyperparameters
    fn validate(&self, params: &ParamSet) -> Result<()>;

    /// Fit on an already standardized design matrix
    fn fit(&self, x: &Array2<f64>, y: &[bool], params: &ParamSet, seed: u64) -> Result<FittedState>;
}

/// Fitted model state, one variant per family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum FittedState {
    Linear(LogisticModel),
    Boosted(BoostedEnsemble),
}

impl FittedState {
    /// Probability of the positive class per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Vec<f64> {
        match self {
            FittedState::Linear(model) => model.predict_proba(x),
            FittedState::Boosted(model) => model.predict_proba(x),
        }
    }

    /// Coefficients (standardized units) or normalised split-gain importances
    pub fn feature_weights(&self) -> Vec<f64> {
        match self {
            FittedState::Linear(model) => model.coefficients.clone(),
            FittedState::Boosted(model) => model.feature_importances(),
        }
    }

    pub fn weight_kind(&self) -> &'static str {
        match self {
            FittedState::Linear(_) => "coefficient",
            FittedState::Boosted(_) => "importance",
        }
    }
}

/// Classifier family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    ElasticNet,
    GradientBoosting,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 2] {
        [ModelKind::ElasticNet, ModelKind::GradientBoosting]
    }

    pub fn trainer(&self) -> Box<dyn ModelTrainer> {
        match self {
            ModelKind::ElasticNet => Box::new(ElasticNetTrainer::new()),
            ModelKind::GradientBoosting => Box::new(GradientBoostingTrainer::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ElasticNet => "elastic-net",
            ModelKind::GradientBoosting => "gradient-boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elastic-net" | "elasticnet" | "lr" | "logistic" => Ok(ModelKind::ElasticNet),
            "gradient-boosting" | "gbt" | "xgboost" | "boosting" => Ok(ModelKind::GradientBoosting),
            other => Err(EvalError::invalid_parameter(
                "model",
                other,
                "expected elastic-net or gradient-boosting",
            )),
        }
    }
}

/// Every available trainer
pub fn all_trainers() -> Vec<Box<dyn ModelTrainer>> {
    ModelKind::all().iter().map(|k| k.trainer()).collect()
}

/// A fitted model bundled with the scaling it was trained under
///
/// Predictions take raw (unscaled) datasets and apply the bundled
/// parameters first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model: String,
    pub kind: ModelKind,
    pub params: ParamSet,
    pub state: FittedState,
    pub scaling: ScalingParameters,
}

impl TrainedModel {
    /// Fit a scaler on `train`, then the model on the scaled data
    pub fn fit(trainer: &dyn ModelTrainer, train: &Dataset, params: &ParamSet, seed: u64) -> Result<Self> {
        let scaling = FeatureScaler::fit(train)?;
        Self::fit_scaled(trainer, scaling, train, params, seed)
    }

    /// Fit with scaling parameters already computed from `train`
    pub fn fit_scaled(
        trainer: &dyn ModelTrainer,
        scaling: ScalingParameters,
        train: &Dataset,
        params: &ParamSet,
        seed: u64,
    ) -> Result<Self> {
        let scaled = scaling.apply(train)?;
        let state = trainer.fit(&scaled.to_matrix(), &scaled.labels(), params, seed)?;
        Ok(Self {
            model: trainer.name().to_string(),
            kind: trainer.kind(),
            params: params.clone(),
            state,
            scaling,
        })
    }

    pub fn predict_proba(&self, data: &Dataset) -> Result<Vec<f64>> {
        let scaled = self.scaling.apply(data)?;
        Ok(self.state.predict_proba(&scaled.to_matrix()))
    }

    /// (feature name, weight) pairs in schema order
    pub fn feature_weights(&self) -> Vec<(String, f64)> {
        self.scaling
            .features()
            .iter()
            .map(|f| f.name.clone())
            .zip(self.state.feature_weights())
            .collect()
    }
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &[bool]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if x.nrows() < 2 {
        return Err(EvalError::InsufficientData(format!(
            "need at least 2 training rows, got {}",
            x.nrows()
        )));
    }
    Ok(())
}
