// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Leakage-safe model selection and evaluation for true/false claim classifiers
//!
//! This crate provides:
//! - Feature-table loading and a synthetic generator
//! - Stratified train/test split and repeated stratified k-fold assignment
//! - Train-only standardization, refitted inside every fold
//! - Elastic-net logistic regression and gradient-boosted trees
//! - Parallel, seeded cross-validated grid search
//! - ROC analysis with Youden's-J threshold selection
//! - Confusion-matrix metrics, comparison tables and model cards

pub mod boosting;
pub mod datasets;
pub mod elastic_net;
pub mod error;
pub mod folds;
pub mod grid;
pub mod metrics;
pub mod model_card;
pub mod pipeline;
pub mod report;
pub mod roc;
pub mod scaling;
pub mod search;
pub mod seed;
pub mod split;
pub mod trainers;
pub mod tree;

pub use datasets::{Dataset, FeatureRecord};
pub use error::{EvalError, Result};
pub use folds::{assign_folds, FoldPlan};
pub use grid::{HyperparameterGrid, ParamSet, ParamValue};
pub use metrics::{evaluate, ConfusionMatrix, MetricsReport};
pub use model_card::{ModelCard, ModelCardBuilder};
pub use pipeline::{EvaluationPipeline, EvaluationResults, ModelSpec, PipelineConfig};
pub use report::ComparisonTable;
pub use roc::{select_threshold, RocCurve, ThresholdSelection};
pub use scaling::{FeatureScaler, ScalingParameters};
pub use search::{CvResult, HyperparameterSearch, SearchOutcome};
pub use seed::{SeedContext, SeedStream};
pub use split::{stratified_split, Split};
pub use trainers::{ModelKind, ModelTrainer, TrainedModel};
