// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible model-selection pipeline
//!
//! Orchestrates:
//! - Stratified train/test split
//! - Train-only feature scaling
//! - Repeated stratified k-fold grid search per model family
//! - Refit, Youden's-J threshold selection and test metrics
//! - Comparison table, results serialization and model cards

use crate::datasets::{Dataset, DEFAULT_LABEL_COLUMN};
use crate::error::{EvalError, Result};
use crate::folds::assign_folds;
use crate::grid::{HyperparameterGrid, ParamSet};
use crate::metrics::{evaluate, ConfusionMatrix, MetricsReport};
use crate::model_card::{ModelCard, ModelCardBuilder, TrainingProcedure};
use crate::report::ComparisonTable;
use crate::roc::{select_threshold, RocCurve};
use crate::scaling::{FeatureScaler, ScalingParameters};
use crate::search::{CandidateStatus, CvResult, HyperparameterSearch, SearchOutcome};
use crate::seed::{SeedContext, SeedStream};
use crate::split::{stratified_split, Split};
use crate::trainers::{ModelKind, ModelTrainer, TrainedModel};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One model family to evaluate, optionally with its own grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    /// Searched instead of the family's default grid when present
    #[serde(default)]
    pub grid: Option<HyperparameterGrid>,
}

impl ModelSpec {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind, grid: None }
    }

    pub fn with_grid(mut self, grid: HyperparameterGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Grid this spec will search
    pub fn resolved_grid(&self) -> HyperparameterGrid {
        self.grid.clone().unwrap_or_else(|| self.kind.trainer().default_grid())
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Share of each class sent to the training partition
    pub train_fraction: f64,
    /// Cross-validation fold count
    pub folds: usize,
    /// Independent fold repetitions
    pub repeats: usize,
    /// Top-level random seed; every stream is derived from it
    pub seed: u64,
    pub label_column: String,
    /// Predictor columns to load (all non-label columns when absent)
    pub feature_columns: Option<Vec<String>>,
    pub models: Vec<ModelSpec>,
    /// Worker thread cap for the search (rayon default when absent)
    pub threads: Option<usize>,
    pub output_dir: String,
    /// Label used for the dataset in reports and model cards
    pub dataset_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            folds: 5,
            repeats: 3,
            seed: 42,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            feature_columns: None,
            models: ModelKind::all().iter().map(|&k| ModelSpec::new(k)).collect(),
            threads: None,
            output_dir: "eval/results".to_string(),
            dataset_name: "synthetic".to_string(),
        }
    }
}

/// Everything learned about one model family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_name: String,
    pub model_kind: ModelKind,
    pub model_description: String,
    pub best_params: ParamSet,
    pub cv_auc: f64,
    pub cv_auc_std: f64,
    pub candidates: usize,
    pub excluded_candidates: usize,
    pub cv_results: Vec<CvResult>,
    pub threshold: f64,
    pub youden_j: f64,
    pub roc_curve: RocCurve,
    pub confusion_matrix: ConfusionMatrix,
    pub metrics: MetricsReport,
    pub weight_kind: String,
    pub feature_weights: Vec<(String, f64)>,
    pub training_samples: usize,
    pub test_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    pub total_samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub features: Vec<String>,
    pub label_distribution: HashMap<String, usize>,
}

/// Complete pipeline output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub config: PipelineConfig,
    pub dataset_info: DatasetInfo,
    pub model_results: Vec<ModelResult>,
    pub comparison: ComparisonTable,
    /// Highest test AUC
    pub best_model: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Main evaluation pipeline
pub struct EvaluationPipeline {
    config: PipelineConfig,
}

impl EvaluationPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the feature table named by `path` with the configured columns
    pub fn load_dataset(&self, path: &Path) -> Result<Dataset> {
        let dataset = Dataset::from_csv(path, &self.config.label_column, self.config.feature_columns.as_deref())?;
        tracing::info!(
            "Dataset loaded from {}: {} records, {} features",
            path.display(),
            dataset.len(),
            dataset.n_features()
        );
        Ok(dataset)
    }

    /// Split, scale and fold `dataset` the way [`run`](Self::run) does
    ///
    /// Returns the split, the training scaling parameters and the fold
    /// plans. Scaling is fitted before any model so a constant training
    /// feature is reported first.
    pub fn prepare(&self, dataset: &Dataset) -> Result<(Split, ScalingParameters, Vec<crate::folds::FoldPlan>)> {
        let seeds = SeedContext::new(self.config.seed);

        let split = stratified_split(dataset, self.config.train_fraction, seeds.derive(SeedStream::Split, 0))?;
        let scaling = FeatureScaler::fit(&split.train)?;
        let plans = assign_folds(&split.train, self.config.folds, self.config.repeats, seeds.root())?;

        tracing::info!(
            "Split {} records into {} train / {} test; {} x {}-fold CV",
            dataset.len(),
            split.train.len(),
            split.test.len(),
            self.config.repeats,
            self.config.folds
        );

        Ok((split, scaling, plans))
    }

    /// Run the full pipeline on `dataset`
    pub fn run(&self, dataset: &Dataset) -> Result<EvaluationResults> {
        if self.config.models.is_empty() {
            return Err(EvalError::invalid_parameter("models", "[]", "at least one model is required"));
        }

        let seeds = SeedContext::new(self.config.seed);
        let (split, scaling, plans) = self.prepare(dataset)?;
        let search = HyperparameterSearch::new(seeds).with_threads(self.config.threads);

        let mut model_results = Vec::with_capacity(self.config.models.len());
        for (index, spec) in self.config.models.iter().enumerate() {
            let trainer = spec.kind.trainer();
            tracing::info!("Evaluating model: {}", trainer.name());

            let grid = spec.resolved_grid();
            let outcome = search.run(&split.train, &grid, &plans, trainer.as_ref())?;

            let (chosen, model) = refit_ranked(
                trainer.as_ref(),
                &scaling,
                &split.train,
                &outcome,
                seeds.derive(SeedStream::Refit, index as u64),
            )?;

            let probabilities = model.predict_proba(&split.test)?;
            let labels = split.test.labels();
            let selection = select_threshold(&labels, &probabilities)?;
            let (confusion_matrix, metrics) = evaluate(&labels, &probabilities, selection.threshold, &selection.curve)?;

            tracing::info!(
                "  {} - threshold {:.4}, Accuracy: {:.4}, F1: {:.4}, AUC: {:.4}",
                trainer.name(),
                selection.threshold,
                metrics.accuracy,
                metrics.f1,
                metrics.auc
            );

            let selected = &outcome.results[chosen];
            model_results.push(ModelResult {
                model_name: trainer.name().to_string(),
                model_kind: spec.kind,
                model_description: trainer.description().to_string(),
                best_params: selected.params.clone(),
                cv_auc: selected.mean_score,
                cv_auc_std: selected.std_score,
                candidates: outcome.results.len(),
                excluded_candidates: outcome.n_excluded(),
                threshold: selection.threshold,
                youden_j: selection.youden_j,
                roc_curve: selection.curve,
                confusion_matrix,
                metrics,
                weight_kind: model.state.weight_kind().to_string(),
                feature_weights: model.feature_weights(),
                training_samples: split.train.len(),
                test_samples: split.test.len(),
                cv_results: outcome.results,
            });
        }

        let comparison = ComparisonTable::aggregate(
            model_results
                .iter()
                .map(|r| (r.model_name.clone(), r.metrics))
                .collect(),
        );
        let best_model = comparison.best_by_auc().map(|row| row.model.clone());

        let dataset_info = DatasetInfo {
            name: self.config.dataset_name.clone(),
            total_samples: dataset.len(),
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            features: dataset.schema().to_vec(),
            label_distribution: dataset
                .label_distribution()
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
        };

        Ok(EvaluationResults {
            config: self.config.clone(),
            dataset_info,
            model_results,
            comparison,
            best_model,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Generate a model card for a specific model result
    pub fn generate_model_card(result: &ModelResult, results: &EvaluationResults) -> ModelCard {
        let config = &results.config;
        let mut builder = ModelCardBuilder::new(&result.model_name, &results.version, result.model_kind.as_str())
            .description(&format!(
                "{}. Hyperparameters selected by repeated stratified cross-validation on held-out AUC.",
                result.model_description
            ))
            .organization("Hyperpolymath")
            .training(TrainingProcedure {
                train_fraction: config.train_fraction,
                folds: config.folds,
                repeats: config.repeats,
                seed: config.seed,
                grid_size: result.candidates,
                excluded_candidates: result.excluded_candidates,
                hyperparameters: Some(result.best_params.clone()),
                cv_auc: result.cv_auc,
                cv_auc_std: result.cv_auc_std,
            })
            .metrics(result.metrics, result.confusion_matrix)
            .threshold(result.threshold, result.youden_j)
            .roc_curve(&result.roc_curve)
            .dataset(&results.dataset_info.name, result.training_samples, result.test_samples)
            .feature_weights(result.feature_weights.clone());

        if result.excluded_candidates > 0 {
            builder = builder.add_caveat(&format!(
                "{} of {} grid candidates were excluded from selection after failing on at least one fold",
                result.excluded_candidates, result.candidates
            ));
        }
        if result.test_samples < 50 {
            builder = builder.add_caveat("Test set is small; metric estimates have wide uncertainty");
        }

        builder.build()
    }

    /// Save results to JSON file
    pub fn save_results(results: &EvaluationResults, output_path: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json).with_context(|| format!("writing {}", output_path.display()))?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Generate a markdown report
    pub fn generate_report(results: &EvaluationResults) -> String {
        let mut report = String::new();

        report.push_str("# Claim Classifier Evaluation Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        let info = &results.dataset_info;
        report.push_str("## Dataset\n\n");
        report.push_str(&format!("- **Name:** {}\n", info.name));
        report.push_str(&format!("- **Total Samples:** {}\n", info.total_samples));
        report.push_str(&format!(
            "- **Split Sizes:** Train={}, Test={}\n",
            info.train_samples, info.test_samples
        ));
        report.push_str(&format!("- **Features:** {}\n\n", info.features.join(", ")));

        report.push_str("## Summary\n\n");
        if let Some(ref best) = results.best_model {
            report.push_str(&format!("**Best Model (test AUC):** {}\n\n", best));
        }
        report.push_str(&results.comparison.to_markdown());
        report.push('\n');

        report.push_str("## Detailed Results\n\n");
        for result in &results.model_results {
            report.push_str(&format!("### {}\n\n", result.model_name));
            report.push_str(&format!("*{}*\n\n", result.model_description));
            report.push_str(&format!("- Chosen hyperparameters: {}\n", result.best_params));
            report.push_str(&format!(
                "- CV AUC: {:.4} ± {:.4} ({} candidates, {} excluded)\n",
                result.cv_auc, result.cv_auc_std, result.candidates, result.excluded_candidates
            ));
            report.push_str(&format!(
                "- Decision threshold: {:.6} (Youden's J {:.4}, {} ROC points)\n\n",
                result.threshold,
                result.youden_j,
                result.roc_curve.points.len()
            ));

            report.push_str("#### Test Metrics\n\n");
            report.push_str(&format!("```\n{}```\n\n", result.metrics.format(&result.confusion_matrix)));

            if !result.feature_weights.is_empty() {
                report.push_str(&format!("#### Feature Weights ({})\n\n", result.weight_kind));
                for (feature, weight) in &result.feature_weights {
                    report.push_str(&format!("- {}: {:.4}\n", feature, weight));
                }
                report.push('\n');
            }

            let excluded: Vec<&CvResult> = result.cv_results.iter().filter(|r| r.is_excluded()).collect();
            if !excluded.is_empty() {
                report.push_str("#### Excluded Candidates\n\n");
                for candidate in excluded {
                    if let CandidateStatus::Excluded { ref reason } = candidate.status {
                        report.push_str(&format!("- [{}]: {}\n", candidate.params, reason));
                    }
                }
                report.push('\n');
            }
        }

        report.push_str("## Caveats\n\n");
        report.push_str(&format!("- {}\n\n", crate::model_card::THRESHOLD_BIAS_CAVEAT));

        report.push_str("## Configuration\n\n");
        report.push_str(&format!(
            "```json\n{}\n```\n",
            serde_json::to_string_pretty(&results.config).unwrap_or_default()
        ));

        report
    }

    /// Generate and save model cards for all evaluated models
    pub fn save_model_cards(results: &EvaluationResults, output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let cards_dir = output_dir.join("model_cards");
        std::fs::create_dir_all(&cards_dir)
            .with_context(|| format!("creating {}", cards_dir.display()))?;

        let mut saved_paths = Vec::new();

        for result in &results.model_results {
            let card = Self::generate_model_card(result, results);
            let stem = result.model_kind.as_str().replace('-', "_");

            let md_path = cards_dir.join(format!("{}_model_card.md", stem));
            card.save(&md_path)?;
            saved_paths.push(md_path);

            let json_path = cards_dir.join(format!("{}_model_card.json", stem));
            card.save_json(&json_path)?;
            saved_paths.push(json_path);

            tracing::info!("Model card saved: {}_model_card", stem);
        }

        Ok(saved_paths)
    }
}

/// Refit scored candidates on the full training partition, best first
///
/// A candidate-level failure moves on to the next-ranked grid point.
/// Returns the index of the candidate that was fitted.
fn refit_ranked(
    trainer: &dyn ModelTrainer,
    scaling: &ScalingParameters,
    train: &Dataset,
    outcome: &SearchOutcome,
    seed: u64,
) -> Result<(usize, TrainedModel)> {
    for index in outcome.ranked() {
        let params = &outcome.results[index].params;
        match TrainedModel::fit_scaled(trainer, scaling.clone(), train, params, seed) {
            Ok(model) => return Ok((index, model)),
            Err(e) if e.is_candidate_failure() => {
                tracing::warn!("{}: refit with [{}] failed, trying the next candidate: {}", trainer.name(), params, e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(EvalError::NoViableModel {
        model: trainer.name().to_string(),
        candidates: outcome.results.len(),
    })
}
