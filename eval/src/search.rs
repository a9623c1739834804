// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Cross-validated grid search
//!
//! Every (grid point, repetition, fold) triple is an independent unit of
//! work. Units run on rayon and their results land in one slot per unit
//! index, so the outcome does not depend on scheduling or thread count.

use crate::datasets::Dataset;
use crate::error::{EvalError, Result};
use crate::folds::FoldPlan;
use crate::grid::{HyperparameterGrid, ParamSet};
use crate::roc::roc_auc;
use crate::seed::{SeedContext, SeedStream};
use crate::trainers::{ModelTrainer, TrainedModel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a grid point took part in selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    Scored,
    Excluded { reason: String },
}

/// Cross-validation summary of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub params: ParamSet,
    /// Held-out AUC per unit, repetition-major (empty when excluded)
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub status: CandidateStatus,
}

impl CvResult {
    pub fn is_excluded(&self) -> bool {
        matches!(self.status, CandidateStatus::Excluded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best_params: ParamSet,
    pub best_mean_score: f64,
    pub best_index: usize,
    /// One entry per grid point, in grid order
    pub results: Vec<CvResult>,
}

impl SearchOutcome {
    pub fn n_excluded(&self) -> usize {
        self.results.iter().filter(|r| r.is_excluded()).count()
    }

    /// Indices of scored candidates, best mean first; earlier grid points win ties
    pub fn ranked(&self) -> Vec<usize> {
        ranked_candidates(&self.results)
    }
}

/// Grid search driver
pub struct HyperparameterSearch {
    seeds: SeedContext,
    threads: Option<usize>,
}

impl HyperparameterSearch {
    pub fn new(seeds: SeedContext) -> Self {
        Self { seeds, threads: None }
    }

    /// Cap the worker threads used for this search
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Score every grid point on every fold of every plan
    ///
    /// `train` is the unscaled training partition; each unit standardizes
    /// its own fold-train part. Candidate-level failures exclude the grid
    /// point, any other error aborts the search.
    pub fn run(
        &self,
        train: &Dataset,
        grid: &HyperparameterGrid,
        plans: &[FoldPlan],
        trainer: &dyn ModelTrainer,
    ) -> Result<SearchOutcome> {
        let points = grid.points();
        if points.is_empty() {
            return Err(EvalError::invalid_parameter("grid", "empty", "grid has no points"));
        }
        if plans.is_empty() {
            return Err(EvalError::InsufficientData("no fold plans to search over".to_string()));
        }
        let k = plans[0].k;
        for plan in plans {
            if plan.assignment.len() != train.len() {
                return Err(EvalError::LengthMismatch {
                    expected: train.len(),
                    actual: plan.assignment.len(),
                });
            }
            if plan.k != k || plan.assignment.iter().any(|&fold| fold >= k) {
                return Err(EvalError::invalid_parameter(
                    "folds",
                    plan.k,
                    "every fold plan must use the same fold count and only folds below it",
                ));
            }
        }
        for point in &points {
            trainer.validate(point)?;
        }

        let units_per_point = plans.len() * k;

        tracing::info!(
            "Searching {} candidates for {} ({} fits)",
            points.len(),
            trainer.name(),
            points.len() * units_per_point
        );

        let units: Vec<(usize, usize, usize)> = (0..points.len())
            .flat_map(|g| (0..plans.len()).flat_map(move |r| (0..k).map(move |f| (g, r, f))))
            .collect();

        let evaluate = |units: &[(usize, usize, usize)]| -> Vec<Result<f64>> {
            units
                .par_iter()
                .map(|&(g, r, f)| {
                    let index = (g * units_per_point + r * k + f) as u64;
                    let seed = self.seeds.derive(SeedStream::Trainer, index);
                    self.fit_unit(train, &plans[r], f, &points[g], trainer, seed)
                })
                .collect()
        };

        let outcomes = match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| EvalError::invalid_parameter("threads", threads, &e.to_string()))?;
                pool.install(|| evaluate(&units))
            }
            None => evaluate(&units),
        };

        let n_points = points.len();
        let mut outcomes = outcomes.into_iter();
        let mut results = Vec::with_capacity(n_points);
        for point in points {
            let chunk: Vec<Result<f64>> = outcomes.by_ref().take(units_per_point).collect();
            results.push(summarize(point, chunk, trainer.name())?);
        }

        let best_index = best_candidate(&results).ok_or_else(|| EvalError::NoViableModel {
            model: trainer.name().to_string(),
            candidates: results.len(),
        })?;
        let best = &results[best_index];

        tracing::info!(
            "{}: best CV AUC {:.4} ± {:.4} with {} ({} excluded)",
            trainer.name(),
            best.mean_score,
            best.std_score,
            best.params,
            results.iter().filter(|r| r.is_excluded()).count()
        );

        Ok(SearchOutcome {
            best_params: best.params.clone(),
            best_mean_score: best.mean_score,
            best_index,
            results,
        })
    }

    fn fit_unit(
        &self,
        train: &Dataset,
        plan: &FoldPlan,
        fold: usize,
        params: &ParamSet,
        trainer: &dyn ModelTrainer,
        seed: u64,
    ) -> Result<f64> {
        let (fit_idx, held_idx) = plan.fold_indices(fold);
        let fit_part = train.subset(&fit_idx);
        let held_part = train.subset(&held_idx);

        let model = TrainedModel::fit(trainer, &fit_part, params, seed)?;
        let probabilities = model.predict_proba(&held_part)?;
        roc_auc(&held_part.labels(), &probabilities)
    }
}

/// Fold results of one grid point into a [`CvResult`]
fn summarize(params: ParamSet, outcomes: Vec<Result<f64>>, model: &str) -> Result<CvResult> {
    let mut scores = Vec::with_capacity(outcomes.len());
    let mut failure: Option<EvalError> = None;

    for outcome in outcomes {
        match outcome {
            Ok(score) => scores.push(score),
            Err(e) if e.is_candidate_failure() => {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(e) = failure {
        tracing::warn!("{}: excluding candidate [{}]: {}", model, params, e);
        return Ok(CvResult {
            params,
            scores: Vec::new(),
            mean_score: f64::NAN,
            std_score: f64::NAN,
            status: CandidateStatus::Excluded { reason: e.to_string() },
        });
    }

    let n = scores.len() as f64;
    let mean_score = scores.iter().sum::<f64>() / n;
    let std_score = (scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n).sqrt();

    Ok(CvResult {
        params,
        scores,
        mean_score,
        std_score,
        status: CandidateStatus::Scored,
    })
}

fn ranked_candidates(results: &[CvResult]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..results.len()).filter(|&i| !results[i].is_excluded()).collect();
    // Stable sort keeps grid order among equal means
    ranked.sort_by(|&a, &b| results[b].mean_score.total_cmp(&results[a].mean_score));
    ranked
}

/// Highest mean score among scored candidates; earliest wins ties
fn best_candidate(results: &[CvResult]) -> Option<usize> {
    ranked_candidates(results).first().copied()
}
