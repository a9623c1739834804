// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone cross-validation report
//!
//! Runs the split and grid search only and prints every candidate's CV score

use anyhow::{Context, Result};
use clap::Parser;
use claimcheck_eval::pipeline::{EvaluationPipeline, ModelSpec, PipelineConfig};
use claimcheck_eval::search::{CandidateStatus, HyperparameterSearch};
use claimcheck_eval::trainers::all_trainers;
use claimcheck_eval::{Dataset, ModelKind, SeedContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cv-report")]
#[command(about = "Print cross-validated scores for every grid point")]
#[command(version)]
struct Args {
    /// Model family to search (elastic-net, gradient-boosting); all when omitted
    #[arg(short, long)]
    model: Option<String>,

    /// Feature table (CSV with a header row); synthetic data when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Name of the boolean label column
    #[arg(long, default_value = "truth_label")]
    label_column: String,

    /// Share of each class used for training
    #[arg(long, default_value_t = 0.7)]
    train_fraction: f64,

    /// Cross-validation folds
    #[arg(short = 'k', long, default_value_t = 5)]
    folds: usize,

    /// Repetitions of the fold assignment
    #[arg(short, long, default_value_t = 3)]
    repeats: usize,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Worker threads for the search
    #[arg(short, long)]
    threads: Option<usize>,

    /// Number of samples for the synthetic table
    #[arg(short, long, default_value_t = 500)]
    num_samples: usize,

    /// List available model families
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list {
        println!("Available model families:");
        println!("-------------------------");
        for trainer in all_trainers() {
            println!(
                "  {} ({}): {} [{} default grid points]",
                trainer.kind(),
                trainer.name(),
                trainer.description(),
                trainer.default_grid().len()
            );
        }
        return Ok(());
    }

    let kinds: Vec<ModelKind> = match args.model {
        Some(ref name) => vec![name.parse()?],
        None => ModelKind::all().to_vec(),
    };

    let config = PipelineConfig {
        train_fraction: args.train_fraction,
        folds: args.folds,
        repeats: args.repeats,
        seed: args.seed,
        label_column: args.label_column.clone(),
        models: kinds.iter().map(|&k| ModelSpec::new(k)).collect(),
        threads: args.threads,
        ..PipelineConfig::default()
    };
    let pipeline = EvaluationPipeline::new(config);

    let dataset = match args.input {
        Some(ref path) => pipeline.load_dataset(path)?,
        None => {
            tracing::info!("Generating synthetic dataset ({} samples, seed={})", args.num_samples, args.seed);
            Dataset::synthetic(args.num_samples, 0.5, args.seed)
        }
    };

    let (split, _, plans) = pipeline.prepare(&dataset).context("preparing split and folds")?;
    let (positives, negatives) = split.train.class_counts();
    println!("\nTraining partition: {} records ({} true, {} false)", split.train.len(), positives, negatives);

    let search = HyperparameterSearch::new(SeedContext::new(args.seed)).with_threads(args.threads);

    for spec in &pipeline.config().models {
        let trainer = spec.kind.trainer();
        let grid = spec.resolved_grid();

        println!("\n{}", "=".repeat(78));
        println!("{} ({} candidates, {} x {}-fold)", trainer.name(), grid.len(), args.repeats, args.folds);
        println!("{}", "=".repeat(78));

        let outcome = search.run(&split.train, &grid, &plans, trainer.as_ref())?;

        for (i, result) in outcome.results.iter().enumerate() {
            let marker = if i == outcome.best_index { "*" } else { " " };
            match result.status {
                CandidateStatus::Scored => println!(
                    "{} {:>8.4} ± {:<8.4} {}",
                    marker, result.mean_score, result.std_score, result.params
                ),
                CandidateStatus::Excluded { ref reason } => {
                    println!("  {:>8} {:<10} {} ({})", "excluded", "", result.params, reason)
                }
            }
        }
        println!("{:-<78}", "");
        println!("Best: {} (CV AUC {:.4})", outcome.best_params, outcome.best_mean_score);
    }

    Ok(())
}
