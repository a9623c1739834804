// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model-selection CLI for true/false claim classifiers
//!
//! Usage:
//!   claimcheck --synthetic-samples 500 --seed 42
//!   claimcheck --input features.csv --models elastic-net --folds 10

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use claimcheck_eval::pipeline::{EvaluationPipeline, ModelSpec, PipelineConfig};
use claimcheck_eval::{Dataset, ModelKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Report formats written to the output directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
    Both,
}

impl OutputFormat {
    fn writes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }

    fn writes_markdown(self) -> bool {
        matches!(self, OutputFormat::Markdown | OutputFormat::Both)
    }
}

#[derive(Parser, Debug)]
#[command(name = "claimcheck")]
#[command(about = "Select and evaluate claim classifiers with cross-validated grid search")]
#[command(version)]
struct Args {
    /// Feature table (CSV with a header row); synthetic data when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Name of the boolean label column
    #[arg(long, default_value = "truth_label")]
    label_column: String,

    /// Predictor columns to use (comma-separated, empty = all)
    #[arg(long)]
    features: Option<String>,

    /// Share of each class used for training
    #[arg(long, default_value_t = 0.7)]
    train_fraction: f64,

    /// Cross-validation folds
    #[arg(short = 'k', long, default_value_t = 5)]
    folds: usize,

    /// Repetitions of the fold assignment
    #[arg(short, long, default_value_t = 3)]
    repeats: usize,

    /// Random seed for reproducibility
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Model families to run (comma-separated, empty = all)
    #[arg(short, long)]
    models: Option<String>,

    /// JSON file holding a list of model specs with custom grids
    #[arg(long)]
    grid_config: Option<PathBuf>,

    /// Worker threads for the search (default: all cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Output directory for results
    #[arg(short, long, default_value = "eval/results")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Both)]
    format: OutputFormat,

    /// Generate model cards for each model (`--model-cards false` to skip)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    model_cards: bool,

    /// Size of the synthetic table used without --input
    #[arg(long, default_value_t = 500)]
    synthetic_samples: usize,
}

fn model_specs(args: &Args) -> Result<Vec<ModelSpec>> {
    if let Some(ref path) = args.grid_config {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let specs: Vec<ModelSpec> =
            serde_json::from_str(&raw).with_context(|| format!("parsing grid config {}", path.display()))?;
        return Ok(specs);
    }

    match args.models {
        Some(ref names) => names
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|name| -> Result<ModelSpec> { Ok(ModelSpec::new(name.parse::<ModelKind>()?)) })
            .collect(),
        None => Ok(ModelKind::all().iter().map(|&k| ModelSpec::new(k)).collect()),
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let dataset_name = args
        .input
        .as_ref()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "synthetic".to_string());

    tracing::info!("Claim Classifier Model Selection");
    tracing::info!("================================");
    tracing::info!("Dataset: {}", dataset_name);
    tracing::info!("Seed: {}", args.seed);

    let feature_columns: Option<Vec<String>> = args
        .features
        .as_ref()
        .map(|f| f.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());

    let config = PipelineConfig {
        train_fraction: args.train_fraction,
        folds: args.folds,
        repeats: args.repeats,
        seed: args.seed,
        label_column: args.label_column.clone(),
        feature_columns,
        models: model_specs(&args)?,
        threads: args.threads,
        output_dir: args.output.to_string_lossy().to_string(),
        dataset_name: dataset_name.clone(),
    };

    let pipeline = EvaluationPipeline::new(config);
    let dataset = match args.input {
        Some(ref path) => pipeline.load_dataset(path)?,
        None => Dataset::synthetic(args.synthetic_samples, 0.5, args.seed),
    };

    let results = pipeline.run(&dataset).context("evaluation pipeline failed")?;

    // Print summary to console
    println!("\n{}", "=".repeat(78));
    println!("EVALUATION SUMMARY");
    println!("{}", "=".repeat(78));
    if let Some(ref best) = results.best_model {
        println!("\nBest Model (test AUC): {}", best);
    }
    println!("\nModel Comparison:");
    print!("{}", results.comparison.to_console());

    println!("\nSelected Hyperparameters:");
    for result in &results.model_results {
        println!(
            "{}: {} | CV AUC {:.4} ± {:.4} | threshold {:.4} | {} of {} candidates excluded",
            result.model_name,
            result.best_params,
            result.cv_auc,
            result.cv_auc_std,
            result.threshold,
            result.excluded_candidates,
            result.candidates
        );
    }

    // Save outputs
    std::fs::create_dir_all(&args.output)?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");

    if args.format.writes_json() {
        let json_path = args.output.join(format!("eval_{}_{}.json", dataset_name, timestamp));
        EvaluationPipeline::save_results(&results, &json_path)?;
        println!("\nJSON results saved to: {}", json_path.display());
    }

    if args.format.writes_markdown() {
        let report = EvaluationPipeline::generate_report(&results);
        let md_path = args.output.join(format!("eval_{}_{}.md", dataset_name, timestamp));
        std::fs::write(&md_path, report).with_context(|| format!("writing {}", md_path.display()))?;
        println!("Markdown report saved to: {}", md_path.display());
    }

    if args.model_cards {
        let cards = EvaluationPipeline::save_model_cards(&results, &args.output)?;
        println!("Model cards saved to: {}/model_cards/ ({} files)", args.output.display(), cards.len());
    }

    println!("\nEvaluation complete!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["claimcheck"]).unwrap();
        assert_eq!(args.format, OutputFormat::Both);
        assert!(args.model_cards);
        assert!(args.format.writes_json() && args.format.writes_markdown());
    }

    #[test]
    fn test_model_cards_can_be_disabled() {
        let args = Args::try_parse_from(["claimcheck", "--model-cards", "false"]).unwrap();
        assert!(!args.model_cards);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Args::try_parse_from(["claimcheck", "-f", "xml"]).is_err());

        let args = Args::try_parse_from(["claimcheck", "--format", "json"]).unwrap();
        assert!(args.format.writes_json());
        assert!(!args.format.writes_markdown());
    }

    #[test]
    fn test_model_list_parsing() {
        let args = Args::try_parse_from(["claimcheck", "--models", "gbt, lr"]).unwrap();
        let kinds: Vec<ModelKind> = model_specs(&args).unwrap().into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ModelKind::GradientBoosting, ModelKind::ElasticNet]);

        let bad = Args::try_parse_from(["claimcheck", "--models", "svm"]).unwrap();
        assert!(model_specs(&bad).is_err());
    }
}
