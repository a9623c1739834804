// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types for the model-selection pipeline

use thiserror::Error;

/// Result type alias used throughout the library
pub type Result<T> = std::result::Result<T, EvalError>;

/// Every failure the pipeline can report
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid train fraction {fraction}: must lie strictly between 0 and 1")]
    InvalidFraction { fraction: f64 },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Label class {label} has {count} member(s); at least 2 are required to split")]
    EmptyClass { label: bool, count: usize },

    #[error("Feature '{feature}' has zero variance in the training data")]
    DegenerateFeature { feature: String },

    #[error("Optimizer did not converge after {iterations} iterations ({detail})")]
    Convergence { iterations: usize, detail: String },

    #[error("No viable model for '{model}': all {candidates} candidate(s) failed")]
    NoViableModel { model: String, candidates: usize },

    #[error("Labels contain a single class ({positives} positive, {negatives} negative); ROC is undefined")]
    DegenerateLabels { positives: usize, negatives: usize },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Missing value in row {row}, column '{column}'")]
    MissingValue { row: usize, column: String },

    #[error("Non-numeric value '{value}' in row {row}, column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Unrecognised label '{value}' in row {row}")]
    InvalidLabel { row: usize, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether this error disqualifies a single search candidate instead of
    /// aborting the run.
    ///
    /// Fold-level degeneracies (a feature constant inside one fold, a fold
    /// with a single class) and optimizer non-convergence are contained by
    /// the search; configuration and data errors are not.
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            EvalError::Convergence { .. }
                | EvalError::DegenerateFeature { .. }
                | EvalError::DegenerateLabels { .. }
                | EvalError::InsufficientData(_)
        )
    }

    pub(crate) fn invalid_parameter(name: &str, value: impl ToString, reason: &str) -> Self {
        EvalError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
