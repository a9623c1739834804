// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Feature tables for claim classification
//!
//! A [`Dataset`] is the boundary between the upstream feature-construction
//! stage and the model-selection pipeline: a fixed schema of numeric
//! features plus a boolean `truth_label` per record. Datasets are never
//! mutated; every stage builds a new one.

use crate::error::{EvalError, Result};
use crate::seed::{SeedContext, SeedStream};
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default name of the label column in input tables
pub const DEFAULT_LABEL_COLUMN: &str = "truth_label";

/// One labelled example, values aligned with the dataset schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub features: Vec<f64>,
    pub label: bool,
}

impl FeatureRecord {
    pub fn new(features: Vec<f64>, label: bool) -> Self {
        Self { features, label }
    }
}

/// An ordered collection of records sharing one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    schema: Vec<String>,
    records: Vec<FeatureRecord>,
}

impl Dataset {
    /// Build a dataset, checking the schema invariants
    pub fn new(schema: Vec<String>, records: Vec<FeatureRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &schema {
            if !seen.insert(name.as_str()) {
                return Err(EvalError::SchemaMismatch {
                    expected: "unique feature names".to_string(),
                    actual: format!("duplicate feature '{}'", name),
                });
            }
        }

        for (row, record) in records.iter().enumerate() {
            if record.features.len() != schema.len() {
                return Err(EvalError::SchemaMismatch {
                    expected: format!("{} features", schema.len()),
                    actual: format!("{} features in row {}", record.features.len(), row),
                });
            }
            if let Some(col) = record.features.iter().position(|v| !v.is_finite()) {
                return Err(EvalError::MissingValue {
                    row,
                    column: schema[col].clone(),
                });
            }
        }

        Ok(Self { schema, records })
    }

    /// Load a feature table from a CSV file
    ///
    /// `feature_columns` selects and orders the predictors; when `None`,
    /// every column except the label is used.
    pub fn from_csv(path: &Path, label_column: &str, feature_columns: Option<&[String]>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, label_column, feature_columns)
    }

    /// Load a feature table from any CSV source
    pub fn from_reader<R: Read>(reader: R, label_column: &str, feature_columns: Option<&[String]>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EvalError::MissingColumn(name.to_string()))
        };

        let label_idx = position(label_column)?;
        let schema: Vec<String> = match feature_columns {
            Some(columns) if columns.iter().any(|c| c == label_column) => {
                return Err(EvalError::SchemaMismatch {
                    expected: "feature columns distinct from the label column".to_string(),
                    actual: format!("label column '{}' listed as a feature", label_column),
                });
            }
            Some(columns) => columns.to_vec(),
            None => headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != label_idx)
                .map(|(_, h)| h.to_string())
                .collect(),
        };
        let feature_idx = schema.iter().map(|name| position(name.as_str())).collect::<Result<Vec<_>>>()?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;

            let raw_label = record.get(label_idx).unwrap_or("");
            let label = parse_label(raw_label).ok_or_else(|| EvalError::InvalidLabel {
                row,
                value: raw_label.to_string(),
            })?;

            let mut features = Vec::with_capacity(feature_idx.len());
            for (name, &idx) in schema.iter().zip(feature_idx.iter()) {
                let raw = record.get(idx).unwrap_or("");
                if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
                    return Err(EvalError::MissingValue { row, column: name.clone() });
                }
                let value: f64 = raw.parse().map_err(|_| EvalError::InvalidValue {
                    row,
                    column: name.clone(),
                    value: raw.to_string(),
                })?;
                features.push(value);
            }

            records.push(FeatureRecord { features, label });
        }

        tracing::info!("Loaded {} records with {} features", records.len(), schema.len());
        Self::new(schema, records)
    }

    /// Generate a synthetic table of tweet-level behaviour features
    ///
    /// True statements lean towards verified, older accounts with calmer
    /// wording; the classes overlap so the task is not trivially separable.
    pub fn synthetic(size: usize, positive_rate: f64, seed: u64) -> Self {
        let mut rng = SeedContext::new(seed).rng(SeedStream::Synthetic, 0);

        let schema: Vec<String> = [
            "followers_log",
            "account_age_days_log",
            "verified",
            "retweets_log",
            "sentiment_compound",
            "readability_grade",
            "exclamation_count",
            "url_count",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let records = (0..size)
            .map(|_| {
                let label = rng.gen_bool(positive_rate.clamp(0.0, 1.0));
                let shift = if label { 1.0 } else { 0.0 };
                let features = vec![
                    6.0 + 1.2 * shift + 1.5 * gaussian(&mut rng),
                    6.5 + 0.8 * shift + 1.0 * gaussian(&mut rng),
                    if rng.gen_bool(0.15 + 0.35 * shift) { 1.0 } else { 0.0 },
                    2.0 + 0.3 * shift + 1.2 * gaussian(&mut rng),
                    -0.2 + 0.3 * shift + 0.4 * gaussian(&mut rng),
                    9.0 + 1.0 * shift + 2.5 * gaussian(&mut rng),
                    (1.5 - 1.0 * shift + gaussian(&mut rng)).max(0.0).round(),
                    f64::from(rng.gen_range(0..3u8)),
                ];
                FeatureRecord { features, label }
            })
            .collect();

        Self { schema, records }
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.schema.len()
    }

    pub fn labels(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.label).collect()
    }

    /// (positive, negative) counts
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.records.iter().filter(|r| r.label).count();
        (positives, self.records.len() - positives)
    }

    /// Record indices grouped by class, positives first
    pub fn class_indices(&self) -> [(bool, Vec<usize>); 2] {
        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            if record.label {
                positives.push(i);
            } else {
                negatives.push(i);
            }
        }
        [(true, positives), (false, negatives)]
    }

    /// New dataset holding the records at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            schema: self.schema.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// New dataset with the same labels and transformed feature rows
    pub(crate) fn map_features<F>(&self, mut f: F) -> Dataset
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        Dataset {
            schema: self.schema.clone(),
            records: self
                .records
                .iter()
                .map(|r| FeatureRecord {
                    features: f(&r.features),
                    label: r.label,
                })
                .collect(),
        }
    }

    /// Row-major design matrix
    pub fn to_matrix(&self) -> Array2<f64> {
        let n_features = self.n_features();
        Array2::from_shape_fn((self.len(), n_features), |(i, j)| self.records[i].features[j])
    }

    /// Label distribution keyed by class
    pub fn label_distribution(&self) -> HashMap<bool, usize> {
        let mut dist = HashMap::new();
        for record in &self.records {
            *dist.entry(record.label).or_insert(0) += 1;
        }
        dist
    }
}

fn parse_label(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" | "t" => Some(true),
        "false" | "0" | "0.0" | "no" | "f" => Some(false),
        _ => None,
    }
}

/// Standard normal draw (Box-Muller)
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
