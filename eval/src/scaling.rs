// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Feature standardization
//!
//! Parameters are always fitted on a training partition and then applied,
//! unchanged, to every partition derived from the same run. Nothing outside
//! the dataset passed to [`FeatureScaler::fit`] can influence them.

use crate::datasets::Dataset;
use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// Relative tolerance under which a standard deviation counts as zero
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

/// Per-feature location and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

/// Fitted standardization parameters, in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    features: Vec<FeatureStats>,
}

/// Z-score scaler: `(x - mean) / std` with population standard deviation
pub struct FeatureScaler;

impl FeatureScaler {
    /// Fit per-feature mean and standard deviation on `train`
    pub fn fit(train: &Dataset) -> Result<ScalingParameters> {
        if train.is_empty() {
            return Err(EvalError::InsufficientData(
                "cannot fit scaling parameters on an empty training set".to_string(),
            ));
        }

        let n = train.len() as f64;
        let mut features = Vec::with_capacity(train.n_features());

        for (j, name) in train.schema().iter().enumerate() {
            let mean = train.records().iter().map(|r| r.features[j]).sum::<f64>() / n;
            let variance = train
                .records()
                .iter()
                .map(|r| (r.features[j] - mean).powi(2))
                .sum::<f64>()
                / n;
            let std = variance.sqrt();

            if std <= ZERO_VARIANCE_TOLERANCE * mean.abs().max(1.0) {
                return Err(EvalError::DegenerateFeature {
                    feature: name.clone(),
                });
            }

            features.push(FeatureStats {
                name: name.clone(),
                mean,
                std,
            });
        }

        Ok(ScalingParameters { features })
    }
}

impl ScalingParameters {
    pub fn features(&self) -> &[FeatureStats] {
        &self.features
    }

    /// Standardize every record of `dataset`, returning a new dataset
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        let same_schema = dataset.n_features() == self.features.len()
            && dataset
                .schema()
                .iter()
                .zip(self.features.iter())
                .all(|(name, stats)| *name == stats.name);

        if !same_schema {
            return Err(EvalError::SchemaMismatch {
                expected: format!("{:?}", self.features.iter().map(|f| &f.name).collect::<Vec<_>>()),
                actual: format!("{:?}", dataset.schema()),
            });
        }

        Ok(dataset.map_features(|row| {
            row.iter()
                .zip(self.features.iter())
                .map(|(x, stats)| (x - stats.mean) / stats.std)
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::FeatureRecord;

    fn dataset(rows: &[(f64, f64, bool)]) -> Dataset {
        Dataset::new(
            vec!["retweets".to_string(), "followers".to_string()],
            rows.iter()
                .map(|&(a, b, label)| FeatureRecord::new(vec![a, b], label))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_scaled_train_has_zero_mean_unit_std() {
        let train = dataset(&[
            (1.0, 100.0, true),
            (2.0, 250.0, false),
            (4.0, 80.0, true),
            (8.0, 310.0, false),
            (3.5, 120.0, true),
        ]);
        let params = FeatureScaler::fit(&train).unwrap();
        let scaled = params.apply(&train).unwrap();

        for j in 0..2 {
            let values: Vec<f64> = scaled.records().iter().map(|r| r.features[j]).collect();
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            assert!(mean.abs() < 1e-12, "mean = {}", mean);
            assert!((var.sqrt() - 1.0).abs() < 1e-12, "std = {}", var.sqrt());
        }
        assert_eq!(scaled.labels(), train.labels());
    }

    #[test]
    fn test_parameters_ignore_test_partition() {
        let train = dataset(&[(1.0, 2.0, true), (3.0, 5.0, false), (4.0, 9.0, true)]);
        let test_a = dataset(&[(100.0, -5.0, true)]);
        let test_b = dataset(&[(-3.0, 7.0, false), (0.0, 0.0, true)]);

        let before = FeatureScaler::fit(&train).unwrap();
        let _ = before.apply(&test_a).unwrap();
        let _ = before.apply(&test_b).unwrap();
        let after = FeatureScaler::fit(&train).unwrap();

        for (a, b) in before.features().iter().zip(after.features()) {
            assert_eq!(a.mean.to_bits(), b.mean.to_bits());
            assert_eq!(a.std.to_bits(), b.std.to_bits());
        }
    }

    #[test]
    fn test_constant_feature_is_degenerate() {
        let train = dataset(&[(0.1, 1.0, true), (0.1, 2.0, false), (0.1, 3.0, true)]);
        match FeatureScaler::fit(&train) {
            Err(EvalError::DegenerateFeature { feature }) => assert_eq!(feature, "retweets"),
            other => panic!("expected DegenerateFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_rejects_foreign_schema() {
        let train = dataset(&[(1.0, 2.0, true), (3.0, 5.0, false)]);
        let params = FeatureScaler::fit(&train).unwrap();
        let other = Dataset::new(
            vec!["likes".to_string(), "followers".to_string()],
            vec![FeatureRecord::new(vec![1.0, 1.0], true)],
        )
        .unwrap();
        assert!(matches!(params.apply(&other), Err(EvalError::SchemaMismatch { .. })));
    }
}
