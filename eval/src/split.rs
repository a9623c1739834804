// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Stratified train/test partitioning

use crate::datasets::Dataset;
use crate::error::{EvalError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Disjoint train and test partitions of one dataset
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    /// Indices into the source dataset, ascending
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Number of class members sent to the training side
///
/// Floor of the exact share, but never zero: a class with at least two
/// members always contributes to both sides.
pub(crate) fn train_share(class_size: usize, fraction: f64) -> usize {
    let share = (class_size as f64 * fraction).floor() as usize;
    share.clamp(1, class_size.saturating_sub(1))
}

/// Partition `dataset` so each class contributes `train_fraction` of its
/// members to `train`
pub fn stratified_split(dataset: &Dataset, train_fraction: f64, seed: u64) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(EvalError::InvalidFraction {
            fraction: train_fraction,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for (label, mut indices) in dataset.class_indices() {
        if indices.len() < 2 {
            return Err(EvalError::EmptyClass {
                label,
                count: indices.len(),
            });
        }

        indices.shuffle(&mut rng);
        let n_train = train_share(indices.len(), train_fraction);
        train_indices.extend_from_slice(&indices[..n_train]);
        test_indices.extend_from_slice(&indices[n_train..]);
    }

    // Keep source order within each side
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    tracing::debug!(
        "Stratified split: {} train / {} test (fraction {})",
        train_indices.len(),
        test_indices.len(),
        train_fraction
    );

    Ok(Split {
        train: dataset.subset(&train_indices),
        test: dataset.subset(&test_indices),
        train_indices,
        test_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::FeatureRecord;

    fn dataset(positives: usize, negatives: usize) -> Dataset {
        let records = (0..positives + negatives)
            .map(|i| FeatureRecord::new(vec![i as f64], i < positives))
            .collect();
        Dataset::new(vec!["x".to_string()], records).unwrap()
    }

    #[test]
    fn test_split_preserves_class_proportions() {
        let data = dataset(60, 40);
        for &fraction in &[0.1, 0.33, 0.5, 0.7, 0.9] {
            for seed in 0..5 {
                let split = stratified_split(&data, fraction, seed).unwrap();
                let (train_pos, train_neg) = split.train.class_counts();

                // Within one record of the exact share for each class
                assert!((train_pos as f64 / 60.0 - fraction).abs() <= 1.0 / 60.0);
                assert!((train_neg as f64 / 40.0 - fraction).abs() <= 1.0 / 40.0);
            }
        }
    }

    #[test]
    fn test_split_is_a_partition() {
        let data = dataset(30, 25);
        let split = stratified_split(&data, 0.7, 42).unwrap();

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.test_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..55).collect::<Vec<_>>());
        assert_eq!(split.train.len() + split.test.len(), 55);
    }

    #[test]
    fn test_split_is_reproducible() {
        let data = dataset(30, 25);
        let a = stratified_split(&data, 0.7, 7).unwrap();
        let b = stratified_split(&data, 0.7, 7).unwrap();
        assert_eq!(a.train_indices, b.train_indices);

        let c = stratified_split(&data, 0.7, 8).unwrap();
        assert_ne!(a.train_indices, c.train_indices);
    }

    #[test]
    fn test_invalid_fraction() {
        let data = dataset(10, 10);
        for &fraction in &[0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                stratified_split(&data, fraction, 1),
                Err(EvalError::InvalidFraction { .. })
            ));
        }
    }

    #[test]
    fn test_small_class_rejected() {
        let data = dataset(10, 1);
        match stratified_split(&data, 0.5, 1) {
            Err(EvalError::EmptyClass { label, count }) => {
                assert!(!label);
                assert_eq!(count, 1);
            }
            other => panic!("expected EmptyClass, got {:?}", other.map(|s| s.train.len())),
        }
    }

    #[test]
    fn test_tiny_class_contributes_to_both_sides() {
        let data = dataset(2, 20);
        let split = stratified_split(&data, 0.3, 3).unwrap();
        assert_eq!(split.train.class_counts().0, 1);
        assert_eq!(split.test.class_counts().0, 1);
    }
}
