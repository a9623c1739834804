// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated stratified k-fold assignment

use crate::datasets::Dataset;
use crate::error::{EvalError, Result};
use crate::seed::{SeedContext, SeedStream};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Fold membership of every training record for one repetition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldPlan {
    pub repetition: usize,
    pub k: usize,
    /// `assignment[i]` is the fold of training record `i`
    pub assignment: Vec<usize>,
}

impl FoldPlan {
    /// (held-in, held-out) record indices for `fold`
    pub fn fold_indices(&self, fold: usize) -> (Vec<usize>, Vec<usize>) {
        let mut train = Vec::new();
        let mut validation = Vec::new();
        for (i, &f) in self.assignment.iter().enumerate() {
            if f == fold {
                validation.push(i);
            } else {
                train.push(i);
            }
        }
        (train, validation)
    }

    pub fn fold_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &f in &self.assignment {
            sizes[f] += 1;
        }
        sizes
    }
}

/// Assign every training record to one of `k` folds, `repeats` times
///
/// Each repetition shuffles each class with its own derived seed and deals
/// the members round-robin. The dealing position carries over from one
/// class to the next, so overall fold sizes differ by at most one as well.
pub fn assign_folds(train: &Dataset, k: usize, repeats: usize, seed: u64) -> Result<Vec<FoldPlan>> {
    let (positives, negatives) = train.class_counts();
    let smallest_class = positives.min(negatives);

    if k < 2 {
        return Err(EvalError::InsufficientData(format!(
            "fold count must be at least 2, got {}",
            k
        )));
    }
    if k > smallest_class {
        return Err(EvalError::InsufficientData(format!(
            "fold count {} exceeds the smallest class size {}",
            k, smallest_class
        )));
    }
    if repeats == 0 {
        return Err(EvalError::InsufficientData(
            "repeat count must be at least 1".to_string(),
        ));
    }

    let seeds = SeedContext::new(seed);
    let plans = (0..repeats)
        .map(|repetition| {
            let mut rng = seeds.rng(SeedStream::Folds, repetition as u64);
            let mut assignment = vec![0; train.len()];
            let mut next_fold = 0;

            for (_, mut indices) in train.class_indices() {
                indices.shuffle(&mut rng);
                for idx in indices {
                    assignment[idx] = next_fold;
                    next_fold = (next_fold + 1) % k;
                }
            }

            FoldPlan {
                repetition,
                k,
                assignment,
            }
        })
        .collect();

    Ok(plans)
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
    fn test_folds_partition_each_repetition() {
        let train = dataset(42, 28);
        let plans = assign_folds(&train, 5, 3, 42).unwrap();
        assert_eq!(plans.len(), 3);

        for plan in &plans {
            assert_eq!(plan.assignment.len(), 70);
            assert_eq!(plan.fold_sizes(), vec![14; 5]);

            let mut held_out: Vec<usize> = (0..5).flat_map(|f| plan.fold_indices(f).1).collect();
            held_out.sort_unstable();
            assert_eq!(held_out, (0..70).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_folds_are_stratified() {
        let train = dataset(23, 12);
        let plans = assign_folds(&train, 4, 1, 9).unwrap();
        let labels = train.labels();

        for fold in 0..4 {
            let (_, validation) = plans[0].fold_indices(fold);
            let positives = validation.iter().filter(|&&i| labels[i]).count();
            let negatives = validation.len() - positives;
            // 23 / 4 and 12 / 4 rounded either way
            assert!((5..=6).contains(&positives), "positives = {}", positives);
            assert_eq!(negatives, 3);
        }

        let sizes = plans[0].fold_sizes();
        let spread = sizes.iter().max().unwrap() - sizes.iter().min().unwrap();
        assert!(spread <= 1, "sizes = {:?}", sizes);
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let train = dataset(30, 20);
        let a = assign_folds(&train, 5, 2, 123).unwrap();
        let b = assign_folds(&train, 5, 2, 123).unwrap();
        assert_eq!(a, b);
        // Repetitions draw different partitions
        assert_ne!(a[0].assignment, a[1].assignment);
    }

    #[test]
    fn test_invalid_fold_counts() {
        let train = dataset(10, 3);
        assert!(matches!(assign_folds(&train, 1, 1, 0), Err(EvalError::InsufficientData(_))));
        assert!(matches!(assign_folds(&train, 4, 1, 0), Err(EvalError::InsufficientData(_))));
        assert!(matches!(assign_folds(&train, 3, 0, 0), Err(EvalError::InsufficientData(_))));
        assert!(assign_folds(&train, 3, 1, 0).is_ok());
    }
}
