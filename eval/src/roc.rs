// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! ROC analysis and Youden's-J threshold selection
//!
//! Every distinct predicted probability is a candidate threshold, visited
//! in descending order. At threshold `t` a record is predicted positive iff
//! its probability is strictly greater than `t`, which is the same rule
//! [`crate::metrics::evaluate`] applies, so each curve point is exactly the
//! confusion matrix the evaluator reports at that threshold.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// J values closer than this are treated as tied
const TIE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

impl RocPoint {
    /// Youden's J statistic: sensitivity + specificity - 1
    pub fn youden_j(&self) -> f64 {
        self.tpr - self.fpr
    }
}

/// Empirical ROC curve, highest threshold first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

impl RocCurve {
    pub fn from_scores(labels: &[bool], probabilities: &[f64]) -> Result<Self> {
        if labels.len() != probabilities.len() {
            return Err(EvalError::LengthMismatch {
                expected: labels.len(),
                actual: probabilities.len(),
            });
        }

        let n_pos = labels.iter().filter(|&&l| l).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(EvalError::DegenerateLabels {
                positives: n_pos,
                negatives: n_neg,
            });
        }

        let mut pairs: Vec<(f64, bool)> = probabilities.iter().copied().zip(labels.iter().copied()).collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let (pos, neg) = (n_pos as f64, n_neg as f64);
        let mut points = Vec::new();
        let (mut tp, mut fp) = (0usize, 0usize);
        let mut i = 0;

        while i < pairs.len() {
            let threshold = pairs[i].0;
            // Only strictly higher scores are positive at this threshold
            points.push(RocPoint {
                threshold,
                fpr: fp as f64 / neg,
                tpr: tp as f64 / pos,
            });
            while i < pairs.len() && pairs[i].0 == threshold {
                if pairs[i].1 {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }
        }

        let mut auc = 0.0;
        let mut previous = (0.0, 0.0);
        for (fpr, tpr) in points.iter().map(|p| (p.fpr, p.tpr)).chain(std::iter::once((1.0, 1.0))) {
            auc += (fpr - previous.0) * (tpr + previous.1) / 2.0;
            previous = (fpr, tpr);
        }

        Ok(Self { points, auc })
    }
}

/// Chosen operating point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSelection {
    pub threshold: f64,
    pub youden_j: f64,
    pub auc: f64,
    pub curve: RocCurve,
}

/// Pick the threshold that maximizes Youden's J
///
/// Ties go to the first, i.e. highest, candidate threshold.
pub fn select_threshold(labels: &[bool], probabilities: &[f64]) -> Result<ThresholdSelection> {
    let curve = RocCurve::from_scores(labels, probabilities)?;

    let mut best = curve.points[0];
    for point in &curve.points[1..] {
        if point.youden_j() > best.youden_j() + TIE_TOLERANCE {
            best = *point;
        }
    }

    Ok(ThresholdSelection {
        threshold: best.threshold,
        youden_j: best.youden_j(),
        auc: curve.auc,
        curve,
    })
}

/// Area under the ROC curve only
pub fn roc_auc(labels: &[bool], probabilities: &[f64]) -> Result<f64> {
    RocCurve::from_scores(labels, probabilities).map(|c| c.auc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let labels = [true, true, false, false];
        let probs = [0.9, 0.8, 0.2, 0.1];
        let selection = select_threshold(&labels, &probs).unwrap();

        assert!((selection.auc - 1.0).abs() < 1e-12);
        assert!((selection.youden_j - 1.0).abs() < 1e-12);
        // Everything above 0.2 is positive: both positives, no negatives
        assert_eq!(selection.threshold, 0.2);
    }

    #[test]
    fn test_inverted_scores() {
        let labels = [false, false, true, true];
        let probs = [0.9, 0.8, 0.2, 0.1];
        assert!(roc_auc(&labels, &probs).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_auc_matches_pairwise_ranking() {
        let labels = [true, false, true, false, true, false, true];
        let probs = [0.3, 0.7, 0.6, 0.4, 0.5, 0.5, 0.9];

        // Fraction of (pos, neg) pairs ranked correctly, ties counting half
        let mut wins = 0.0;
        let mut total = 0.0;
        for (i, &li) in labels.iter().enumerate() {
            for (j, &lj) in labels.iter().enumerate() {
                if li && !lj {
                    total += 1.0;
                    if probs[i] > probs[j] {
                        wins += 1.0;
                    } else if probs[i] == probs[j] {
                        wins += 0.5;
                    }
                }
            }
        }

        let auc = roc_auc(&labels, &probs).unwrap();
        assert!((auc - wins / total).abs() < 1e-12, "auc {} vs {}", auc, wins / total);
    }

    #[test]
    fn test_constant_scores_give_chance_auc() {
        let labels = [true, false, true, false];
        let selection = select_threshold(&labels, &[0.4; 4]).unwrap();
        assert!((selection.auc - 0.5).abs() < 1e-12);
        assert_eq!(selection.curve.points.len(), 1);
        assert_eq!(selection.threshold, 0.4);
    }

    #[test]
    fn test_curve_is_monotone() {
        let labels: Vec<bool> = (0..50).map(|i| i % 3 == 0).collect();
        let probs: Vec<f64> = (0..50).map(|i| ((i * 37) % 50) as f64 / 50.0).collect();
        let curve = RocCurve::from_scores(&labels, &probs).unwrap();

        assert_eq!(curve.points[0].fpr, 0.0);
        assert_eq!(curve.points[0].tpr, 0.0);
        for pair in curve.points.windows(2) {
            assert!(pair[0].threshold > pair[1].threshold);
            assert!(pair[0].fpr <= pair[1].fpr);
            assert!(pair[0].tpr <= pair[1].tpr);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            select_threshold(&[false, false], &[0.1, 0.2]),
            Err(EvalError::DegenerateLabels { positives: 0, negatives: 2 })
        ));
        assert!(matches!(select_threshold(&[], &[]), Err(EvalError::DegenerateLabels { .. })));
        assert!(matches!(
            roc_auc(&[true, false], &[0.5]),
            Err(EvalError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_youden_tie_prefers_highest_threshold() {
        // J = 2/3 at threshold 0.8 and again at 0.4
        let labels = [true, true, false, true, false, false];
        let probs = [0.9, 0.85, 0.8, 0.6, 0.4, 0.1];
        let selection = select_threshold(&labels, &probs).unwrap();
        assert!((selection.youden_j - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(selection.threshold, 0.8);
    }
}
