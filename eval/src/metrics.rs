// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for binary classification
//!
//! Implements standard ML metrics:
//! - Confusion Matrix
//! - Accuracy, Sensitivity, Specificity, Precision, F1-Score
//! - Balanced accuracy and Matthews Correlation Coefficient (MCC)
//! - AUC-ROC carried over from the threshold selection curve

use crate::error::{EvalError, Result};
use crate::roc::RocCurve;
use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True claims predicted true
    pub tp: usize,
    /// False claims predicted false
    pub tn: usize,
    /// False claims predicted true
    pub fp: usize,
    /// True claims predicted false
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Count outcomes, predicting positive iff `probability > threshold`
    pub fn at_threshold(labels: &[bool], probabilities: &[f64], threshold: f64) -> Result<Self> {
        if labels.len() != probabilities.len() {
            return Err(EvalError::LengthMismatch {
                expected: labels.len(),
                actual: probabilities.len(),
            });
        }

        let mut matrix = Self::default();
        for (&truth, &p) in labels.iter().zip(probabilities) {
            match (p > threshold, truth) {
                (true, true) => matrix.tp += 1,
                (false, false) => matrix.tn += 1,
                (true, false) => matrix.fp += 1,
                (false, true) => matrix.fn_ += 1,
            }
        }
        Ok(matrix)
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Sensitivity (recall): TP / (TP + FN)
    pub fn sensitivity(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    /// F1 Score: 2 * (Precision * Sensitivity) / (Precision + Sensitivity)
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.sensitivity();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }

    /// Matthews Correlation Coefficient, from -1 to 1
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;

        let numerator = tp * tn - fp * fn_;
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

        if denominator == 0.0 {
            return 0.0;
        }
        numerator / denominator
    }

    /// Balanced Accuracy: (Sensitivity + Specificity) / 2
    pub fn balanced_accuracy(&self) -> f64 {
        (self.sensitivity() + self.specificity()) / 2.0
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Test-set metrics of one model at its chosen threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub f1: f64,
    pub balanced_accuracy: f64,
    pub mcc: f64,
    pub auc: f64,
}

impl MetricsReport {
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, auc: f64) -> Self {
        Self {
            accuracy: cm.accuracy(),
            sensitivity: cm.sensitivity(),
            specificity: cm.specificity(),
            precision: cm.precision(),
            f1: cm.f1_score(),
            balanced_accuracy: cm.balanced_accuracy(),
            mcc: cm.mcc(),
            auc,
        }
    }

    /// Format as a human-readable block
    pub fn format(&self, cm: &ConfusionMatrix) -> String {
        format!(
            r#"Accuracy:          {:.4} ({:.2}%)
Balanced Accuracy: {:.4}
Sensitivity:       {:.4}
Specificity:       {:.4}
Precision:         {:.4}
F1 Score:          {:.4}
MCC:               {:.4}
AUC-ROC:           {:.4}

Confusion Matrix:
                  Predicted
                  False     True
Actual False     {:>6}    {:>6}
       True      {:>6}    {:>6}
"#,
            self.accuracy,
            self.accuracy * 100.0,
            self.balanced_accuracy,
            self.sensitivity,
            self.specificity,
            self.precision,
            self.f1,
            self.mcc,
            self.auc,
            cm.tn,
            cm.fp,
            cm.fn_,
            cm.tp,
        )
    }
}

/// Score `probabilities` against `labels` at `threshold`
///
/// AUC is taken from `curve`, which must come from the same predictions.
pub fn evaluate(
    labels: &[bool],
    probabilities: &[f64],
    threshold: f64,
    curve: &RocCurve,
) -> Result<(ConfusionMatrix, MetricsReport)> {
    let cm = ConfusionMatrix::at_threshold(labels, probabilities, threshold)?;
    let report = MetricsReport::from_confusion_matrix(&cm, curve.auc);
    Ok((cm, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roc::select_threshold;

    #[test]
    fn test_confusion_matrix_perfect() {
        let labels = [true, true, false, false];
        let cm = ConfusionMatrix::at_threshold(&labels, &[0.9, 0.8, 0.2, 0.1], 0.5).unwrap();

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (2, 2, 0, 0));
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!((cm.f1_score() - 1.0).abs() < 1e-6);
        assert!((cm.mcc() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_confusion_matrix_worst() {
        let labels = [true, true, false, false];
        let cm = ConfusionMatrix::at_threshold(&labels, &[0.1, 0.2, 0.8, 0.9], 0.5).unwrap();

        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (0, 0, 2, 2));
        assert!(cm.accuracy().abs() < 1e-6);
        assert!((cm.mcc() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let labels = [true, false];
        let cm = ConfusionMatrix::at_threshold(&labels, &[0.5, 0.5], 0.5).unwrap();
        assert_eq!((cm.tp, cm.fp), (0, 0));
        assert_eq!((cm.fn_, cm.tn), (1, 1));
    }

    #[test]
    fn test_zero_denominators() {
        // Nothing predicted positive
        let cm = ConfusionMatrix::at_threshold(&[true, false, false], &[0.1, 0.1, 0.1], 0.5).unwrap();
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
        assert_eq!(cm.mcc(), 0.0);
        assert_eq!(cm.specificity(), 1.0);
        assert_eq!(ConfusionMatrix::default().accuracy(), 0.0);
    }

    #[test]
    fn test_evaluate_matches_curve_point() {
        let labels = [true, false, true, true, false, false, true, false];
        let probs = [0.8, 0.7, 0.65, 0.4, 0.35, 0.2, 0.9, 0.6];
        let selection = select_threshold(&labels, &probs).unwrap();
        let (cm, report) = evaluate(&labels, &probs, selection.threshold, &selection.curve).unwrap();

        assert_eq!(cm.total(), labels.len());
        let point = selection
            .curve
            .points
            .iter()
            .find(|p| p.threshold == selection.threshold)
            .unwrap();
        assert!((report.sensitivity - point.tpr).abs() < 1e-12);
        assert!((1.0 - report.specificity - point.fpr).abs() < 1e-12);
        assert_eq!(report.auc, selection.auc);
    }

    #[test]
    fn test_report_format() {
        let cm = ConfusionMatrix {
            tp: 3,
            tn: 4,
            fp: 1,
            fn_: 2,
        };
        let formatted = MetricsReport::from_confusion_matrix(&cm, 0.8).format(&cm);
        assert!(formatted.contains("Accuracy"));
        assert!(formatted.contains("Confusion Matrix"));
        assert!(formatted.contains("0.8000"));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            ConfusionMatrix::at_threshold(&[true], &[0.1, 0.2], 0.5),
            Err(EvalError::LengthMismatch { .. })
        ));
    }
}
