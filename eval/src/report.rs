// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model comparison table

use crate::metrics::MetricsReport;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: String,
    pub metrics: MetricsReport,
}

/// Per-model metrics in insertion order
///
/// Values keep full precision; only the rendered forms round to four
/// decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(reports: Vec<(String, MetricsReport)>) -> Self {
        let mut table = Self::new();
        for (model, metrics) in reports {
            table.push(model, metrics);
        }
        table
    }

    /// Append a row; a repeated model name replaces its earlier row in place
    pub fn push(&mut self, model: impl Into<String>, metrics: MetricsReport) {
        let model = model.into();
        match self.rows.iter_mut().find(|r| r.model == model) {
            Some(row) => row.metrics = metrics,
            None => self.rows.push(ComparisonRow { model, metrics }),
        }
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, model: &str) -> Option<&MetricsReport> {
        self.rows.iter().find(|r| r.model == model).map(|r| &r.metrics)
    }

    /// Row with the highest test AUC; the earlier row wins ties
    pub fn best_by_auc(&self) -> Option<&ComparisonRow> {
        self.rows.iter().fold(None, |best: Option<&ComparisonRow>, row| match best {
            Some(b) if b.metrics.auc >= row.metrics.auc => Some(b),
            _ => Some(row),
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("| Model | Accuracy | Sensitivity | Specificity | F1 Score | MCC | AUC-ROC |\n");
        md.push_str("|-------|----------|-------------|-------------|----------|-----|---------|\n");
        for row in &self.rows {
            let m = &row.metrics;
            md.push_str(&format!(
                "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} |\n",
                row.model, m.accuracy, m.sensitivity, m.specificity, m.f1, m.mcc, m.auc
            ));
        }
        md
    }

    pub fn to_console(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:-<78}\n", ""));
        out.push_str(&format!(
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "Model", "Accuracy", "Sens", "Spec", "F1", "AUC-ROC"
        ));
        out.push_str(&format!("{:-<78}\n", ""));
        for row in &self.rows {
            let m = &row.metrics;
            out.push_str(&format!(
                "{:<24} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}\n",
                row.model, m.accuracy, m.sensitivity, m.specificity, m.f1, m.auc
            ));
        }
        out.push_str(&format!("{:-<78}\n", ""));
        out
    }
}
