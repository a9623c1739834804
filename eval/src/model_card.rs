// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model Card generation for selected models
//!
//! Follows the structure of Mitchell et al. (2019) "Model Cards for Model
//! Reporting", trimmed to what a cross-validated tabular classifier can
//! state about itself:
//! - Model details and intended use
//! - Training procedure and chosen hyperparameters
//! - Decision threshold and test metrics
//! - Caveats and recommendations

use crate::grid::ParamSet;
use crate::metrics::{ConfusionMatrix, MetricsReport};
use crate::roc::{RocCurve, RocPoint};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Always listed: the threshold is tuned on the same data it is scored on
pub const THRESHOLD_BIAS_CAVEAT: &str = "The decision threshold is chosen by Youden's J on the test-set ROC curve and then scored on that same test set, so reported accuracy, sensitivity, specificity and F1 carry a mild optimistic bias; AUC is unaffected";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub model_details: ModelDetails,
    pub intended_use: IntendedUse,
    pub training: TrainingProcedure,
    pub metrics: MetricsSection,
    pub data: DataSection,
    pub caveats_and_recommendations: CaveatsAndRecommendations,
    pub card_metadata: CardMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetails {
    pub name: String,
    pub version: String,
    /// Classifier family
    pub model_type: String,
    pub description: String,
    pub organization: String,
    pub license: String,
    pub date: DateTime<Utc>,
    pub framework: String,
}

impl Default for ModelDetails {
    fn default() -> Self {
        Self {
            name: "Unnamed Model".to_string(),
            version: "0.1.0".to_string(),
            model_type: "Unknown".to_string(),
            description: String::new(),
            organization: String::new(),
            license: "AGPL-3.0-or-later".to_string(),
            date: Utc::now(),
            framework: "Rust".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntendedUse {
    pub primary_uses: Vec<String>,
    pub out_of_scope_uses: Vec<String>,
}

impl Default for IntendedUse {
    fn default() -> Self {
        Self {
            primary_uses: vec![
                "Estimating the probability that a claim is true to prioritise human fact-checking".to_string(),
                "Comparing classifier families on engineered claim features".to_string(),
            ],
            out_of_scope_uses: vec![
                "Automated truth verdicts or content removal without human review".to_string(),
                "Feature tables built with a different schema or preprocessing".to_string(),
            ],
        }
    }
}

/// How the model was selected and fitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingProcedure {
    pub train_fraction: f64,
    pub folds: usize,
    pub repeats: usize,
    pub seed: u64,
    pub grid_size: usize,
    pub excluded_candidates: usize,
    pub hyperparameters: Option<ParamSet>,
    /// Mean held-out AUC of the chosen grid point
    pub cv_auc: f64,
    pub cv_auc_std: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSection {
    pub performance: Option<MetricsReport>,
    pub confusion_matrix: Option<ConfusionMatrix>,
    pub thresholds: Vec<ThresholdInfo>,
    /// Test-set ROC points, highest threshold first
    #[serde(default)]
    pub roc_curve: Vec<RocPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdInfo {
    pub name: String,
    pub value: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSection {
    pub dataset: String,
    pub training_size: Option<usize>,
    pub evaluation_size: Option<usize>,
    /// (feature, weight) pairs; coefficients or importances depending on family
    pub feature_weights: Vec<(String, f64)>,
    pub preprocessing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaveatsAndRecommendations {
    pub caveats: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for CaveatsAndRecommendations {
    fn default() -> Self {
        Self {
            caveats: vec![THRESHOLD_BIAS_CAVEAT.to_string()],
            recommendations: vec![
                "Confirm the threshold on a separate validation split before deployment".to_string(),
                "Re-run the evaluation when the upstream feature pipeline changes".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardMetadata {
    pub schema_version: String,
    pub created: DateTime<Utc>,
}

impl Default for CardMetadata {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
            created: Utc::now(),
        }
    }
}

impl ModelCard {
    pub fn new(name: &str, version: &str, model_type: &str) -> Self {
        Self {
            model_details: ModelDetails {
                name: name.to_string(),
                version: version.to_string(),
                model_type: model_type.to_string(),
                ..Default::default()
            },
            intended_use: IntendedUse::default(),
            training: TrainingProcedure::default(),
            metrics: MetricsSection::default(),
            data: DataSection {
                preprocessing: vec![
                    "Stratified train/test split".to_string(),
                    "Z-score standardization fitted on the training partition only".to_string(),
                ],
                ..Default::default()
            },
            caveats_and_recommendations: CaveatsAndRecommendations::default(),
            card_metadata: CardMetadata::default(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Model Card: {}\n\n", self.model_details.name));

        md.push_str("## Model Details\n\n");
        md.push_str(&format!("- **Version:** {}\n", self.model_details.version));
        md.push_str(&format!("- **Type:** {}\n", self.model_details.model_type));
        md.push_str(&format!("- **Framework:** {}\n", self.model_details.framework));
        md.push_str(&format!("- **License:** {}\n", self.model_details.license));
        md.push_str(&format!("- **Date:** {}\n", self.model_details.date.format("%Y-%m-%d")));
        if !self.model_details.organization.is_empty() {
            md.push_str(&format!("- **Organization:** {}\n", self.model_details.organization));
        }
        if !self.model_details.description.is_empty() {
            md.push_str(&format!("\n{}\n", self.model_details.description));
        }
        md.push('\n');

        md.push_str("## Intended Use\n\n");
        for use_case in &self.intended_use.primary_uses {
            md.push_str(&format!("- {}\n", use_case));
        }
        md.push_str("\n**Out of scope:**\n\n");
        for oos in &self.intended_use.out_of_scope_uses {
            md.push_str(&format!("- {}\n", oos));
        }
        md.push('\n');

        let t = &self.training;
        md.push_str("## Training Procedure\n\n");
        md.push_str(&format!("- **Train fraction:** {}\n", t.train_fraction));
        md.push_str(&format!(
            "- **Cross-validation:** {} folds x {} repeats (seed {})\n",
            t.folds, t.repeats, t.seed
        ));
        md.push_str(&format!(
            "- **Grid:** {} candidates, {} excluded\n",
            t.grid_size, t.excluded_candidates
        ));
        if let Some(ref params) = t.hyperparameters {
            md.push_str(&format!("- **Chosen hyperparameters:** {}\n", params));
        }
        md.push_str(&format!("- **CV AUC:** {:.4} ± {:.4}\n\n", t.cv_auc, t.cv_auc_std));

        md.push_str("## Performance Metrics\n\n");
        if let Some(ref m) = self.metrics.performance {
            md.push_str("| Metric | Value |\n");
            md.push_str("|--------|-------|\n");
            md.push_str(&format!("| Accuracy | {:.4} |\n", m.accuracy));
            md.push_str(&format!("| Sensitivity | {:.4} |\n", m.sensitivity));
            md.push_str(&format!("| Specificity | {:.4} |\n", m.specificity));
            md.push_str(&format!("| Precision | {:.4} |\n", m.precision));
            md.push_str(&format!("| F1 Score | {:.4} |\n", m.f1));
            md.push_str(&format!("| MCC | {:.4} |\n", m.mcc));
            md.push_str(&format!("| AUC-ROC | {:.4} |\n", m.auc));
            md.push('\n');
        }
        if let Some(ref cm) = self.metrics.confusion_matrix {
            md.push_str(&format!(
                "Confusion matrix: TP={} FP={} TN={} FN={}\n\n",
                cm.tp, cm.fp, cm.tn, cm.fn_
            ));
        }
        for threshold in &self.metrics.thresholds {
            md.push_str(&format!(
                "- **{}:** {:.6} ({})\n",
                threshold.name, threshold.value, threshold.description
            ));
        }
        md.push('\n');

        if !self.metrics.roc_curve.is_empty() {
            md.push_str("### ROC Curve\n\n");
            md.push_str("| Threshold | FPR | TPR |\n");
            md.push_str("|-----------|-----|-----|\n");
            for point in &self.metrics.roc_curve {
                md.push_str(&format!("| {:.6} | {:.4} | {:.4} |\n", point.threshold, point.fpr, point.tpr));
            }
            md.push('\n');
        }

        md.push_str("## Data\n\n");
        if !self.data.dataset.is_empty() {
            md.push_str(&format!("**Dataset:** {}\n\n", self.data.dataset));
        }
        if let (Some(train), Some(test)) = (self.data.training_size, self.data.evaluation_size) {
            md.push_str(&format!("**Size:** {} train / {} test\n\n", train, test));
        }
        for step in &self.data.preprocessing {
            md.push_str(&format!("- {}\n", step));
        }
        if !self.data.feature_weights.is_empty() {
            md.push_str("\n| Feature | Weight |\n");
            md.push_str("|---------|--------|\n");
            for (feature, weight) in &self.data.feature_weights {
                md.push_str(&format!("| {} | {:.4} |\n", feature, weight));
            }
        }
        md.push('\n');

        md.push_str("## Caveats and Recommendations\n\n");
        for caveat in &self.caveats_and_recommendations.caveats {
            md.push_str(&format!("- {}\n", caveat));
        }
        md.push_str("\n### Recommendations\n\n");
        for rec in &self.caveats_and_recommendations.recommendations {
            md.push_str(&format!("- {}\n", rec));
        }
        md.push('\n');

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Model Card generated on {} (schema v{})*\n",
            self.card_metadata.created.format("%Y-%m-%d"),
            self.card_metadata.schema_version
        ));

        md
    }

    /// Save model card to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_markdown())
            .with_context(|| format!("writing model card {}", path.display()))?;
        Ok(())
    }

    /// Save as JSON
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing model card {}", path.display()))?;
        Ok(())
    }
}

/// Builder for creating model cards
pub struct ModelCardBuilder {
    card: ModelCard,
}

impl ModelCardBuilder {
    pub fn new(name: &str, version: &str, model_type: &str) -> Self {
        Self {
            card: ModelCard::new(name, version, model_type),
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.card.model_details.description = desc.to_string();
        self
    }

    pub fn organization(mut self, org: &str) -> Self {
        self.card.model_details.organization = org.to_string();
        self
    }

    pub fn training(mut self, training: TrainingProcedure) -> Self {
        self.card.training = training;
        self
    }

    pub fn metrics(mut self, report: MetricsReport, cm: ConfusionMatrix) -> Self {
        self.card.metrics.performance = Some(report);
        self.card.metrics.confusion_matrix = Some(cm);
        self
    }

    pub fn threshold(mut self, value: f64, youden_j: f64) -> Self {
        self.card.metrics.thresholds.push(ThresholdInfo {
            name: "Decision threshold".to_string(),
            value,
            description: format!("positive iff probability > threshold; Youden's J = {:.4}", youden_j),
        });
        self
    }

    pub fn roc_curve(mut self, curve: &RocCurve) -> Self {
        self.card.metrics.roc_curve = curve.points.clone();
        self
    }

    pub fn dataset(mut self, name: &str, train_size: usize, test_size: usize) -> Self {
        self.card.data.dataset = name.to_string();
        self.card.data.training_size = Some(train_size);
        self.card.data.evaluation_size = Some(test_size);
        self
    }

    pub fn feature_weights(mut self, weights: Vec<(String, f64)>) -> Self {
        self.card.data.feature_weights = weights;
        self
    }

    pub fn add_caveat(mut self, caveat: &str) -> Self {
        self.card.caveats_and_recommendations.caveats.push(caveat.to_string());
        self
    }

    pub fn build(self) -> ModelCard {
        self.card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ParamValue;

    #[test]
    fn test_model_card_builder() {
        let cm = ConfusionMatrix {
            tp: 17,
            tn: 11,
            fp: 1,
            fn_: 1,
        };
        let report = MetricsReport::from_confusion_matrix(&cm, 0.98);
        let card = ModelCardBuilder::new("Elastic-Net LR", "0.1.0", "elastic-net")
            .description("Selected by repeated stratified CV")
            .training(TrainingProcedure {
                folds: 5,
                repeats: 3,
                grid_size: 60,
                hyperparameters: Some(ParamSet::new(vec![("mixing".to_string(), ParamValue::Float(0.5))])),
                ..Default::default()
            })
            .metrics(report, cm)
            .threshold(0.42, 0.9)
            .dataset("claims.csv", 70, 30)
            .build();

        assert_eq!(card.model_details.name, "Elastic-Net LR");
        assert_eq!(card.training.grid_size, 60);
        assert_eq!(card.metrics.thresholds.len(), 1);
        assert_eq!(card.data.training_size, Some(70));
    }

    #[test]
    fn test_card_lists_roc_points() {
        let labels = [true, false, true, false];
        let curve = RocCurve::from_scores(&labels, &[0.9, 0.6, 0.4, 0.2]).unwrap();
        let card = ModelCardBuilder::new("lr", "0.1.0", "elastic-net").roc_curve(&curve).build();

        assert_eq!(card.metrics.roc_curve, curve.points);
        let md = card.to_markdown();
        assert!(md.contains("### ROC Curve"));
        assert!(md.contains("| 0.600000 |"));

        let json = serde_json::to_string(&card).unwrap();
        let back: ModelCard = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metrics.roc_curve.len(), curve.points.len());
    }

    #[test]
    fn test_markdown_always_states_threshold_bias() {
        let card = ModelCard::new("Gradient-Boosted Trees", "0.1.0", "gradient-boosting");
        let md = card.to_markdown();

        assert!(md.contains("# Model Card: Gradient-Boosted Trees"));
        assert!(md.contains("## Training Procedure"));
        assert!(md.contains("optimistic bias"));
    }

    #[test]
    fn test_save_writes_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let card = ModelCardBuilder::new("lr", "0.1.0", "elastic-net").add_caveat("small sample").build();

        card.save(&dir.path().join("card.md")).unwrap();
        card.save_json(&dir.path().join("card.json")).unwrap();

        let json = std::fs::read_to_string(dir.path().join("card.json")).unwrap();
        let back: ModelCard = serde_json::from_str(&json).unwrap();
        assert_eq!(back.caveats_and_recommendations.caveats.len(), 2);
    }
}
