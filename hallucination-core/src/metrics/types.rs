//! Metric records. Every record serializes to the flat JSON shape used in
//! experiment reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detection::Verdict;
use crate::error::{ensure_same_len, Result};

/// Confusion-matrix metrics with hallucination as the positive class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// True positives
    pub tp: usize,
    /// False positives
    pub fp: usize,
    /// False negatives
    #[serde(rename = "fn")]
    pub fn_: usize,
    /// True negatives
    pub tn: usize,
}

impl ClassificationMetrics {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }
}

/// Metrics for samples sharing one hallucination type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMetrics {
    #[serde(flatten)]
    pub metrics: ClassificationMetrics,
    pub accuracy: f64,
    pub count: usize,
}

/// Metrics for one detection method's predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetrics {
    #[serde(flatten)]
    pub metrics: ClassificationMetrics,
    pub accuracy: f64,
    pub hallucination_rate: f64,
}

/// Answer quality of one model against reference answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub exact_match_rate: f64,
    pub avg_token_overlap: f64,
    /// `1 - exact_match_rate`
    pub hallucination_rate: f64,
    pub num_samples: usize,
}

/// Before/after comparison of a mitigation technique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MitigationReport {
    pub baseline_hallucination_rate: f64,
    pub mitigated_hallucination_rate: f64,
    pub absolute_reduction: f64,
    pub relative_reduction_percent: f64,
    /// Hallucinated before, clean after
    pub improvements: usize,
    /// Clean before, hallucinated after
    pub degradations: usize,
    pub unchanged: usize,
    /// `improvements - degradations`
    pub net_improvement: i64,
}

/// One occupied confidence bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bin: usize,
    /// `[lo, hi)`; the last bin is closed
    pub range: (f64, f64),
    pub avg_confidence: f64,
    pub accuracy: f64,
    pub count: usize,
    /// `|avg_confidence - accuracy|`
    pub gap: f64,
}

/// Expected calibration error with its per-bin breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub ece: f64,
    /// Non-empty bins only, in bin order
    pub bins: Vec<CalibrationBin>,
    pub num_bins: usize,
}

/// Parallel sequences of predictions and labels with optional side data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledBatch {
    /// Detector output, `true` = hallucination
    pub predictions: Vec<bool>,
    /// Ground-truth labels, `true` = hallucination
    pub labels: Vec<bool>,
    /// Confidence of each prediction
    #[serde(default)]
    pub confidences: Option<Vec<f64>>,
    /// Type tag of each sample
    #[serde(default)]
    pub types: Option<Vec<String>>,
    /// Alternate predictions keyed by method name
    #[serde(default)]
    pub method_predictions: BTreeMap<String, Vec<bool>>,
}

impl LabeledBatch {
    pub fn new(predictions: Vec<bool>, labels: Vec<bool>) -> Self {
        Self {
            predictions,
            labels,
            ..Self::default()
        }
    }

    /// Predictions, confidences and types taken from verdicts.
    ///
    /// Verdicts without a type are tagged `"none"`.
    pub fn from_verdicts(verdicts: &[Verdict], labels: Vec<bool>) -> Result<Self> {
        ensure_same_len("from_verdicts", verdicts.len(), labels.len())?;
        Ok(Self {
            predictions: verdicts.iter().map(Verdict::is_hallucination).collect(),
            labels,
            confidences: Some(verdicts.iter().map(Verdict::confidence).collect()),
            types: Some(
                verdicts
                    .iter()
                    .map(|v| {
                        v.hallucination_type()
                            .map_or_else(|| "none".to_string(), |t| t.to_string())
                    })
                    .collect(),
            ),
            method_predictions: BTreeMap::new(),
        })
    }

    pub fn with_confidences(mut self, confidences: Vec<f64>) -> Self {
        self.confidences = Some(confidences);
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, predictions: Vec<bool>) -> Self {
        self.method_predictions.insert(name.into(), predictions);
        self
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Whether each prediction agrees with its label.
    pub fn correctness(&self) -> Vec<bool> {
        self.predictions
            .iter()
            .zip(&self.labels)
            .map(|(p, l)| p == l)
            .collect()
    }

    /// Fail unless every supplied sequence matches `predictions` in length.
    pub fn validate(&self) -> Result<()> {
        let n = self.predictions.len();
        ensure_same_len("labels", n, self.labels.len())?;
        if let Some(confidences) = &self.confidences {
            ensure_same_len("confidences", n, confidences.len())?;
        }
        if let Some(types) = &self.types {
            ensure_same_len("types", n, types.len())?;
        }
        for (name, predictions) in &self.method_predictions {
            ensure_same_len(&format!("method '{}'", name), n, predictions.len())?;
        }
        Ok(())
    }
}

/// Everything [`evaluate`](super::evaluate) computes for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub num_samples: usize,
    pub accuracy: f64,
    pub hallucination_rate: f64,
    pub classification: ClassificationMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_type: Option<BTreeMap<String, TypeMetrics>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_method: Option<BTreeMap<String, MethodMetrics>>,
}
