//! Confusion-matrix metrics.

use std::collections::BTreeMap;

use crate::error::{ensure_same_len, Result};

use super::types::{ClassificationMetrics, TypeMetrics};

/// Share of predictions equal to their label. Empty input scores `0.0`.
pub fn accuracy(predictions: &[bool], labels: &[bool]) -> Result<f64> {
    ensure_same_len("accuracy", predictions.len(), labels.len())?;
    if predictions.is_empty() {
        return Ok(0.0);
    }
    let correct = predictions.iter().zip(labels).filter(|(p, l)| p == l).count();
    Ok(correct as f64 / predictions.len() as f64)
}

/// Precision, recall and F1 with hallucination (`true`) as the positive class.
///
/// A zero denominator yields `0.0` for the affected ratio.
pub fn precision_recall_f1(predictions: &[bool], labels: &[bool]) -> Result<ClassificationMetrics> {
    ensure_same_len("precision_recall_f1", predictions.len(), labels.len())?;

    let mut m = ClassificationMetrics::default();
    for (&p, &l) in predictions.iter().zip(labels) {
        match (p, l) {
            (true, true) => m.tp += 1,
            (true, false) => m.fp += 1,
            (false, true) => m.fn_ += 1,
            (false, false) => m.tn += 1,
        }
    }

    m.precision = ratio(m.tp, m.tp + m.fp);
    m.recall = ratio(m.tp, m.tp + m.fn_);
    m.f1 = if m.precision + m.recall > 0.0 {
        2.0 * m.precision * m.recall / (m.precision + m.recall)
    } else {
        0.0
    };
    Ok(m)
}

/// Share of `true` predictions. Empty input scores `0.0`.
pub fn hallucination_rate(predictions: &[bool]) -> f64 {
    ratio(predictions.iter().filter(|&&p| p).count(), predictions.len())
}

/// Classification metrics per type tag.
pub fn error_analysis_by_type<S: AsRef<str>>(
    predictions: &[bool],
    labels: &[bool],
    types: &[S],
) -> Result<BTreeMap<String, TypeMetrics>> {
    ensure_same_len("error_analysis_by_type", predictions.len(), labels.len())?;
    ensure_same_len("error_analysis_by_type", predictions.len(), types.len())?;

    let mut groups: BTreeMap<&str, (Vec<bool>, Vec<bool>)> = BTreeMap::new();
    for ((&p, &l), t) in predictions.iter().zip(labels).zip(types) {
        let (preds, truth) = groups.entry(t.as_ref()).or_default();
        preds.push(p);
        truth.push(l);
    }

    groups
        .into_iter()
        .map(|(kind, (preds, truth))| {
            let metrics = TypeMetrics {
                metrics: precision_recall_f1(&preds, &truth)?,
                accuracy: accuracy(&preds, &truth)?,
                count: preds.len(),
            };
            Ok((kind.to_string(), metrics))
        })
        .collect()
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
