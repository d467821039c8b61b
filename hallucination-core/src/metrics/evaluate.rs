//! One-call evaluation of a labeled batch.

use tracing::debug;

use crate::error::Result;

use super::calibration::{confidence_calibration, DEFAULT_NUM_BINS};
use super::classification::{
    accuracy, error_analysis_by_type, hallucination_rate, precision_recall_f1,
};
use super::comparison::compare_methods;
use super::types::{EvaluationReport, LabeledBatch};

/// Compute every metric the batch has data for.
///
/// Calibration needs confidences, the per-type breakdown needs type tags and
/// the method comparison needs alternate predictions; each section is `None`
/// otherwise. Calibration scores each confidence against whether its
/// prediction matched the label.
pub fn evaluate(batch: &LabeledBatch) -> Result<EvaluationReport> {
    batch.validate()?;
    debug!(samples = batch.len(), "Evaluating labeled batch");

    let calibration = batch
        .confidences
        .as_deref()
        .map(|confidences| {
            confidence_calibration(confidences, &batch.correctness(), DEFAULT_NUM_BINS)
        })
        .transpose()?;

    let by_type = batch
        .types
        .as_deref()
        .map(|types| error_analysis_by_type(&batch.predictions, &batch.labels, types))
        .transpose()?;

    let by_method = if batch.method_predictions.is_empty() {
        None
    } else {
        Some(compare_methods(&batch.method_predictions, &batch.labels)?)
    };

    Ok(EvaluationReport {
        num_samples: batch.len(),
        accuracy: accuracy(&batch.predictions, &batch.labels)?,
        hallucination_rate: hallucination_rate(&batch.predictions),
        classification: precision_recall_f1(&batch.predictions, &batch.labels)?,
        calibration,
        by_type,
        by_method,
    })
}
