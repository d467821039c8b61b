//! Confidence calibration and expected calibration error.

use crate::error::{ensure_same_len, Error, Result};

use super::types::{CalibrationBin, CalibrationReport};

/// Default number of equal-width confidence bins.
pub const DEFAULT_NUM_BINS: usize = 10;

/// Bin edges `i / num_bins`, with the last edge pinned to exactly 1.0.
fn bin_edges(num_bins: usize) -> Vec<f64> {
    let step = 1.0 / num_bins as f64;
    let mut edges: Vec<f64> = (0..=num_bins).map(|i| i as f64 * step).collect();
    edges[num_bins] = 1.0;
    edges
}

/// Index of the bin holding `confidence`.
///
/// Bins are half-open `[lo, hi)`; values at or beyond the last lower edge
/// fall into the final bin and values below 0 into the first.
fn bin_index(confidence: f64, edges: &[f64], num_bins: usize) -> usize {
    let above = edges[..num_bins]
        .iter()
        .take_while(|&&edge| edge <= confidence)
        .count();
    above.saturating_sub(1).min(num_bins - 1)
}

/// Per-bin mean confidence and accuracy, and the count-weighted expected
/// calibration error over non-empty bins.
///
/// `correct[i]` says whether the prediction made with `confidences[i]` was
/// right. Empty input gives an ECE of 0 and no bins.
pub fn confidence_calibration(
    confidences: &[f64],
    correct: &[bool],
    num_bins: usize,
) -> Result<CalibrationReport> {
    ensure_same_len("confidence_calibration", confidences.len(), correct.len())?;
    if num_bins == 0 {
        return Err(Error::invalid_input("num_bins must be positive"));
    }
    if confidences.is_empty() {
        return Ok(CalibrationReport {
            ece: 0.0,
            bins: Vec::new(),
            num_bins,
        });
    }

    let edges = bin_edges(num_bins);
    // (confidence sum, correct count, sample count) per bin
    let mut sums = vec![(0.0f64, 0usize, 0usize); num_bins];
    for (&confidence, &is_correct) in confidences.iter().zip(correct) {
        let slot = &mut sums[bin_index(confidence, &edges, num_bins)];
        slot.0 += confidence;
        slot.1 += usize::from(is_correct);
        slot.2 += 1;
    }

    let total = confidences.len() as f64;
    let mut ece = 0.0;
    let mut bins = Vec::new();
    for (i, &(confidence_sum, correct_count, count)) in sums.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let avg_confidence = confidence_sum / count as f64;
        let accuracy = correct_count as f64 / count as f64;
        let gap = (avg_confidence - accuracy).abs();
        ece += (count as f64 / total) * gap;

        bins.push(CalibrationBin {
            bin: i,
            range: (edges[i], edges[i + 1]),
            avg_confidence,
            accuracy,
            count,
            gap,
        });
    }

    Ok(CalibrationReport { ece, bins, num_bins })
}
