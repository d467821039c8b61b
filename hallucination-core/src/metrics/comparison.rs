//! Cross-method, cross-model and before/after comparisons.

use std::collections::BTreeMap;

use crate::error::{ensure_same_len, Result};
use crate::signals::token_set;

use super::classification::{accuracy, hallucination_rate, precision_recall_f1, ratio};
use super::types::{MethodMetrics, MitigationReport, ModelMetrics};

/// Classification metrics for each method's predictions against shared labels.
///
/// Every method must cover every label.
pub fn compare_methods(
    method_predictions: &BTreeMap<String, Vec<bool>>,
    labels: &[bool],
) -> Result<BTreeMap<String, MethodMetrics>> {
    method_predictions
        .iter()
        .map(|(name, predictions)| {
            ensure_same_len(&format!("method '{}'", name), labels.len(), predictions.len())?;
            let metrics = MethodMetrics {
                metrics: precision_recall_f1(predictions, labels)?,
                accuracy: accuracy(predictions, labels)?,
                hallucination_rate: hallucination_rate(predictions),
            };
            Ok((name.clone(), metrics))
        })
        .collect()
}

/// Score each model's raw answers against reference answers.
///
/// Exact match compares trimmed lowercase strings. Token overlap is the share
/// of reference tokens (lowercased, whitespace split) found in the answer,
/// `0.0` for an empty reference.
pub fn model_comparison<R, G>(
    model_responses: &BTreeMap<String, Vec<R>>,
    ground_truths: &[G],
) -> Result<BTreeMap<String, ModelMetrics>>
where
    R: AsRef<str>,
    G: AsRef<str>,
{
    model_responses
        .iter()
        .map(|(model, responses)| {
            ensure_same_len(&format!("model '{}'", model), ground_truths.len(), responses.len())?;

            let mut exact = 0usize;
            let mut overlap_sum = 0.0;
            for (response, truth) in responses.iter().zip(ground_truths) {
                let (response, truth) = (response.as_ref(), truth.as_ref());
                if response.trim().to_lowercase() == truth.trim().to_lowercase() {
                    exact += 1;
                }
                let answer_tokens = token_set(&response.to_lowercase());
                let truth_tokens = token_set(&truth.to_lowercase());
                if !truth_tokens.is_empty() {
                    overlap_sum += answer_tokens.intersection(&truth_tokens).count() as f64
                        / truth_tokens.len() as f64;
                }
            }

            let n = responses.len();
            let exact_match_rate = ratio(exact, n);
            let metrics = ModelMetrics {
                exact_match_rate,
                avg_token_overlap: if n == 0 { 0.0 } else { overlap_sum / n as f64 },
                hallucination_rate: if n == 0 { 0.0 } else { 1.0 - exact_match_rate },
                num_samples: n,
            };
            Ok((model.clone(), metrics))
        })
        .collect()
}

/// Change in hallucination rate between paired baseline and mitigated runs.
///
/// Relative reduction is a percentage of the baseline rate, `0.0` when the
/// baseline never hallucinated. Empty input gives an all-zero report.
pub fn mitigation_effectiveness(baseline: &[bool], mitigated: &[bool]) -> Result<MitigationReport> {
    ensure_same_len("mitigation_effectiveness", baseline.len(), mitigated.len())?;
    if baseline.is_empty() {
        return Ok(MitigationReport::default());
    }

    let baseline_rate = hallucination_rate(baseline);
    let mitigated_rate = hallucination_rate(mitigated);
    let absolute_reduction = baseline_rate - mitigated_rate;
    let relative_reduction_percent = if baseline_rate > 0.0 {
        absolute_reduction / baseline_rate * 100.0
    } else {
        0.0
    };

    let mut improvements = 0;
    let mut degradations = 0;
    for (&before, &after) in baseline.iter().zip(mitigated) {
        match (before, after) {
            (true, false) => improvements += 1,
            (false, true) => degradations += 1,
            _ => {}
        }
    }

    Ok(MitigationReport {
        baseline_hallucination_rate: baseline_rate,
        mitigated_hallucination_rate: mitigated_rate,
        absolute_reduction,
        relative_reduction_percent,
        improvements,
        degradations,
        unchanged: baseline.len() - improvements - degradations,
        net_improvement: improvements as i64 - degradations as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compare_methods() {
        let labels = vec![true, false, true, false];
        let methods = BTreeMap::from([
            ("factual".to_string(), vec![true, false, true, false]),
            ("temporal".to_string(), vec![false, false, false, false]),
        ]);

        let comparison = compare_methods(&methods, &labels).unwrap();

        assert_eq!(comparison["factual"].accuracy, 1.0);
        assert_eq!(comparison["factual"].metrics.f1, 1.0);
        assert_eq!(comparison["temporal"].accuracy, 0.5);
        assert_eq!(comparison["temporal"].hallucination_rate, 0.0);
        assert_eq!(comparison["temporal"].metrics.recall, 0.0);
    }

    #[test]
    fn test_compare_methods_rejects_short_method() {
        let methods = BTreeMap::from([("entity".to_string(), vec![true])]);
        let err = compare_methods(&methods, &[true, false]).unwrap_err();
        assert!(err.to_string().contains("method 'entity'"));
    }

    #[test]
    fn test_model_comparison() {
        let truths = ["Paris", "William Shakespeare"];
        let responses = BTreeMap::from([
            ("gemini".to_string(), vec![" paris ", "It was Shakespeare"]),
            ("groq".to_string(), vec!["Lyon", "william shakespeare"]),
        ]);

        let comparison = model_comparison(&responses, &truths).unwrap();

        let gemini = &comparison["gemini"];
        assert_eq!(gemini.exact_match_rate, 0.5);
        assert_eq!(gemini.hallucination_rate, 0.5);
        // paris: 1.0, shakespeare: 1/2
        assert_eq!(gemini.avg_token_overlap, 0.75);
        assert_eq!(gemini.num_samples, 2);

        let groq = &comparison["groq"];
        assert_eq!(groq.exact_match_rate, 0.5);
        assert_eq!(groq.avg_token_overlap, 0.5);
    }

    #[test]
    fn test_model_comparison_length_mismatch() {
        let responses = BTreeMap::from([("openai".to_string(), vec!["a"])]);
        let err = model_comparison(&responses, &["a", "b"]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }

    #[test]
    fn test_mitigation_identical_runs() {
        let run = [true, false, true, false];
        let report = mitigation_effectiveness(&run, &run).unwrap();

        assert_eq!(report.absolute_reduction, 0.0);
        assert_eq!(report.relative_reduction_percent, 0.0);
        assert_eq!(report.net_improvement, 0);
        assert_eq!(report.unchanged, 4);
    }

    #[test]
    fn test_mitigation_improvement() {
        let baseline = [true, true, true, false];
        let mitigated = [false, true, false, true];

        let report = mitigation_effectiveness(&baseline, &mitigated).unwrap();

        assert_eq!(report.baseline_hallucination_rate, 0.75);
        assert_eq!(report.mitigated_hallucination_rate, 0.5);
        assert_eq!(report.absolute_reduction, 0.25);
        assert!((report.relative_reduction_percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.improvements, 2);
        assert_eq!(report.degradations, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.net_improvement, 1);
    }

    #[test]
    fn test_mitigation_clean_baseline() {
        let report = mitigation_effectiveness(&[false, false], &[true, false]).unwrap();
        assert_eq!(report.relative_reduction_percent, 0.0);
        assert_eq!(report.net_improvement, -1);
    }

    #[test]
    fn test_mitigation_empty() {
        assert_eq!(
            mitigation_effectiveness(&[], &[]).unwrap(),
            MitigationReport::default()
        );
    }
}
