//! Multi-method dispatch and majority-vote aggregation.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use super::detector::HallucinationDetector;
use super::types::{AggregateVerdict, DetectionMethod, GenerationSample, HallucinationType, Verdict};

/// Methods run when the caller does not choose: self-consistency,
/// contradiction and temporal checks, plus factual verification when the
/// sample has ground truth.
pub fn default_methods(sample: &GenerationSample) -> Vec<DetectionMethod> {
    let mut methods = vec![
        DetectionMethod::SelfConsistency,
        DetectionMethod::ContradictionDetection,
        DetectionMethod::TemporalVerification,
    ];
    if sample.ground_truth().is_some() {
        methods.push(DetectionMethod::FactualVerification);
    }
    methods
}

impl HallucinationDetector {
    /// Run `methods` (or [`default_methods`]) against one sample.
    ///
    /// Factual verification is skipped without ground truth and entity
    /// verification without expected entities, even when requested.
    /// Self-consistency resamples the sample's prompt; every other method
    /// inspects the response text.
    #[instrument(skip(self, methods, sample))]
    pub async fn run(
        &self,
        methods: Option<&[DetectionMethod]>,
        sample: &GenerationSample,
    ) -> BTreeMap<DetectionMethod, Verdict> {
        let methods = match methods {
            Some(methods) => methods.to_vec(),
            None => default_methods(sample),
        };

        let mut results = BTreeMap::new();
        for method in methods {
            if results.contains_key(&method) {
                continue;
            }
            let verdict = match method {
                DetectionMethod::SelfConsistency => {
                    Some(self.detect_self_consistency(&sample.prompt).await)
                }
                DetectionMethod::FactualVerification => sample
                    .ground_truth()
                    .map(|truth| self.detect_factual_error(&sample.response_text, truth)),
                DetectionMethod::ContradictionDetection => {
                    Some(self.detect_contradiction(&sample.response_text).await)
                }
                DetectionMethod::EntityVerification => (!sample.expected_entities.is_empty())
                    .then(|| {
                        self.detect_entity_hallucination(
                            &sample.response_text,
                            &sample.expected_entities,
                        )
                    }),
                DetectionMethod::TemporalVerification => {
                    Some(self.detect_temporal_error(&sample.response_text, sample.context_year))
                }
            };

            match verdict {
                Some(verdict) => {
                    debug!(
                        method = %method,
                        is_hallucination = verdict.is_hallucination(),
                        "Method finished"
                    );
                    results.insert(method, verdict);
                }
                None => debug!(method = %method, "Skipped, sample lacks required input"),
            }
        }
        results
    }

    /// [`run`](Self::run) followed by [`aggregate`].
    pub async fn detect(
        &self,
        methods: Option<&[DetectionMethod]>,
        sample: &GenerationSample,
    ) -> (AggregateVerdict, BTreeMap<DetectionMethod, Verdict>) {
        let results = self.run(methods, sample).await;
        let verdict = aggregate(results.values());
        info!(verdict = %verdict, "Detection complete");
        (verdict, results)
    }
}

/// Fold method verdicts into one by strict majority vote.
///
/// Ties favour "not hallucination". Confidence is the mean over
/// hallucination-voting verdicts only (0.0 if none). The primary type is the
/// most frequent type among those verdicts, first seen winning ties, and
/// [`HallucinationType::Unknown`] when none carries a type.
pub fn aggregate<'a, I>(verdicts: I) -> AggregateVerdict
where
    I: IntoIterator<Item = &'a Verdict>,
{
    let verdicts: Vec<&Verdict> = verdicts.into_iter().collect();
    if verdicts.is_empty() {
        return AggregateVerdict::empty();
    }

    let voting: Vec<&Verdict> = verdicts.iter().copied().filter(|v| v.is_hallucination()).collect();
    let total_methods = verdicts.len();
    let hallucination_votes = voting.len();

    let confidence = if voting.is_empty() {
        0.0
    } else {
        voting.iter().map(|v| v.confidence()).sum::<f64>() / voting.len() as f64
    };

    // Insertion-ordered tally so ties resolve to the first type seen.
    let mut tally: Vec<(HallucinationType, usize)> = Vec::new();
    for kind in voting.iter().filter_map(|v| v.hallucination_type()) {
        match tally.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, count)) => *count += 1,
            None => tally.push((kind, 1)),
        }
    }
    let mut primary_type = HallucinationType::Unknown;
    let mut best = 0;
    for (kind, count) in tally {
        if count > best {
            primary_type = kind;
            best = count;
        }
    }

    AggregateVerdict {
        is_hallucination: hallucination_votes * 2 > total_methods,
        confidence,
        primary_type,
        hallucination_votes,
        total_methods,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detector::tests::ScriptedGenerator;
    use crate::detection::types::DetectorConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn flagged(method: DetectionMethod, kind: HallucinationType, confidence: f64) -> Verdict {
        Verdict::flagged(method, kind, confidence)
    }

    #[test]
    fn test_aggregate_majority() {
        let verdicts = [
            flagged(DetectionMethod::SelfConsistency, HallucinationType::Inconsistency, 0.8),
            flagged(DetectionMethod::TemporalVerification, HallucinationType::TemporalError, 0.9),
            Verdict::clean(DetectionMethod::ContradictionDetection, 0.7),
        ];

        let result = aggregate(&verdicts);

        assert!(result.is_hallucination);
        assert_eq!(result.hallucination_votes, 2);
        assert_eq!(result.total_methods, 3);
        assert!((result.confidence - 0.85).abs() < 1e-9);
        // one vote each: first seen wins
        assert_eq!(result.primary_type, HallucinationType::Inconsistency);
    }

    #[test]
    fn test_aggregate_most_frequent_type() {
        let verdicts = [
            flagged(DetectionMethod::SelfConsistency, HallucinationType::Inconsistency, 0.5),
            flagged(DetectionMethod::FactualVerification, HallucinationType::TemporalError, 0.5),
            flagged(DetectionMethod::TemporalVerification, HallucinationType::TemporalError, 0.5),
        ];

        assert_eq!(aggregate(&verdicts).primary_type, HallucinationType::TemporalError);
    }

    #[test]
    fn test_aggregate_tie_is_not_hallucination() {
        let verdicts = [
            flagged(DetectionMethod::SelfConsistency, HallucinationType::Inconsistency, 0.6),
            Verdict::clean(DetectionMethod::TemporalVerification, 0.7),
        ];

        let result = aggregate(&verdicts);
        assert!(!result.is_hallucination);
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.primary_type, HallucinationType::Inconsistency);
    }

    #[test]
    fn test_aggregate_all_clean() {
        let verdicts = [
            Verdict::clean(DetectionMethod::SelfConsistency, 0.9),
            Verdict::clean(DetectionMethod::TemporalVerification, 0.7),
        ];

        let result = aggregate(&verdicts);
        assert!(!result.is_hallucination);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.primary_type, HallucinationType::Unknown);
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[] as &[Verdict]), AggregateVerdict::empty());
    }

    #[test]
    fn test_default_methods() {
        let sample = GenerationSample::new("q", "a");
        assert!(!default_methods(&sample).contains(&DetectionMethod::FactualVerification));

        let sample = sample.with_ground_truth("Paris");
        assert_eq!(
            default_methods(&sample),
            vec![
                DetectionMethod::SelfConsistency,
                DetectionMethod::ContradictionDetection,
                DetectionMethod::TemporalVerification,
                DetectionMethod::FactualVerification,
            ]
        );
    }

    #[tokio::test]
    async fn test_run_defaults_with_ground_truth() {
        // five self-consistency samples, then one contradiction analysis
        let mut script = vec![Some("paris"); 5];
        script.push(Some("No contradictions found."));
        let detector = HallucinationDetector::new(
            Arc::new(ScriptedGenerator::new(script)),
            DetectorConfig::default().with_current_year(2025),
        );
        let sample = GenerationSample::new("Capital of France?", "Paris")
            .with_ground_truth("Paris");

        let (verdict, results) = detector.detect(None, &sample).await;

        assert_eq!(results.len(), 4);
        assert!(results.values().all(|v| !v.is_hallucination()));
        assert!(!verdict.is_hallucination);
        assert_eq!(verdict.primary_type, HallucinationType::Unknown);
    }

    #[tokio::test]
    async fn test_run_skips_methods_missing_inputs() {
        let detector = HallucinationDetector::with_defaults(Arc::new(ScriptedGenerator::new(
            Vec::<Option<String>>::new(),
        )));
        let sample = GenerationSample::new("q", "Nothing happened in 2099");
        let methods = [
            DetectionMethod::FactualVerification,
            DetectionMethod::EntityVerification,
            DetectionMethod::TemporalVerification,
        ];

        let results = detector.run(Some(&methods), &sample).await;

        assert_eq!(results.len(), 1);
        assert!(results[&DetectionMethod::TemporalVerification].is_hallucination());
    }

    #[tokio::test]
    async fn test_run_entity_with_expected_entities() {
        let detector = HallucinationDetector::with_defaults(Arc::new(ScriptedGenerator::new(
            Vec::<Option<String>>::new(),
        )));
        let sample =
            GenerationSample::new("Who painted the Mona Lisa?", "it was painted by Leonardo")
                .with_expected_entities(["Leonardo"]);

        let results = detector
            .run(Some(&[DetectionMethod::EntityVerification]), &sample)
            .await;

        // "Leonardo" is the only capitalized span
        assert!(!results[&DetectionMethod::EntityVerification].is_hallucination());
    }
}
