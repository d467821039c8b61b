//! The five detection methods.
//!
//! Self-consistency and contradiction detection call the injected
//! [`TextGenerator`]; their collaborator failures are caught and turned into
//! verdicts. The other three are pure text checks.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::llm::{Generation, GenerationRequest, TextGenerator};
use crate::signals::{
    extract_capitalized_spans, extract_numbers, extract_years_within, normalize_text,
    same_number_set, token_set,
};
use crate::similarity::{agreement, most_common};

use super::types::{
    DetectionMethod, DetectorConfig, HallucinationType, SelfConsistencyConfig, Verdict,
};

/// Confidence of a flagged entity check.
const ENTITY_FLAGGED_CONFIDENCE: f64 = 0.8;
/// Confidence of a clean entity check; a clean pass is trusted more.
const ENTITY_CLEAN_CONFIDENCE: f64 = 0.9;
/// Confidence of a flagged temporal check.
const TEMPORAL_FLAGGED_CONFIDENCE: f64 = 0.9;
/// Confidence of a clean temporal check.
const TEMPORAL_CLEAN_CONFIDENCE: f64 = 0.7;
/// Phrase in the analysis that clears a text of contradictions.
const NO_CONTRADICTIONS: &str = "no contradictions";

fn contradiction_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for internal contradictions or inconsistencies.\n\
         If you find contradictions, list them clearly. If not, say \"No contradictions found.\"\n\
         \n\
         Text: {}\n\
         \n\
         Contradictions:",
        text
    )
}

/// Multi-method hallucination detector.
///
/// Holds no state between calls besides its configuration and the shared
/// generator, so one instance can serve concurrent checks.
pub struct HallucinationDetector {
    generator: Arc<dyn TextGenerator>,
    config: DetectorConfig,
}

impl HallucinationDetector {
    pub fn new(generator: Arc<dyn TextGenerator>, config: DetectorConfig) -> Self {
        Self { generator, config }
    }

    /// Detector with default thresholds.
    pub fn with_defaults(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(generator, DetectorConfig::default())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn request(
        &self,
        prompt: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
    ) -> GenerationRequest {
        let request = GenerationRequest::new(prompt)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        match &self.config.model {
            Some(model) => request.with_model(model),
            None => request,
        }
    }

    /// Resample `prompt` and flag low agreement between the answers.
    #[instrument(
        skip(self, prompt),
        fields(num_samples = self.config.self_consistency.num_samples)
    )]
    pub async fn detect_self_consistency(&self, prompt: &str) -> Verdict {
        let method = DetectionMethod::SelfConsistency;
        let settings = &self.config.self_consistency;
        let (responses, errors) = self.collect_samples(prompt, settings).await;

        if responses.len() < SelfConsistencyConfig::MIN_SUCCESSFUL_SAMPLES {
            warn!(
                succeeded = responses.len(),
                failed = errors.len(),
                "Too few samples for self-consistency, assuming hallucination"
            );
            return Verdict::flagged(method, HallucinationType::GenerationFailed, 1.0)
                .with_evidence("error", "Could not generate responses")
                .with_evidence("num_samples", responses.len())
                .with_evidence("errors", errors);
        }

        let score = agreement(&responses);
        let threshold = settings.agreement_threshold;
        let is_hallucination = score < threshold;
        let confidence = (score - threshold).abs() / threshold.max(f64::EPSILON);
        debug!(agreement = score, threshold, is_hallucination, "Self-consistency scored");

        let top_answer = most_common(&responses).map(|(text, count)| json!([text, count]));
        let verdict = if is_hallucination {
            Verdict::flagged(method, HallucinationType::Inconsistency, confidence)
        } else {
            Verdict::clean(method, confidence)
        };
        let verdict = verdict
            .with_evidence("agreement_score", score)
            .with_evidence("threshold", threshold)
            .with_evidence("num_samples", responses.len())
            .with_evidence("most_common", top_answer)
            .with_evidence("responses", responses);

        if errors.is_empty() {
            verdict
        } else {
            verdict.with_evidence("errors", errors)
        }
    }

    /// Request every sample, keeping successes (trimmed and lowercased) and
    /// failure messages apart.
    async fn collect_samples(
        &self,
        prompt: &str,
        settings: &SelfConsistencyConfig,
    ) -> (Vec<String>, Vec<String>) {
        let request = self.request(prompt, settings.temperature, settings.max_tokens);
        let total = settings.num_samples as usize;

        let outcomes: Vec<Result<Generation>> = if settings.parallel_sampling {
            join_all((0..total).map(|_| self.generator.generate(request.clone()))).await
        } else {
            let mut outcomes = Vec::with_capacity(total);
            for _ in 0..total {
                outcomes.push(self.generator.generate(request.clone()).await);
            }
            outcomes
        };

        let mut responses = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(generation) => responses.push(generation.text.trim().to_lowercase()),
                Err(e) => {
                    warn!(sample = i + 1, error = %e, "Self-consistency sample failed");
                    errors.push(e.to_string());
                }
            }
        }
        (responses, errors)
    }

    /// Compare a claim against a known answer.
    ///
    /// A claim that contains every ground-truth token passes even when it adds
    /// unsupported material.
    pub fn detect_factual_error(&self, claim: &str, ground_truth: &str) -> Verdict {
        let method = DetectionMethod::FactualVerification;
        let settings = &self.config.factual;

        let claim_norm = normalize_text(claim);
        let truth_norm = normalize_text(ground_truth);
        let claim_tokens = token_set(&claim_norm);
        let truth_tokens = token_set(&truth_norm);

        if truth_tokens.is_empty() {
            return Verdict::clean(method, 0.0)
                .with_evidence("error", "Empty ground truth")
                .with_evidence("empty_ground_truth", true);
        }

        let exact_match = claim_norm == truth_norm;
        let overlap =
            claim_tokens.intersection(&truth_tokens).count() as f64 / truth_tokens.len() as f64;

        let claim_numbers = extract_numbers(&claim_norm);
        let truth_numbers = extract_numbers(&truth_norm);
        let numerical_match =
            truth_numbers.is_empty() || same_number_set(&claim_numbers, &truth_numbers);

        let passes = exact_match
            || overlap >= 1.0
            || (overlap > settings.overlap_threshold && numerical_match);

        let verdict = if passes {
            Verdict::clean(method, 1.0 - overlap)
        } else {
            let kind = if !numerical_match {
                HallucinationType::NumericalError
            } else if overlap < settings.fabrication_threshold {
                HallucinationType::Fabrication
            } else {
                HallucinationType::FactualError
            };
            Verdict::flagged(method, kind, 1.0 - overlap)
        };

        verdict
            .with_evidence("claim", claim)
            .with_evidence("ground_truth", ground_truth)
            .with_evidence("token_overlap", overlap)
            .with_evidence("exact_match", exact_match)
            .with_evidence("numerical_match", numerical_match)
            .with_evidence("claim_numbers", claim_numbers)
            .with_evidence("truth_numbers", truth_numbers)
    }

    /// Ask the generator to list contradictions in `text`.
    #[instrument(skip(self, text))]
    pub async fn detect_contradiction(&self, text: &str) -> Verdict {
        let method = DetectionMethod::ContradictionDetection;
        let settings = &self.config.contradiction;
        let request = self.request(
            contradiction_prompt(text),
            settings.temperature,
            settings.max_tokens,
        );

        match self.generator.generate(request).await {
            Ok(generation) => {
                let analysis = generation.text.trim().to_string();
                let has_contradiction = !analysis.to_lowercase().contains(NO_CONTRADICTIONS);
                debug!(has_contradiction, "Contradiction analysis received");

                let verdict = if has_contradiction {
                    Verdict::flagged(
                        method,
                        HallucinationType::LogicalInconsistency,
                        settings.confidence,
                    )
                } else {
                    Verdict::clean(method, settings.confidence)
                };
                verdict
                    .with_evidence("analysis", analysis)
                    .with_evidence("original_text", text)
            }
            Err(e) => {
                warn!(error = %e, "Contradiction detection failed, assuming no contradiction");
                Verdict::clean(method, 0.0).with_evidence("error", e.to_string())
            }
        }
    }

    /// Check expected entities are mentioned and no others appear.
    ///
    /// Presence is a case-insensitive substring test. Any capitalized span
    /// not listed verbatim in `expected_entities` counts as unexpected.
    pub fn detect_entity_hallucination<S: AsRef<str>>(
        &self,
        text: &str,
        expected_entities: &[S],
    ) -> Verdict {
        let method = DetectionMethod::EntityVerification;
        let text_lower = text.to_lowercase();

        let (found, missing): (Vec<&str>, Vec<&str>) = expected_entities
            .iter()
            .map(AsRef::as_ref)
            .partition(|entity| text_lower.contains(&entity.to_lowercase()));

        let unexpected: Vec<String> = extract_capitalized_spans(text)
            .into_iter()
            .filter(|span| !expected_entities.iter().any(|e| e.as_ref() == span))
            .collect();

        let is_hallucination = !unexpected.is_empty() || (!missing.is_empty() && found.is_empty());
        let verdict = if is_hallucination {
            Verdict::flagged(method, HallucinationType::EntityError, ENTITY_FLAGGED_CONFIDENCE)
        } else {
            Verdict::clean(method, ENTITY_CLEAN_CONFIDENCE)
        };

        let reported: Vec<&String> = unexpected
            .iter()
            .take(self.config.entity.max_reported_unexpected)
            .collect();
        verdict
            .with_evidence("found_entities", json!(found))
            .with_evidence("missing_entities", json!(missing))
            .with_evidence("unexpected_entities", json!(reported))
            .with_evidence("expected_count", expected_entities.len())
            .with_evidence("found_count", found.len())
    }

    /// Flag future years and years far from an expected context year.
    pub fn detect_temporal_error(&self, text: &str, context_year: Option<i32>) -> Verdict {
        let method = DetectionMethod::TemporalVerification;
        let settings = &self.config.temporal;
        let years = extract_years_within(text, settings.year_window());

        if years.is_empty() {
            return Verdict::clean(method, 0.0)
                .with_evidence("note", "No temporal references found");
        }

        let chronologically_ordered = years.windows(2).all(|w| w[0] <= w[1]);
        let current_year = settings.current_year();
        let future_years: Vec<i32> = years.iter().copied().filter(|&y| y > current_year).collect();

        let tolerance = settings.context_tolerance_years.unsigned_abs();
        let context_mismatch = context_year
            .map(|ctx| years.iter().all(|&y| y.abs_diff(ctx) > tolerance))
            .unwrap_or(false);

        let is_hallucination = !future_years.is_empty() || context_mismatch;
        let verdict = if is_hallucination {
            Verdict::flagged(method, HallucinationType::TemporalError, TEMPORAL_FLAGGED_CONFIDENCE)
        } else {
            Verdict::clean(method, TEMPORAL_CLEAN_CONFIDENCE)
        };

        verdict
            .with_evidence("years_found", years)
            .with_evidence("chronologically_ordered", chronologically_ordered)
            .with_evidence("future_years", future_years)
            .with_evidence("current_year", current_year)
            .with_evidence("context_year", context_year)
            .with_evidence("context_mismatch", context_mismatch)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::types::TemporalConfig;
    use crate::error::Error;
    use crate::llm::Provider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Generator replaying scripted outcomes; `None` entries fail.
    pub(crate) struct ScriptedGenerator {
        script: Mutex<VecDeque<Option<String>>>,
        pub(crate) prompts: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new<I, S>(script: I) -> Self
        where
            I: IntoIterator<Item = Option<S>>,
            S: Into<String>,
        {
            Self {
                script: Mutex::new(script.into_iter().map(|s| s.map(Into::into)).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(text: &str, times: usize) -> Self {
            Self::new(std::iter::repeat(Some(text)).take(times))
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
            self.prompts.lock().unwrap().push(request);
            let next = self.script.lock().unwrap().pop_front().flatten();
            match next {
                Some(text) => Ok(Generation {
                    text,
                    model: "scripted".to_string(),
                    provider: Provider::Groq,
                    tokens_used: 7,
                    latency_ms: 3,
                }),
                None => Err(Error::llm_api("groq", "Service unavailable")),
            }
        }

        fn provider(&self) -> Provider {
            Provider::Groq
        }
    }

    fn offline_detector() -> HallucinationDetector {
        HallucinationDetector::new(
            Arc::new(ScriptedGenerator::new(Vec::<Option<String>>::new())),
            DetectorConfig::default().with_current_year(TemporalConfig::LEGACY_CURRENT_YEAR),
        )
    }

    // ------------------------------------------------------------------
    // Self-consistency
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_self_consistency_identical_answers() {
        let generator = Arc::new(ScriptedGenerator::replying("  Paris ", 5));
        let detector = HallucinationDetector::with_defaults(generator.clone());

        let verdict = detector.detect_self_consistency("Capital of France?").await;

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), None);
        assert_eq!(verdict.evidence_value("agreement_score"), Some(&json!(1.0)));
        assert_eq!(verdict.evidence_value("responses"), Some(&json!(vec!["paris"; 5])));
        assert_eq!(verdict.evidence_value("most_common"), Some(&json!(["paris", 5])));
        assert!((verdict.confidence() - (0.4 / 0.6)).abs() < 1e-9);

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 5);
        assert_eq!(prompts[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_self_consistency_disagreement() {
        let generator = Arc::new(ScriptedGenerator::new([
            Some("paris"),
            Some("lyon"),
            Some("marseille"),
            Some("nice"),
            Some("lille"),
        ]));
        let detector = HallucinationDetector::with_defaults(generator);

        let verdict = detector.detect_self_consistency("Capital of France?").await;

        // exact = 1/5, pairwise = 0
        assert!(verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::Inconsistency));
        let score = verdict.evidence_value("agreement_score").and_then(|v| v.as_f64()).unwrap();
        assert!((score - 0.1).abs() < 1e-9);
        assert!((verdict.confidence() - (0.5 / 0.6)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_self_consistency_too_few_samples() {
        let generator = Arc::new(ScriptedGenerator::new([
            Some("paris"),
            None,
            None,
            None,
            None,
        ]));
        let detector = HallucinationDetector::with_defaults(generator);

        let verdict = detector.detect_self_consistency("Capital of France?").await;

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 1.0);
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::GenerationFailed));
        assert_eq!(verdict.evidence_value("num_samples"), Some(&json!(1)));
        let errors = verdict.evidence_value("errors").and_then(|v| v.as_array()).unwrap();
        assert_eq!(errors.len(), 4);
    }

    #[tokio::test]
    async fn test_self_consistency_too_few_samples_parallel() {
        let generator = Arc::new(ScriptedGenerator::new([
            None,
            None,
            Some("paris"),
            None,
            None,
        ]));
        let detector = HallucinationDetector::new(
            generator,
            DetectorConfig::default().with_parallel_sampling(true),
        );

        let verdict = detector.detect_self_consistency("Capital of France?").await;

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 1.0);
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::GenerationFailed));
        assert_eq!(verdict.evidence_value("num_samples"), Some(&json!(1)));
        let errors = verdict.evidence_value("errors").and_then(|v| v.as_array()).unwrap();
        assert_eq!(errors.len(), 4);
    }

    #[tokio::test]
    async fn test_self_consistency_partial_failures_still_scored() {
        let generator = Arc::new(ScriptedGenerator::new([
            Some("paris"),
            None,
            Some("paris"),
            None,
            Some("paris"),
        ]));
        let detector = HallucinationDetector::new(
            generator,
            DetectorConfig::default().with_parallel_sampling(true),
        );

        let verdict = detector.detect_self_consistency("Capital of France?").await;

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.evidence_value("num_samples"), Some(&json!(3)));
        assert!(verdict.evidence_value("errors").is_some());
    }

    // ------------------------------------------------------------------
    // Factual verification
    // ------------------------------------------------------------------

    #[test]
    fn test_factual_exact_match() {
        let verdict = offline_detector().detect_factual_error("Paris", "Paris");

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.0);
        assert_eq!(verdict.evidence_value("exact_match"), Some(&json!(true)));
    }

    #[test]
    fn test_factual_full_overlap_in_verbose_answer() {
        let verdict =
            offline_detector().detect_factual_error("The capital is Paris, France", "Paris");

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.evidence_value("token_overlap"), Some(&json!(1.0)));
        assert_eq!(verdict.evidence_value("exact_match"), Some(&json!(false)));
    }

    #[test]
    fn test_factual_full_overlap_hides_fabricated_extras() {
        // Known limitation: every truth token is present, so the invented
        // second claim goes unnoticed.
        let verdict = offline_detector().detect_factual_error(
            "Paris, which was founded by Julius Caesar in 1066",
            "Paris",
        );

        assert!(!verdict.is_hallucination());
    }

    #[test]
    fn test_factual_fabrication() {
        let verdict = offline_detector().detect_factual_error("Lyon", "Paris");

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::Fabrication));
        assert_eq!(verdict.confidence(), 1.0);
    }

    #[test]
    fn test_factual_numerical_error() {
        let verdict =
            offline_detector().detect_factual_error("World War II ended in 1944", "1945");

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::NumericalError));
        assert_eq!(verdict.evidence_value("numerical_match"), Some(&json!(false)));
        assert_eq!(verdict.evidence_value("claim_numbers"), Some(&json!([1944.0])));
    }

    #[test]
    fn test_factual_partial_overlap() {
        let verdict =
            offline_detector().detect_factual_error("Leonardo painted it", "Leonardo da Vinci");

        // overlap 1/3: above the fabrication cutoff, below the pass threshold
        assert!(verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::FactualError));
    }

    #[test]
    fn test_factual_high_overlap_with_matching_numbers() {
        let verdict = offline_detector().detect_factual_error(
            "the first moon landing by neil armstrong in 1969",
            "neil armstrong first moon walk 1969",
        );

        // 5 of 6 truth tokens present and 1969 agrees
        assert!(!verdict.is_hallucination());
    }

    #[test]
    fn test_factual_empty_ground_truth() {
        let verdict = offline_detector().detect_factual_error("Paris", " ?! ");

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.0);
        assert_eq!(verdict.evidence_value("empty_ground_truth"), Some(&json!(true)));
        assert_eq!(verdict.evidence_value("error"), Some(&json!("Empty ground truth")));
    }

    // ------------------------------------------------------------------
    // Contradiction detection
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_contradiction_found() {
        let generator = Arc::new(ScriptedGenerator::new([Some(
            "1. The text says the sky is blue and also that it is green.",
        )]));
        let detector = HallucinationDetector::with_defaults(generator.clone());

        let verdict = detector.detect_contradiction("The sky is blue. The sky is green.").await;

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.7);
        assert_eq!(
            verdict.hallucination_type(),
            Some(HallucinationType::LogicalInconsistency)
        );

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].prompt.contains("Text: The sky is blue. The sky is green."));
        assert_eq!(prompts[0].temperature, Some(0.3));
        assert_eq!(prompts[0].max_tokens, Some(256));
    }

    #[tokio::test]
    async fn test_contradiction_none_found() {
        let generator = Arc::new(ScriptedGenerator::new([Some("No Contradictions found.")]));
        let detector = HallucinationDetector::with_defaults(generator);

        let verdict = detector.detect_contradiction("Water boils at 100C.").await;

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), None);
        assert_eq!(
            verdict.evidence_value("analysis"),
            Some(&json!("No Contradictions found."))
        );
    }

    #[tokio::test]
    async fn test_contradiction_generator_failure_recovered() {
        let generator = Arc::new(ScriptedGenerator::new([None::<String>]));
        let detector = HallucinationDetector::with_defaults(generator);

        let verdict = detector.detect_contradiction("Anything").await;

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.0);
        let error = verdict.evidence_value("error").and_then(|v| v.as_str()).unwrap();
        assert!(error.contains("Service unavailable"));
    }

    // ------------------------------------------------------------------
    // Entity verification
    // ------------------------------------------------------------------

    #[test]
    fn test_entity_all_expected_present() {
        let verdict = offline_detector()
            .detect_entity_hallucination("painted by Leonardo in his studio", &["Leonardo"]);

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.9);
        assert_eq!(verdict.evidence_value("found_count"), Some(&json!(1)));
    }

    #[test]
    fn test_entity_unexpected_span() {
        let verdict = offline_detector().detect_entity_hallucination(
            "Neil Armstrong and Buzz Aldrin landed",
            &["Neil Armstrong"],
        );

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.8);
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::EntityError));
        assert_eq!(
            verdict.evidence_value("unexpected_entities"),
            Some(&json!(["Buzz Aldrin"]))
        );
    }

    #[test]
    fn test_entity_all_missing() {
        let verdict =
            offline_detector().detect_entity_hallucination("it was someone else", &["Einstein"]);

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.evidence_value("missing_entities"), Some(&json!(["Einstein"])));
    }

    #[test]
    fn test_entity_some_missing_is_tolerated() {
        let verdict = offline_detector()
            .detect_entity_hallucination("discovered by marie curie", &["marie curie", "Pierre"]);

        assert!(!verdict.is_hallucination());
    }

    #[test]
    fn test_entity_unexpected_list_is_capped() {
        let verdict = offline_detector().detect_entity_hallucination(
            "Alpha, Bravo, Charlie, Delta, Echo, Foxtrot, Golf",
            &[] as &[&str],
        );

        let unexpected = verdict
            .evidence_value("unexpected_entities")
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(unexpected.len(), 5);
    }

    // ------------------------------------------------------------------
    // Temporal verification
    // ------------------------------------------------------------------

    #[test]
    fn test_temporal_future_year() {
        let verdict = offline_detector().detect_temporal_error("It happened in 2099", None);

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.hallucination_type(), Some(HallucinationType::TemporalError));
        assert_eq!(verdict.confidence(), 0.9);
        assert_eq!(verdict.evidence_value("years_found"), Some(&json!([2099])));
        assert_eq!(verdict.evidence_value("future_years"), Some(&json!([2099])));
    }

    #[test]
    fn test_temporal_no_dates() {
        let verdict = offline_detector().detect_temporal_error("Plain text, no dates", None);

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.0);
        assert!(verdict.evidence_value("note").is_some());
    }

    #[test]
    fn test_temporal_plausible_dates() {
        let verdict = offline_detector()
            .detect_temporal_error("Founded in 1945, expanded in 1960", Some(1950));

        assert!(!verdict.is_hallucination());
        assert_eq!(verdict.confidence(), 0.7);
        assert_eq!(verdict.evidence_value("chronologically_ordered"), Some(&json!(true)));
        assert_eq!(verdict.evidence_value("context_mismatch"), Some(&json!(false)));
    }

    #[test]
    fn test_temporal_context_mismatch() {
        let verdict =
            offline_detector().detect_temporal_error("In 1800 and later in 1750", Some(1969));

        assert!(verdict.is_hallucination());
        assert_eq!(verdict.evidence_value("context_mismatch"), Some(&json!(true)));
        assert_eq!(verdict.evidence_value("chronologically_ordered"), Some(&json!(false)));
    }

    #[test]
    fn test_temporal_extreme_context_year() {
        let detector = offline_detector();

        let verdict = detector.detect_temporal_error("In 1990", Some(i32::MIN));
        assert!(verdict.is_hallucination());
        assert_eq!(verdict.evidence_value("context_mismatch"), Some(&json!(true)));

        let verdict = detector.detect_temporal_error("In 1990", Some(i32::MAX));
        assert!(verdict.is_hallucination());
    }

    #[test]
    fn test_temporal_one_year_near_context_is_enough() {
        let verdict =
            offline_detector().detect_temporal_error("In 1800 and later in 1965", Some(1969));

        assert!(!verdict.is_hallucination());
    }
}
