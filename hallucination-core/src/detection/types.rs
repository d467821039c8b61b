//! Verdicts, method tags and detector configuration.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Category of a detected hallucination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HallucinationType {
    /// Resampled answers disagree
    Inconsistency,
    /// Too few samples could be generated to judge consistency
    GenerationFailed,
    /// Numbers in the claim differ from the ground truth
    NumericalError,
    /// Claim shares almost nothing with the ground truth
    Fabrication,
    /// Claim partially matches the ground truth
    FactualError,
    /// Text contradicts itself
    LogicalInconsistency,
    /// Unexpected or missing named entities
    EntityError,
    /// Impossible or out-of-context dates
    TemporalError,
    /// Aggregation fallback when no verdict carries a type
    Unknown,
}

impl HallucinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inconsistency => "inconsistency",
            Self::GenerationFailed => "generation_failed",
            Self::NumericalError => "numerical_error",
            Self::Fabrication => "fabrication",
            Self::FactualError => "factual_error",
            Self::LogicalInconsistency => "logical_inconsistency",
            Self::EntityError => "entity_error",
            Self::TemporalError => "temporal_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HallucinationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detection method that produced a verdict.
///
/// Ordering follows the default dispatch order, so maps keyed by method
/// iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    SelfConsistency,
    FactualVerification,
    ContradictionDetection,
    EntityVerification,
    TemporalVerification,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 5] = [
        Self::SelfConsistency,
        Self::FactualVerification,
        Self::ContradictionDetection,
        Self::EntityVerification,
        Self::TemporalVerification,
    ];

    /// Full method tag, as recorded on verdicts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfConsistency => "self_consistency",
            Self::FactualVerification => "factual_verification",
            Self::ContradictionDetection => "contradiction_detection",
            Self::EntityVerification => "entity_verification",
            Self::TemporalVerification => "temporal_verification",
        }
    }

    /// Short selection key (`factual`, `contradiction`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Self::SelfConsistency => "self_consistency",
            Self::FactualVerification => "factual",
            Self::ContradictionDetection => "contradiction",
            Self::EntityVerification => "entity",
            Self::TemporalVerification => "temporal",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = Error;

    /// Accepts either the short key or the full tag.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.key() == s || m.as_str() == s)
            .ok_or_else(|| Error::invalid_input(format!("Unknown detection method: {}", s)))
    }
}

/// Outcome of a single detection method.
///
/// Built once by a detector and read through accessors afterwards.
/// `evidence` carries the diagnostic fields behind the decision, including
/// any recovered collaborator error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    is_hallucination: bool,
    confidence: f64,
    hallucination_type: Option<HallucinationType>,
    evidence: BTreeMap<String, serde_json::Value>,
    method: DetectionMethod,
}

impl Verdict {
    /// Create a verdict. Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn new(
        method: DetectionMethod,
        is_hallucination: bool,
        confidence: f64,
        hallucination_type: Option<HallucinationType>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            is_hallucination,
            confidence,
            hallucination_type,
            evidence: BTreeMap::new(),
            method,
        }
    }

    /// A hallucination verdict of the given type.
    pub fn flagged(method: DetectionMethod, kind: HallucinationType, confidence: f64) -> Self {
        Self::new(method, true, confidence, Some(kind))
    }

    /// A non-hallucination verdict.
    pub fn clean(method: DetectionMethod, confidence: f64) -> Self {
        Self::new(method, false, confidence, None)
    }

    /// Attach a diagnostic field.
    pub fn with_evidence(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn is_hallucination(&self) -> bool {
        self.is_hallucination
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn hallucination_type(&self) -> Option<HallucinationType> {
        self.hallucination_type
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    pub fn evidence(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.evidence
    }

    /// Look up a single evidence field.
    pub fn evidence_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.evidence.get(key)
    }
}

/// Input to a multi-method detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSample {
    /// Prompt that produced the response
    pub prompt: String,
    /// Response under test
    pub response_text: String,
    /// Reference answer, when known
    #[serde(default)]
    pub ground_truth: Option<String>,
    /// Entities the response should mention
    #[serde(default)]
    pub expected_entities: Vec<String>,
    /// Year the response is expected to be about
    #[serde(default)]
    pub context_year: Option<i32>,
}

impl GenerationSample {
    pub fn new(prompt: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response_text: response_text.into(),
            ..Self::default()
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }

    pub fn with_expected_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context_year(mut self, year: i32) -> Self {
        self.context_year = Some(year);
        self
    }

    /// Ground truth with surrounding whitespace removed, if non-empty.
    pub fn ground_truth(&self) -> Option<&str> {
        self.ground_truth
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Final verdict folded from several method verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateVerdict {
    /// Strict majority of methods voted hallucination
    pub is_hallucination: bool,
    /// Mean confidence of the hallucination-voting methods
    pub confidence: f64,
    /// Most frequent type among hallucination-voting methods
    pub primary_type: HallucinationType,
    /// Methods voting hallucination
    pub hallucination_votes: usize,
    /// Methods consulted
    pub total_methods: usize,
}

impl AggregateVerdict {
    /// Verdict for an empty set of method results.
    pub fn empty() -> Self {
        Self {
            is_hallucination: false,
            confidence: 0.0,
            primary_type: HallucinationType::Unknown,
            hallucination_votes: 0,
            total_methods: 0,
        }
    }
}

impl std::fmt::Display for AggregateVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_hallucination {
            write!(
                f,
                "HALLUCINATION ({}, confidence {:.2}, {}/{} votes)",
                self.primary_type, self.confidence, self.hallucination_votes, self.total_methods
            )
        } else {
            write!(
                f,
                "OK ({}/{} votes)",
                self.hallucination_votes, self.total_methods
            )
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Self-consistency sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfConsistencyConfig {
    /// Generations requested per check
    pub num_samples: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Output budget per sample
    pub max_tokens: u32,
    /// Agreement below this is a hallucination
    pub agreement_threshold: f64,
    /// Issue the sample requests concurrently
    pub parallel_sampling: bool,
}

impl SelfConsistencyConfig {
    pub const DEFAULT_NUM_SAMPLES: u32 = 5;
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 512;
    pub const DEFAULT_AGREEMENT_THRESHOLD: f64 = 0.6;
    /// Fewer successful samples than this forces a `generation_failed` verdict.
    pub const MIN_SUCCESSFUL_SAMPLES: usize = 2;
}

impl Default for SelfConsistencyConfig {
    fn default() -> Self {
        Self {
            num_samples: Self::DEFAULT_NUM_SAMPLES,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            agreement_threshold: Self::DEFAULT_AGREEMENT_THRESHOLD,
            parallel_sampling: false,
        }
    }
}

/// Ground-truth comparison thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactualConfig {
    /// Overlap above this passes when numbers agree
    pub overlap_threshold: f64,
    /// Overlap below this is typed as fabrication
    pub fabrication_threshold: f64,
}

impl FactualConfig {
    pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.7;
    pub const DEFAULT_FABRICATION_THRESHOLD: f64 = 0.3;
}

impl Default for FactualConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: Self::DEFAULT_OVERLAP_THRESHOLD,
            fabrication_threshold: Self::DEFAULT_FABRICATION_THRESHOLD,
        }
    }
}

/// LLM-judged contradiction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Fixed confidence of an LLM-judged verdict
    pub confidence: f64,
}

impl ContradictionConfig {
    pub const DEFAULT_TEMPERATURE: f64 = 0.3;
    pub const DEFAULT_MAX_TOKENS: u32 = 256;
    pub const DEFAULT_CONFIDENCE: f64 = 0.7;
}

impl Default for ContradictionConfig {
    fn default() -> Self {
        Self {
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }
}

/// Date plausibility settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Cutoff for future dates; the system clock's year when unset
    pub current_year: Option<i32>,
    /// Allowed distance from a context year
    pub context_tolerance_years: i32,
    /// Smallest four-digit number treated as a year
    pub min_year: i32,
    /// Largest four-digit number treated as a year
    pub max_year: i32,
}

impl TemporalConfig {
    /// Cutoff year used by earlier releases, kept for reproducing old runs.
    pub const LEGACY_CURRENT_YEAR: i32 = 2025;
    pub const DEFAULT_CONTEXT_TOLERANCE_YEARS: i32 = 10;
    pub const DEFAULT_MIN_YEAR: i32 = 1000;
    pub const DEFAULT_MAX_YEAR: i32 = 2099;

    /// Cutoff year in effect.
    pub fn current_year(&self) -> i32 {
        self.current_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    /// Range of numbers scanned as years.
    pub fn year_window(&self) -> RangeInclusive<i32> {
        self.min_year..=self.max_year
    }
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            current_year: None,
            context_tolerance_years: Self::DEFAULT_CONTEXT_TOLERANCE_YEARS,
            min_year: Self::DEFAULT_MIN_YEAR,
            max_year: Self::DEFAULT_MAX_YEAR,
        }
    }
}

/// Entity-check reporting limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Unexpected entities listed in evidence
    pub max_reported_unexpected: usize,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            max_reported_unexpected: 5,
        }
    }
}

/// Configuration for [`HallucinationDetector`](super::HallucinationDetector).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub self_consistency: SelfConsistencyConfig,
    #[serde(default)]
    pub factual: FactualConfig,
    #[serde(default)]
    pub contradiction: ContradictionConfig,
    #[serde(default)]
    pub entity: EntityConfig,
    #[serde(default)]
    pub temporal: TemporalConfig,
    /// Model passed to every generation request (provider default when unset)
    #[serde(default)]
    pub model: Option<String>,
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_samples(mut self, num_samples: u32) -> Self {
        self.self_consistency.num_samples = num_samples;
        self
    }

    pub fn with_agreement_threshold(mut self, threshold: f64) -> Self {
        self.self_consistency.agreement_threshold = threshold;
        self
    }

    pub fn with_parallel_sampling(mut self, parallel: bool) -> Self {
        self.self_consistency.parallel_sampling = parallel;
        self
    }

    pub fn with_overlap_threshold(mut self, threshold: f64) -> Self {
        self.factual.overlap_threshold = threshold;
        self
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.temporal.current_year = Some(year);
        self
    }

    pub fn with_context_tolerance(mut self, years: i32) -> Self {
        self.temporal.context_tolerance_years = years;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Reject thresholds outside their meaningful ranges.
    pub fn validate(&self) -> Result<()> {
        let sc = &self.self_consistency;
        if sc.num_samples == 0 {
            return Err(Error::config("self_consistency.num_samples must be positive"));
        }
        if !(sc.agreement_threshold > 0.0 && sc.agreement_threshold <= 1.0) {
            return Err(Error::config(format!(
                "self_consistency.agreement_threshold must be within (0, 1], got {}",
                sc.agreement_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.factual.overlap_threshold)
            || !(0.0..=1.0).contains(&self.factual.fabrication_threshold)
        {
            return Err(Error::config("factual thresholds must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.contradiction.confidence) {
            return Err(Error::config("contradiction.confidence must be within [0, 1]"));
        }
        if self.temporal.context_tolerance_years < 0 {
            return Err(Error::config("temporal.context_tolerance_years must not be negative"));
        }
        if self.temporal.min_year > self.temporal.max_year {
            return Err(Error::config("temporal.min_year must not exceed max_year"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_verdict_clamps_confidence() {
        let v = Verdict::clean(DetectionMethod::TemporalVerification, 1.7);
        assert_eq!(v.confidence(), 1.0);

        let v = Verdict::clean(DetectionMethod::TemporalVerification, f64::NAN);
        assert_eq!(v.confidence(), 0.0);
    }

    #[test]
    fn test_verdict_serialization() {
        let v = Verdict::flagged(
            DetectionMethod::FactualVerification,
            HallucinationType::Fabrication,
            0.9,
        )
        .with_evidence("token_overlap", 0.1);

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["method"], "factual_verification");
        assert_eq!(json["hallucination_type"], "fabrication");
        assert_eq!(json["evidence"]["token_overlap"], 0.1);

        let back: Verdict = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "factual".parse::<DetectionMethod>().unwrap(),
            DetectionMethod::FactualVerification
        );
        assert_eq!(
            "temporal_verification".parse::<DetectionMethod>().unwrap(),
            DetectionMethod::TemporalVerification
        );
        assert!("telepathy".parse::<DetectionMethod>().is_err());
    }

    #[test]
    fn test_sample_ground_truth_blank() {
        let sample = GenerationSample::new("q", "a").with_ground_truth("   ");
        assert_eq!(sample.ground_truth(), None);
    }

    #[test]
    fn test_current_year_override() {
        let config = DetectorConfig::new().with_current_year(TemporalConfig::LEGACY_CURRENT_YEAR);
        assert_eq!(config.temporal.current_year(), 2025);
        assert!(DetectorConfig::default().temporal.current_year() >= 2025);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert!(DetectorConfig::new().with_num_samples(0).validate().is_err());
        assert!(DetectorConfig::new().with_agreement_threshold(0.0).validate().is_err());
        assert!(DetectorConfig::new().with_context_tolerance(-1).validate().is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "temporal": {
                "current_year": 2030,
                "context_tolerance_years": 5,
                "min_year": 1000,
                "max_year": 2099
            }
        }"#;
        let config: DetectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.temporal.current_year(), 2030);
        assert_eq!(config.self_consistency, SelfConsistencyConfig::default());
    }

    #[test]
    fn test_aggregate_display() {
        assert_eq!(AggregateVerdict::empty().to_string(), "OK (0/0 votes)");
    }
}
