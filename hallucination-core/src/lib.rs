//! # hallucination-core
//!
//! Multi-method hallucination detection for LLM output, and the metrics to
//! evaluate it against labeled data.
//!
//! ## Core Components
//!
//! - **Signals**: normalized tokens, numbers, years and capitalized spans
//! - **Similarity**: Jaccard and multi-response agreement scores
//! - **Detection**: five independent detection methods and majority-vote aggregation
//! - **Metrics**: precision/recall/F1, calibration error, method/model/mitigation comparisons
//! - **LLM**: the `TextGenerator` capability, provider clients and rate limiting
//! - **Experiment**: factual QA runs across providers with JSON reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallucination_core::{
//!     aggregate, DetectorConfig, HallucinationDetector, ProviderRegistry, ProvidersConfig,
//! };
//! use std::sync::Arc;
//!
//! let registry = ProviderRegistry::from_config(&ProvidersConfig::from_env())?;
//! let detector = HallucinationDetector::new(Arc::new(registry), DetectorConfig::default());
//!
//! let factual = detector.detect_factual_error("The capital is Paris, France", "Paris");
//! let temporal = detector.detect_temporal_error("It happened in 2099", None);
//! let verdict = aggregate([&factual, &temporal]);
//! println!("{}", verdict);
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod experiment;
pub mod llm;
pub mod metrics;
pub mod signals;
pub mod similarity;

// Re-exports for convenience
pub use config::{GenerationConfig, ProviderSettings, ProvidersConfig};
pub use detection::{
    aggregate, AggregateVerdict, DetectionMethod, DetectorConfig, GenerationSample,
    HallucinationDetector, HallucinationType, Verdict,
};
pub use error::{Error, Result};
pub use experiment::{
    CategoryStats, Dataset, ExperimentReport, ExperimentRunner, ModelSummary, QaItem,
};
pub use llm::{
    BatchExecutor, ClientConfig, Generation, GenerationRequest, OpenAICompatibleClient, Provider,
    ProviderRegistry, RateLimitedClient, TextGenerator,
};
pub use metrics::{
    accuracy, compare_methods, confidence_calibration, error_analysis_by_type, evaluate,
    hallucination_rate, mitigation_effectiveness, model_comparison, precision_recall_f1,
    EvaluationReport, LabeledBatch,
};
pub use similarity::{agreement, jaccard};
