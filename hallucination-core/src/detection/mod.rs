//! Multi-method hallucination detection.
//!
//! Each method scores one response along a single dimension and returns a
//! [`Verdict`]:
//!
//! | Method | Needs | Flags |
//! |--------|-------|-------|
//! | self-consistency | generator | low agreement across resamples |
//! | factual | ground truth | low token overlap or mismatched numbers |
//! | contradiction | generator | an LLM-reported internal contradiction |
//! | entity | expected entities | unexpected or wholly missing names |
//! | temporal | - | future years or years far from a context year |
//!
//! [`aggregate`] folds several verdicts into one by strict majority vote.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallucination_core::detection::{DetectorConfig, GenerationSample, HallucinationDetector};
//!
//! let detector = HallucinationDetector::new(registry, DetectorConfig::default());
//! let sample = GenerationSample::new("What is the capital of France?", "Paris")
//!     .with_ground_truth("Paris");
//!
//! let (verdict, per_method) = detector.detect(None, &sample).await;
//! println!("{}", verdict);
//! for (method, v) in &per_method {
//!     println!("  {}: {} ({:.2})", method, v.is_hallucination(), v.confidence());
//! }
//! ```

mod aggregate;
mod detector;
mod proptest;
mod types;

pub use aggregate::{aggregate, default_methods};
pub use detector::HallucinationDetector;
pub use types::{
    AggregateVerdict, ContradictionConfig, DetectionMethod, DetectorConfig, EntityConfig,
    FactualConfig, GenerationSample, HallucinationType, SelfConsistencyConfig, TemporalConfig,
    Verdict,
};
