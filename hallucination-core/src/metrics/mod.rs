//! Evaluation metrics for hallucination detection.
//!
//! Pure functions over parallel sequences of predictions and labels, with
//! `true` meaning "hallucination". Functions taking two or more sequences
//! return [`Error::LengthMismatch`](crate::Error::LengthMismatch) when their
//! lengths differ; nothing is silently skipped.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallucination_core::metrics::{evaluate, LabeledBatch};
//!
//! let batch = LabeledBatch::from_verdicts(&verdicts, labels)?;
//! let report = evaluate(&batch)?;
//! println!("F1 {:.3}, ECE {:.3}", report.classification.f1,
//!     report.calibration.map_or(0.0, |c| c.ece));
//! ```

mod calibration;
mod classification;
mod comparison;
mod evaluate;
mod types;

pub use calibration::{confidence_calibration, DEFAULT_NUM_BINS};
pub use classification::{accuracy, error_analysis_by_type, hallucination_rate, precision_recall_f1};
pub use comparison::{compare_methods, mitigation_effectiveness, model_comparison};
pub use evaluate::evaluate;
pub use types::{
    CalibrationBin, CalibrationReport, ClassificationMetrics, EvaluationReport, LabeledBatch,
    MethodMetrics, MitigationReport, ModelMetrics, TypeMetrics,
};
