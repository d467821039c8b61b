//! Factual QA experiments across providers.
//!
//! A [`Dataset`] of question/answer pairs is sent to every requested provider
//! through a [`BatchExecutor`]. Each answer is checked for the reference
//! answer and scored by factual verification, then summarised per model in
//! an [`ExperimentReport`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use hallucination_core::experiment::{Dataset, ExperimentRunner};
//!
//! let dataset = Dataset::load("data/factual_qa.json")?;
//! let runner = ExperimentRunner::new(Arc::new(registry));
//! let report = runner.run_factual(&dataset, &[Provider::Gemini, Provider::Groq]).await?;
//! report.save("results/factual_qa.json")?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::detection::{DetectorConfig, HallucinationDetector, Verdict};
use crate::error::{Error, Result};
use crate::llm::{
    BatchExecutor, GenerationRequest, Provider, ProviderRegistry, DEFAULT_MAX_PARALLEL,
};
use crate::metrics::{model_comparison, ModelMetrics};

/// Output budget for QA answers.
pub const QA_MAX_TOKENS: u32 = 150;

/// One question with its reference answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub difficulty: String,
    /// Question style, e.g. "factual" or "false_premise"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// What the question is designed to provoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    answer: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    hallucination_trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    category: String,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    questions: Vec<RawQuestion>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

/// Flattened QA dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub items: Vec<QaItem>,
}

impl Dataset {
    pub fn new(items: Vec<QaItem>) -> Self {
        Self { items }
    }

    /// Parse a list of `{category, difficulty, questions: [...]}` groups.
    pub fn from_json(json: &str) -> Result<Self> {
        let categories: Vec<RawCategory> = serde_json::from_str(json)?;
        let items = categories
            .into_iter()
            .flat_map(|group| {
                let RawCategory {
                    category,
                    difficulty,
                    questions,
                } = group;
                questions.into_iter().map(move |q| QaItem {
                    question: q.question,
                    answer: q.answer,
                    category: category.clone(),
                    difficulty: difficulty.clone(),
                    kind: q.kind,
                    hallucination_trigger: q.hallucination_trigger,
                })
            })
            .collect();
        Ok(Self { items })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Keep only the first `n` items.
    pub fn truncated(mut self, n: usize) -> Self {
        self.items.truncate(n);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome for one question on one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: usize,
    pub question: String,
    pub ground_truth: String,
    pub category: String,
    pub difficulty: String,
    /// Generated answer, absent when generation failed
    pub response: Option<String>,
    pub model: Option<String>,
    /// Reference answer appears in the response (case-insensitive)
    pub is_correct: bool,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub detection: Option<Verdict>,
    pub error: Option<String>,
}

/// Answered and correct questions within one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub correct: usize,
    pub total: usize,
    /// `correct / total`
    pub accuracy: f64,
}

/// Per-model aggregate of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub total_questions: usize,
    pub answered: usize,
    pub errors: usize,
    pub correct: usize,
    /// `correct / answered`
    pub accuracy: f64,
    pub hallucinations_detected: usize,
    /// `hallucinations_detected / answered`
    pub hallucination_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_tokens: f64,
    pub total_tokens: u64,
    /// Accuracy over answered questions, per category
    #[serde(default)]
    pub by_category: BTreeMap<String, CategoryStats>,
}

impl ModelSummary {
    pub fn from_results(results: &[QuestionResult]) -> Self {
        let answered: Vec<&QuestionResult> =
            results.iter().filter(|r| r.response.is_some()).collect();
        let n = answered.len();
        let correct = answered.iter().filter(|r| r.is_correct).count();
        let hallucinations_detected = answered
            .iter()
            .filter(|r| r.detection.as_ref().is_some_and(Verdict::is_hallucination))
            .count();
        let total_tokens: u64 = answered.iter().map(|r| r.tokens_used).sum();
        let total_latency: u64 = answered.iter().map(|r| r.latency_ms).sum();
        let per_answer = |value: f64| if n == 0 { 0.0 } else { value / n as f64 };

        let mut by_category: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for result in &answered {
            let stats = by_category.entry(result.category.clone()).or_default();
            stats.total += 1;
            if result.is_correct {
                stats.correct += 1;
            }
        }
        for stats in by_category.values_mut() {
            stats.accuracy = stats.correct as f64 / stats.total as f64;
        }

        Self {
            total_questions: results.len(),
            answered: n,
            errors: results.len() - n,
            correct,
            accuracy: per_answer(correct as f64),
            hallucinations_detected,
            hallucination_rate: per_answer(hallucinations_detected as f64),
            avg_latency_ms: per_answer(total_latency as f64),
            avg_tokens: per_answer(total_tokens as f64),
            total_tokens,
            by_category,
        }
    }
}

/// Results of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub experiment: String,
    pub dataset_size: usize,
    /// Per-question results keyed by provider
    pub results: BTreeMap<String, Vec<QuestionResult>>,
    pub summaries: BTreeMap<String, ModelSummary>,
    /// Exact-match and token-overlap comparison of the raw answers
    pub model_comparison: BTreeMap<String, ModelMetrics>,
}

impl ExperimentReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "Saved experiment report");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// Runs QA datasets against registered providers.
pub struct ExperimentRunner {
    registry: Arc<ProviderRegistry>,
    detector_config: DetectorConfig,
    template: GenerationRequest,
    max_parallel: usize,
}

impl ExperimentRunner {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            detector_config: DetectorConfig::default(),
            template: GenerationRequest::new("").with_max_tokens(QA_MAX_TOKENS),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    pub fn with_detector_config(mut self, config: DetectorConfig) -> Self {
        self.detector_config = config;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.template = self.template.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.template = self.template.with_max_tokens(max_tokens);
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Ask every question on every provider and score the answers.
    ///
    /// Per-question failures are recorded in the results. Asking for a
    /// provider the registry does not hold is an error.
    #[instrument(skip(self, dataset), fields(questions = dataset.len()))]
    pub async fn run_factual(
        &self,
        dataset: &Dataset,
        providers: &[Provider],
    ) -> Result<ExperimentReport> {
        if providers.is_empty() {
            return Err(Error::invalid_input("No providers requested"));
        }
        for provider in providers {
            if self.registry.get_client(*provider).is_none() {
                return Err(Error::config(format!(
                    "Provider {} not available; configured: {:?}",
                    provider,
                    self.registry.available_providers()
                )));
            }
        }

        let mut results = BTreeMap::new();
        let mut summaries = BTreeMap::new();
        let mut answers = BTreeMap::new();

        for &provider in providers {
            let Some(client) = self.registry.get_client(provider) else {
                continue;
            };
            info!(provider = %provider, "Running factual QA");

            let detector =
                HallucinationDetector::new(Arc::clone(client), self.detector_config.clone());
            let prompts = dataset.items.iter().map(|q| q.question.clone()).collect();
            let batch = BatchExecutor::new(Arc::clone(client))
                .with_max_parallel(self.max_parallel)
                .execute(prompts, &self.template)
                .await;

            let provider_results: Vec<QuestionResult> = dataset
                .items
                .iter()
                .zip(&batch.items)
                .enumerate()
                .map(|(i, (item, outcome))| score_answer(i, item, outcome, &detector))
                .collect();

            let summary = ModelSummary::from_results(&provider_results);
            info!(
                provider = %provider,
                accuracy = summary.accuracy,
                hallucination_rate = summary.hallucination_rate,
                errors = summary.errors,
                "Provider finished"
            );
            if summary.errors > 0 {
                warn!(provider = %provider, errors = summary.errors, "Some questions failed");
            }

            answers.insert(
                provider.to_string(),
                provider_results
                    .iter()
                    .map(|r| r.response.clone().unwrap_or_default())
                    .collect::<Vec<_>>(),
            );
            summaries.insert(provider.to_string(), summary);
            results.insert(provider.to_string(), provider_results);
        }

        let truths: Vec<&str> = dataset.items.iter().map(|q| q.answer.as_str()).collect();
        Ok(ExperimentReport {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            experiment: "factual_qa".to_string(),
            dataset_size: dataset.len(),
            results,
            summaries,
            model_comparison: model_comparison(&answers, &truths)?,
        })
    }
}

fn score_answer(
    question_id: usize,
    item: &QaItem,
    outcome: &crate::llm::BatchItem,
    detector: &HallucinationDetector,
) -> QuestionResult {
    let mut result = QuestionResult {
        question_id,
        question: item.question.clone(),
        ground_truth: item.answer.clone(),
        category: item.category.clone(),
        difficulty: item.difficulty.clone(),
        response: None,
        model: None,
        is_correct: false,
        tokens_used: 0,
        latency_ms: 0,
        detection: None,
        error: outcome.error.clone(),
    };

    if let Some(generation) = &outcome.generation {
        result.is_correct = generation
            .text
            .to_lowercase()
            .contains(&item.answer.to_lowercase());
        result.detection = Some(detector.detect_factual_error(&generation.text, &item.answer));
        result.response = Some(generation.text.clone());
        result.model = Some(generation.model.clone());
        result.tokens_used = generation.tokens_used;
        result.latency_ms = generation.latency_ms;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Generation, TextGenerator};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const DATASET: &str = r#"[
        {
            "category": "geography",
            "difficulty": "easy",
            "questions": [
                {"question": "What is the capital of France?", "answer": "Paris"},
                {"question": "What is the capital of Japan?", "answer": "Tokyo"}
            ]
        },
        {
            "category": "history",
            "questions": [
                {"question": "In what year did World War II end?", "answer": "1945",
                 "type": "factual", "hallucination_trigger": "date confusion"}
            ]
        }
    ]"#;

    /// Answers from a fixed table; unknown questions fail.
    struct QuizGenerator {
        provider: Provider,
        answers: BTreeMap<&'static str, &'static str>,
    }

    #[async_trait]
    impl TextGenerator for QuizGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
            let text = self
                .answers
                .get(request.prompt.as_str())
                .ok_or_else(|| Error::llm_api(self.provider.to_string(), "Model overloaded"))?;
            Ok(Generation {
                text: text.to_string(),
                model: format!("{}-test", self.provider),
                provider: self.provider,
                tokens_used: 10,
                latency_ms: 20,
            })
        }

        fn provider(&self) -> Provider {
            self.provider
        }
    }

    fn registry() -> Arc<ProviderRegistry> {
        let good = QuizGenerator {
            provider: Provider::Groq,
            answers: BTreeMap::from([
                ("What is the capital of France?", "The capital of France is Paris."),
                ("What is the capital of Japan?", "Tokyo"),
                ("In what year did World War II end?", "It ended in 1945."),
            ]),
        };
        let weak = QuizGenerator {
            provider: Provider::Gemini,
            answers: BTreeMap::from([
                ("What is the capital of France?", "Lyon"),
                ("What is the capital of Japan?", "Tokyo"),
            ]),
        };
        Arc::new(
            ProviderRegistry::new()
                .with_client(Arc::new(good))
                .with_client(Arc::new(weak)),
        )
    }

    #[test]
    fn test_dataset_flattens_categories() {
        let dataset = Dataset::from_json(DATASET).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.items[0].category, "geography");
        assert_eq!(dataset.items[2].difficulty, "medium");
        assert_eq!(dataset.items[2].kind.as_deref(), Some("factual"));
        assert_eq!(dataset.clone().truncated(1).len(), 1);
    }

    #[tokio::test]
    async fn test_run_factual() {
        let dataset = Dataset::from_json(DATASET).unwrap();
        let runner = ExperimentRunner::new(registry()).with_max_parallel(2);

        let report = runner
            .run_factual(&dataset, &[Provider::Groq, Provider::Gemini])
            .await
            .unwrap();

        assert_eq!(report.dataset_size, 3);
        let groq = &report.summaries["groq"];
        assert_eq!(groq.answered, 3);
        assert_eq!(groq.correct, 3);
        assert_eq!(groq.accuracy, 1.0);
        assert_eq!(groq.hallucinations_detected, 0);
        assert_eq!(groq.avg_tokens, 10.0);
        assert_eq!(
            groq.by_category["geography"],
            CategoryStats {
                correct: 2,
                total: 2,
                accuracy: 1.0,
            }
        );
        assert_eq!(groq.by_category["history"].total, 1);

        let gemini = &report.summaries["gemini"];
        assert_eq!(gemini.answered, 2);
        assert_eq!(gemini.errors, 1);
        assert_eq!(gemini.correct, 1);
        assert_eq!(gemini.hallucinations_detected, 1);
        assert_eq!(gemini.hallucination_rate, 0.5);
        assert_eq!(gemini.by_category["geography"].accuracy, 0.5);
        // The failed history question is not counted.
        assert!(!gemini.by_category.contains_key("history"));

        let failed = &report.results["gemini"][2];
        assert!(failed.response.is_none());
        assert!(failed.error.as_deref().unwrap().contains("Model overloaded"));

        // Only the bare "Tokyo" answers match exactly.
        assert!((report.model_comparison["groq"].exact_match_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_run_factual_unknown_provider() {
        let runner = ExperimentRunner::new(registry());
        let err = runner
            .run_factual(&Dataset::default(), &[Provider::OpenAI])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_report_save_and_load() {
        let dataset = Dataset::from_json(DATASET).unwrap().truncated(1);
        let report = ExperimentRunner::new(registry())
            .run_factual(&dataset, &[Provider::Groq])
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("factual_qa.json");
        report.save(&path).unwrap();

        let loaded = ExperimentReport::load(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.summaries, report.summaries);
    }
}
